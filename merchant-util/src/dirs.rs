use super::constants::MERCHANT_ROOT_DIR;

pub fn get_merchant_root_dir() -> std::path::PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        home_dir.join(MERCHANT_ROOT_DIR)
    } else {
        std::path::PathBuf::from(".").join(MERCHANT_ROOT_DIR)
    }
}

pub fn get_service_dir(service_name: &str) -> std::path::PathBuf {
    let root_dir = get_merchant_root_dir();
    root_dir.join(service_name)
}
