use named_lock::{NamedLock, NamedLockGuard};
use std::process::exit;
use super::dirs::get_service_dir;

// Only one instance of a service may own its service directory
pub fn init_process_lock(service_name: &str) -> (NamedLock, NamedLockGuard) {
    let dir = get_service_dir(service_name);
    std::fs::create_dir_all(&dir).unwrap_or_else(|e| {
        println!("Failed to create service directory {:?}: {}", dir, e);
        exit(1);
    });

    let lock_name = format!("merchant_{}_lock", service_name.replace('-', "_"));
    let lock = match NamedLock::create(&lock_name) {
        Ok(lock) => lock,
        Err(e) => {
            println!("Failed to create application lock {}: {}", lock_name, e);
            exit(1);
        }
    };

    let guard = match lock.try_lock() {
        Ok(guard) => guard,
        Err(e) => {
            println!("Another {} instance is already running: {}", service_name, e);
            exit(1);
        }
    };

    (lock, guard)
}
