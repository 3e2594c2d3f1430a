use crate::config::PaymentNotifierConfig;
use crate::request::FileRequestStore;
use daemonize::Daemonize;
use std::fs::File;

pub fn check_request(config: &PaymentNotifierConfig, request_id: &str) -> Result<(), String> {
    let store = FileRequestStore::new(&config.requests.requests_dir(), config.btc.network());
    let path = store.request_file_path(request_id)?;
    println!("Request file: {}", path.display());

    let request = store.load_request(request_id).map_err(|e| {
        error!("Failed to load request {}: {}", request_id, e);
        e
    })?;

    println!("Request id: {}", request.request_id);
    println!("Address:    {}", request.address);
    println!("Amount:     {} sat", request.amount);

    let script = merchant_util::address_to_script(&request.address, config.btc.network())?;
    println!(
        "Electrum script hash: {:?}",
        merchant_util::script_to_electrum_hash(&script)
    );

    Ok(())
}

pub fn daemonize_process(service_name: &str) {
    let root_dir = merchant_util::get_service_dir(service_name);
    if let Err(e) = std::fs::create_dir_all(&root_dir) {
        println!(
            "Failed to create service root directory {}: {}",
            root_dir.display(),
            e
        );
        std::process::exit(1);
    }

    let (stdout, stderr) = match (File::open("/dev/null"), File::open("/dev/null")) {
        (Ok(stdout), Ok(stderr)) => (stdout, stderr),
        _ => {
            println!("Failed to open /dev/null for daemon output");
            std::process::exit(1);
        }
    };

    let pid_file = root_dir.join(format!("{}.pid", service_name));
    let daemonize = Daemonize::new()
        .pid_file(pid_file) // Specify pid file
        .chown_pid_file(true) // Change ownership of pid file
        .stdout(stdout)
        .stderr(stderr)
        .working_directory(root_dir); // Set working directory;

    match daemonize.start() {
        Ok(_) => {
            info!("{} service daemonized successfully", service_name);
        }
        Err(e) => {
            println!("Error daemonizing {} service: {}", service_name, e);
            std::process::exit(1);
        }
    }
}
