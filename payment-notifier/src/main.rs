#[macro_use]
extern crate log;

use clap::{Parser, Subcommand};
use merchant_util::{LogConfig, PAYMENT_NOTIFIER_SERVICE_NAME};
use payment_notifier::{
    ElectrsSubscriber, ElectrsSubscriberRef, FileRequestStore, FileRequestStoreRef,
    MonitorStatusManager, PaymentMonitor, PaymentNotifierConfig, PaymentNotifierRpcServer,
    WsServer,
};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "payment-notifier")]
#[command(version = "0.1.0")]
#[command(about = "Notify websocket clients when a bitcoin payment request is paid", long_about = None)]
struct PaymentNotifierCli {
    #[command(subcommand)]
    command: Option<PaymentNotifierCommands>,

    /// Run the service in daemon mode
    #[arg(short, long)]
    daemon: bool,
}

#[derive(Subcommand, Debug, Clone)]
#[command(rename_all = "kebab-case")]
enum PaymentNotifierCommands {
    /// Resolve a payment request from the request store and print it
    CheckRequest {
        #[arg(value_name = "REQUEST_ID")]
        request_id: String,
    },
}

fn load_config() -> PaymentNotifierConfig {
    let root_dir = merchant_util::get_service_dir(PAYMENT_NOTIFIER_SERVICE_NAME);
    match PaymentNotifierConfig::load(&root_dir) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load config: {}", e);
            println!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    }
}

async fn main_run() {
    let (_lock, _guard) = merchant_util::init_process_lock(PAYMENT_NOTIFIER_SERVICE_NAME);

    // Init file logging
    let log_config = LogConfig::new(PAYMENT_NOTIFIER_SERVICE_NAME).enable_console(false);
    merchant_util::init_log(log_config);

    let root_dir = merchant_util::get_service_dir(PAYMENT_NOTIFIER_SERVICE_NAME);
    info!("Using service directory: {}", root_dir.display());
    println!("Using service directory: {}", root_dir.display());

    let config = Arc::new(load_config());

    let requests_dir = config.requests.requests_dir();
    info!("Using requests directory: {}", requests_dir.display());
    let store: FileRequestStoreRef = Arc::new(FileRequestStore::new(&requests_dir, config.btc.network()));

    let (subscriber, status_rx) =
        ElectrsSubscriber::new(config.electrs.clone(), config.btc.network());
    let subscriber: ElectrsSubscriberRef = Arc::new(subscriber);

    let status = Arc::new(MonitorStatusManager::new());
    let monitor = PaymentMonitor::new(
        subscriber.clone(),
        subscriber.clone(),
        store,
        status.clone(),
    );
    let monitor = Arc::new(monitor);

    // Signals every background loop to stop
    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

    // Requested through RPC
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(());

    let rpc_server =
        match PaymentNotifierRpcServer::start(config.clone(), monitor.clone(), shutdown_tx) {
            Ok(server) => server,
            Err(e) => {
                error!("Failed to start RPC server: {}", e);
                println!("Failed to start RPC server: {}", e);
                std::process::exit(1);
            }
        };
    println!("RPC server started at {}", rpc_server.get_listen_url());

    let subscriber_task = tokio::spawn(subscriber.clone().run(stop_rx.clone()));

    // Subscriptions must be in place before any status change is handled
    monitor.recover_subscriptions().await;

    let dispatcher_task = tokio::spawn(payment_notifier::run_status_dispatcher(
        monitor.clone(),
        status_rx,
        stop_rx.clone(),
    ));

    let ws_server = match WsServer::start(config.clone(), monitor.clone()).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start websocket server: {}", e);
            println!("Failed to start websocket server: {}", e);
            std::process::exit(1);
        }
    };
    println!("Websocket server started at {}", ws_server.get_listen_url());

    // Create a Future to wait for Ctrl+C (SIGINT) signal
    use tokio::signal;
    let sigint = signal::ctrl_c();

    // Create a Future to wait for SIGTERM signal (sent by kill command by default)
    #[cfg(unix)]
    let sigterm = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to create SIGTERM signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    // On non-Unix systems, we only rely on Ctrl+C
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let mut intake_task = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.run().await }
    });

    let intake_stopped = tokio::select! {
        _ = sigint => {
            info!("Received Ctrl+C, shutting down...");
            println!("Shutting down...");
            false
        }
        _ = sigterm => {
            info!("Received SIGTERM, shutting down...");
            println!("Shutting down...");
            false
        }
        _ = shutdown_rx.changed() => {
            info!("Shutdown signal received from RPC, shutting down...");
            println!("Shutting down...");
            false
        }
        ret = &mut intake_task => {
            if let Err(e) = ret {
                error!("Intake task failed: {}", e);
            }
            warn!("Intake loop exited unexpectedly");
            true
        }
    };

    // Cleanup on shutdown, the request being resolved is finished first
    monitor.shutdown();
    if !intake_stopped {
        if let Err(e) = intake_task.await {
            error!("Intake task failed: {}", e);
        }
    }
    stop_tx.send_replace(true);

    ws_server.close().await;
    if let Err(e) = dispatcher_task.await {
        error!("Status dispatcher task failed: {}", e);
    }
    if let Err(e) = subscriber_task.await {
        error!("Electrs subscriber task failed: {}", e);
    }
    rpc_server.close().await;

    let status = monitor.get_status();
    info!(
        "Shutdown complete: watched_addresses={}, pending_waiters={}, counters={:?}",
        status.watched_addresses, status.pending_waiters, status.counters
    );
    println!("Shutdown complete.");

    // Sleep a moment to ensure all logs are flushed
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
}

#[tokio::main]
async fn main() {
    let cli = PaymentNotifierCli::parse();

    match cli.command {
        Some(PaymentNotifierCommands::CheckRequest { request_id }) => {
            let log_config = LogConfig::new(PAYMENT_NOTIFIER_SERVICE_NAME)
                .with_file_name(&format!("{}_check_request", PAYMENT_NOTIFIER_SERVICE_NAME))
                .enable_console(true);
            merchant_util::init_log(log_config);

            let config = load_config();
            if let Err(e) = payment_notifier::check_request(&config, &request_id) {
                println!("Failed to check request {}: {}", request_id, e);
                std::process::exit(1);
            }
            return;
        }
        None => {}
    }

    if cli.daemon {
        // Proceed to daemonize and run the main process
        payment_notifier::daemonize_process(PAYMENT_NOTIFIER_SERVICE_NAME);
    }

    main_run().await;
    println!("Payment notifier service exited.");
}
