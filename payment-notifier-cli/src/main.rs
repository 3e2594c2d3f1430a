mod client;
mod cmd;
mod notifier_service;

use clap::Parser;
use cmd::Cli;
use notifier_service::PaymentNotifierService;

#[tokio::main]
async fn main() {
    let log_config = merchant_util::LogConfig::new(merchant_util::PAYMENT_NOTIFIER_CLI_TOOL_NAME)
        .enable_file(false)
        .enable_console(true)
        .with_level("warn");

    merchant_util::init_log(log_config);

    let cli = Cli::parse();
    let service = match PaymentNotifierService::new(&cli.url).await {
        Ok(service) => service,
        Err(e) => {
            println!("Failed to connect to payment notifier service: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = service.process_command(cli).await {
        println!("Error processing command: {}", e);
        std::process::exit(1);
    }
}
