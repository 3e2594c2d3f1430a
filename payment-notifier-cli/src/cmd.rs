use clap::{Parser, Subcommand};
use merchant_util::PAYMENT_NOTIFIER_SERVICE_HTTP_PORT;

#[derive(Parser)]
#[command(name = "payment-notifier-cli")]
#[command(about = "Payment notifier JSON-RPC client")]
pub struct Cli {
    #[arg(short, long, default_value_t = format!("http://127.0.0.1:{}", PAYMENT_NOTIFIER_SERVICE_HTTP_PORT))]
    pub url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Get the watched bitcoin network
    NetworkType,

    /// Get monitor status and counters
    Status {
        /// Keep displaying updates every second
        #[arg(short, long, default_value_t = false)]
        watch: bool,
    },

    /// List watched addresses and their pending amounts
    Addresses,

    /// Stop the payment notifier service
    Stop,
}
