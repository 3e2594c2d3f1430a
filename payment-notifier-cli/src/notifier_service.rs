use super::cmd::{Cli, Commands};
use crate::client::RpcClient;
use payment_notifier::{MonitorStatus, WatchedAddress};

pub struct PaymentNotifierService {
    client: RpcClient,
}

impl PaymentNotifierService {
    pub async fn new(url: &str) -> Result<Self, String> {
        println!("Connecting to Payment Notifier Service at {}", url);
        let client = RpcClient::new(url)?;

        // Try get network type to verify connection
        let network_type = client.get_network_type().await?;
        println!("Connected to network type: {}", network_type);

        Ok(Self { client })
    }

    pub async fn process_command(&self, cli: Cli) -> Result<(), String> {
        match cli.command {
            Commands::NetworkType => {
                let network_type = self.client.get_network_type().await?;
                println!("Network Type: {}", network_type);
            }
            Commands::Status { watch } => {
                self.process_status(watch).await?;
            }
            Commands::Addresses => {
                let addresses = self.client.get_watched_addresses().await?;
                StatusFormatter::print_addresses(&addresses);
            }
            Commands::Stop => {
                self.client.stop().await?;
                println!("Stop command sent.");
            }
        }

        Ok(())
    }

    async fn process_status(&self, watch: bool) -> Result<(), String> {
        loop {
            match self.client.get_status().await {
                Ok(status) => StatusFormatter::print_status(&status),
                Err(e) if watch => println!("Failed to get status: {}", e),
                Err(e) => return Err(e),
            }

            if !watch {
                return Ok(());
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
        }
    }
}

struct StatusFormatter;

impl StatusFormatter {
    fn print_status(status: &MonitorStatus) {
        let c = &status.counters;
        println!("\nPhase:                  {:?}", status.phase);
        if let Some(ref message) = status.message {
            println!("Message:                {}", message);
        }
        println!("Watched addresses:      {}", Self::format_number(status.watched_addresses));
        println!("Pending waiters:        {}", Self::format_number(status.pending_waiters));
        println!("Requests submitted:     {}", Self::format_number(c.requests_submitted));
        println!("Requests resolved:      {}", Self::format_number(c.requests_resolved));
        println!("Requests dropped:       {}", Self::format_number(c.requests_dropped));
        println!("Notifications sent:     {}", Self::format_number(c.notifications_sent));
        println!("Transport failures:     {}", Self::format_number(c.transport_failures));
        println!("Balance fetch failures: {}", Self::format_number(c.balance_fetch_failures));
    }

    fn print_addresses(addresses: &[WatchedAddress]) {
        if addresses.is_empty() {
            println!("No watched addresses.");
            return;
        }

        println!("\n┌────────────────────────────────────────────────────────────────┬──────────────────────┐");
        println!("│ Address                                                        │ Expected (sat)       │");
        println!("├────────────────────────────────────────────────────────────────┼──────────────────────┤");

        for item in addresses {
            for amount in &item.expected_amounts {
                println!(
                    "│ {:<62} │ {:>20} │",
                    item.address,
                    Self::format_number(*amount)
                );
            }
        }

        println!("└────────────────────────────────────────────────────────────────┴──────────────────────┘");
    }

    // Add thousand separators for better readability
    fn format_number(n: u64) -> String {
        let s = n.to_string();
        let mut result = String::new();
        for (i, c) in s.chars().rev().enumerate() {
            if i > 0 && i % 3 == 0 {
                result.push(',');
            }
            result.push(c);
        }
        result.chars().rev().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(StatusFormatter::format_number(0), "0");
        assert_eq!(StatusFormatter::format_number(999), "999");
        assert_eq!(StatusFormatter::format_number(1000), "1,000");
        assert_eq!(StatusFormatter::format_number(21_000_000_00000000), "2,100,000,000,000,000");
    }
}
