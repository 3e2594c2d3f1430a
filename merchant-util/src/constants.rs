// Service names
pub const PAYMENT_NOTIFIER_SERVICE_NAME: &str = "payment-notifier";
pub const PAYMENT_NOTIFIER_CLI_TOOL_NAME: &str = "payment-notifier-cli";

// Directory constants
pub const MERCHANT_ROOT_DIR: &str = ".merchant";
pub const REQUESTS_DIR_NAME: &str = "requests";

// Service ports
pub const PAYMENT_NOTIFIER_WEBSOCKET_PORT: u16 = 8096;
pub const PAYMENT_NOTIFIER_SERVICE_HTTP_PORT: u16 = 8097;

// Payload sent to a websocket client once its request is paid
pub const PAID_NOTIFICATION: &str = "paid";
