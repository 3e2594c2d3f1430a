mod channel;
mod server;

pub use channel::*;
pub use server::*;
