mod channel;
mod client;
mod dispatcher;
mod monitor;
mod registry;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use channel::*;
pub use client::*;
pub use dispatcher::*;
pub use monitor::*;
pub use registry::*;
pub use types::*;
