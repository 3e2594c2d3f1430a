mod config;
mod electrs;
mod monitor;
mod request;
mod service;
mod status;
mod tool;
mod ws;

#[macro_use]
extern crate log;

pub use config::*;
pub use electrs::*;
pub use monitor::*;
pub use request::*;
pub use service::*;
pub use status::*;
pub use tool::*;
pub use ws::*;
