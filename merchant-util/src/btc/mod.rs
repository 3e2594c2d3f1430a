mod electrs;

pub use electrs::*;
