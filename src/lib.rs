#[macro_use]
extern crate log;

pub mod connection;
pub mod console;
pub mod session;
