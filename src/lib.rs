#[macro_use]
extern crate log;

pub mod app;
pub mod authority;
pub mod common;
pub mod display;
pub mod event;
pub mod fs;
pub mod helper;
pub mod seat;
pub mod server;
pub mod session;
pub mod socket;
pub mod users;
