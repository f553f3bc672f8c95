pub mod config;
pub mod logging;

pub mod http;
pub mod orders;
pub mod retry;
