pub mod afk;
pub mod cache;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod memory;
pub mod providers;
pub mod scheduler;
pub mod services;

pub type Result<T> = std::result::Result<T, error::NovaError>;
