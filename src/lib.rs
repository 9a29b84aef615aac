pub mod api;
pub mod cli;
pub mod clipboard;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod host;
pub mod storage;
pub mod vault;
