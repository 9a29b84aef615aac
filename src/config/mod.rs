//! Configuration: `.encryptoor.toml` settings and resolved paths.

pub mod settings;

pub use settings::{Settings, VaultPaths};
