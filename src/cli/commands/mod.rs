//! One module per subcommand; each exposes `execute`.

pub mod add_login;
pub mod add_note;
pub mod copy;
pub mod create;
pub mod export;
pub mod import_cmd;
pub mod list;
pub mod passwd;
pub mod remove;
pub mod show;
pub mod status;
