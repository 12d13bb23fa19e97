//! Command implementations, one module per subcommand.

#[cfg(feature = "audit-log")]
pub mod audit_cmd;

pub mod add;
pub mod export;
pub mod import_cmd;
pub mod init;
pub mod list;
pub mod passwd;
pub mod remove;
pub mod reset;
