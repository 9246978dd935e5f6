//! CLI command handlers. Each command is in its own file.

pub(crate) mod fetch;
mod profile;

pub use fetch::run_fetch;
pub use profile::run_profile;
