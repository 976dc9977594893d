//! Command implementations, one module per subcommand.

pub mod cancel;
pub mod delete_voice;
pub mod jobs;
pub mod sing;
pub mod train;
pub mod voices;
