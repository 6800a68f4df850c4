//! CLI command implementations

pub(crate) mod analyze;
pub(crate) mod common;
pub(crate) mod config;
pub(crate) mod estimate;
pub(crate) mod init;
pub(crate) mod render;
pub(crate) mod run;
