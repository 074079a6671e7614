//! CLI command implementations

pub mod start;
pub mod status;
pub mod stop;
