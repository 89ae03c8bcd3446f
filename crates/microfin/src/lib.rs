pub mod config;
pub mod error;
pub mod identifier;
pub mod lending;
pub mod money;
pub mod sequence;
pub mod telemetry;
