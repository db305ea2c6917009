//! Application layer - services that drive the ports.

pub mod composer;
pub mod orchestrator;
pub mod preprocessor;
pub mod registry;
pub mod transcript;
