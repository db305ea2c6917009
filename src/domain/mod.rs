//! Domain layer - Pure business logic.

pub mod captions;
pub mod errors;
pub mod jobs;
pub mod scene;
pub mod transcript;
