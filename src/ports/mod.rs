//! Ports - Trait definitions for every external collaborator.

pub mod media;
pub mod render;
pub mod speech;
