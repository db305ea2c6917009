//! Lyricwipe - lyrics video generation
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (jobs, transcripts, caption timing, scenes)
//! - ports/: Trait definitions for the external collaborators
//! - adapters/: Concrete implementations (ffmpeg, python speech models, HTTP)
//! - application/: Services sequencing a job through its stages
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use config::AppConfig;
pub use domain::captions::{build_caption_layers, CaptionLayer, CaptionMode};
pub use domain::transcript::{Segment, WordTiming};
