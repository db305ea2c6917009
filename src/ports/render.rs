use crate::domain::errors::RenderError;
use crate::domain::scene::{EncoderProfile, Scene};
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `scene` into a container file at `output` with one encoder profile
    async fn render(
        &self,
        scene: &Scene,
        output: &Path,
        profile: &EncoderProfile,
    ) -> Result<(), RenderError>;
}
