pub mod elevenlabs;

pub use elevenlabs::ElevenLabsClient;

use crate::error::Result;
use crate::transcript::Transcript;
use async_trait::async_trait;
use std::path::Path;

/// A speech-to-text provider producing word-level timestamps.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Transcript>;
    fn name(&self) -> &'static str;
}
