use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{AutocutError, Result};

use super::{AudioMetadata, VideoProperties};

/// Proxy video height in pixels; enough for review and audio analysis.
const PROXY_HEIGHT: u32 = 240;

/// Sample rate for extracted analysis audio.
const AUDIO_SAMPLE_RATE: u32 = 16000;

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<()> {
    let output = Command::new("ffmpeg").arg("-version").output().map_err(|e| {
        AutocutError::Media(format!(
            "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
        ))
    })?;

    if !output.status.success() {
        return Err(AutocutError::Media("FFmpeg check failed".to_string()));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<()> {
    let output = Command::new("ffprobe").arg("-version").output().map_err(|e| {
        AutocutError::Media(format!(
            "FFprobe not found. Please install FFmpeg (includes FFprobe). Error: {e}"
        ))
    })?;

    if !output.status.success() {
        return Err(AutocutError::Media("FFprobe check failed".to_string()));
    }

    debug!("FFprobe is available");
    Ok(())
}

/// Get media duration in seconds using FFprobe.
pub fn probe_duration(input: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .map_err(|e| AutocutError::Media(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AutocutError::Media(format!("FFprobe failed: {stderr}")));
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    duration_str.trim().parse().map_err(|e| {
        AutocutError::Media(format!(
            "Failed to parse duration '{}': {e}",
            duration_str.trim()
        ))
    })
}

/// Probe video geometry and frame rate from the first video stream.
pub fn probe_video(input: &Path) -> Result<VideoProperties> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate",
            "-of",
            "csv=s=,:p=0",
        ])
        .arg(input)
        .output()
        .map_err(|e| AutocutError::Media(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AutocutError::Media(format!("FFprobe failed: {stderr}")));
    }

    let info_str = String::from_utf8_lossy(&output.stdout);
    parse_video_properties(info_str.trim())
}

/// Parse "width,height,num/den" as emitted by ffprobe's csv writer.
fn parse_video_properties(raw: &str) -> Result<VideoProperties> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() < 3 {
        return Err(AutocutError::Media(format!(
            "Failed to parse video properties: {raw}"
        )));
    }

    let width: u32 = parts[0]
        .parse()
        .map_err(|e| AutocutError::Media(format!("Failed to parse width: {e}")))?;
    let height: u32 = parts[1]
        .parse()
        .map_err(|e| AutocutError::Media(format!("Failed to parse height: {e}")))?;

    let (frame_rate_num, frame_rate_den) = match parts[2].split_once('/') {
        Some((num, den)) => {
            let num: u32 = num
                .parse()
                .map_err(|e| AutocutError::Media(format!("Failed to parse frame rate: {e}")))?;
            let den: u32 = den
                .parse()
                .map_err(|e| AutocutError::Media(format!("Failed to parse frame rate: {e}")))?;
            (num, den)
        }
        None => {
            let num: u32 = parts[2]
                .parse()
                .map_err(|e| AutocutError::Media(format!("Failed to parse frame rate: {e}")))?;
            (num, 1)
        }
    };

    if frame_rate_den == 0 {
        return Err(AutocutError::Media(format!(
            "Zero frame rate denominator in '{raw}'"
        )));
    }

    Ok(VideoProperties {
        width,
        height,
        frame_rate_num,
        frame_rate_den,
    })
}

/// Generate a low-resolution proxy of the input video.
///
/// The proxy keeps full duration but drops to 240p, which is plenty for
/// review cuts while the expensive final render still reads the original.
pub async fn generate_proxy(input: &Path, output: &Path) -> Result<()> {
    check_ffmpeg()?;

    if !input.exists() {
        return Err(AutocutError::FileNotFound(input.display().to_string()));
    }

    info!("Generating {}p proxy from {}", PROXY_HEIGHT, input.display());

    let status = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(input)
        .args([
            "-vf",
            // -2 keeps the width divisible by two for the encoder.
            &format!("scale=-2:{PROXY_HEIGHT}"),
            "-c:v",
            "libx264",
            "-preset",
            "fast",
            "-crf",
            "28",
            "-c:a",
            "aac",
            "-b:a",
            "128k",
        ])
        .arg(output)
        .status()
        .map_err(|e| AutocutError::Media(format!("Failed to run FFmpeg: {e}")))?;

    if !status.success() {
        return Err(AutocutError::Media(
            "FFmpeg proxy generation failed".to_string(),
        ));
    }

    if !output.exists() {
        return Err(AutocutError::Media(
            "Proxy file was not created".to_string(),
        ));
    }

    info!("Proxy video created at {}", output.display());
    Ok(())
}

/// Extract the audio track as mono 16-bit PCM WAV at 16 kHz.
///
/// Both the transcription upload and the silence analysis read this file.
pub async fn extract_audio(input: &Path, output: &Path) -> Result<AudioMetadata> {
    check_ffmpeg()?;
    check_ffprobe()?;

    if !input.exists() {
        return Err(AutocutError::FileNotFound(input.display().to_string()));
    }

    info!("Extracting audio from {}", input.display());

    let duration = probe_duration(input)?;
    debug!("Input duration: {duration:.2}s");

    let status = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(input)
        .args([
            "-vn",
            "-acodec",
            "pcm_s16le",
            "-ar",
            &AUDIO_SAMPLE_RATE.to_string(),
            "-ac",
            "1",
        ])
        .arg(output)
        .status()
        .map_err(|e| AutocutError::Media(format!("Failed to run FFmpeg: {e}")))?;

    if !status.success() {
        return Err(AutocutError::Media(
            "FFmpeg audio extraction failed".to_string(),
        ));
    }

    if !output.exists() {
        return Err(AutocutError::Media(
            "Output file was not created".to_string(),
        ));
    }

    info!("Audio extracted to {}", output.display());

    Ok(AudioMetadata {
        duration,
        sample_rate: AUDIO_SAMPLE_RATE,
        channels: 1,
    })
}
