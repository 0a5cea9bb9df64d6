//! Silence trimming: tighten each sentence's bounds around actual speech.
//!
//! Two policies feed the same [`AdjustedSegment`] output. The energy policy
//! analyzes the extracted WAV per sentence with an adaptive dB threshold;
//! the word-bounds policy falls back to the transcript's own word timing
//! when no audio is available. Either way the adjusted window stays inside
//! the raw bounds and never overlaps a neighbor's window.

use std::path::Path;

use hound::WavReader;
use tracing::{debug, info, warn};

use crate::error::{AutocutError, Result};
use crate::timeline::AdjustedSegment;
use crate::transcript::Sentence;

/// Tuning for energy-based silence detection.
#[derive(Debug, Clone)]
pub struct SilenceConfig {
    /// Percentile of frame dB treated as the typical speech level.
    pub speech_percentile: f64,

    /// dB below the speech level at which a frame counts as silence.
    pub threshold_offset_db: f64,

    /// Seconds of padding kept around detected speech.
    pub padding: f64,

    /// If a sentence's own threshold sits this many dB below the whole-file
    /// threshold, the sentence is mostly silence and the file-level
    /// threshold is used instead.
    pub file_level_margin_db: f64,

    /// Analysis frame length in samples.
    pub frame_len: usize,

    /// Hop between frames in samples.
    pub hop_len: usize,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            speech_percentile: 85.0,
            threshold_offset_db: 15.0,
            padding: 0.02,
            file_level_margin_db: 5.0,
            frame_len: 512,
            hop_len: 256,
        }
    }
}

/// Energy-based trimmer over one decoded audio file.
///
/// The WAV is decoded once; each sentence is then analyzed over its own
/// sample range against both a clip-level and a file-level threshold.
pub struct AudioTrimmer {
    samples: Vec<f32>,
    sample_rate: u32,
    config: SilenceConfig,
    file_threshold_db: f64,
}

impl AudioTrimmer {
    pub fn from_wav(path: &Path, config: SilenceConfig) -> Result<Self> {
        let reader = WavReader::open(path)
            .map_err(|e| AutocutError::AudioAnalysis(format!("Failed to open WAV file: {e}")))?;

        let spec = reader.spec();
        let sample_rate = spec.sample_rate;

        info!(
            "Analyzing audio: {} Hz, {} channels, {} bits",
            sample_rate, spec.channels, spec.bits_per_sample
        );

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => reader
                .into_samples::<i16>()
                .map(|s| s.unwrap_or(0) as f32 / i16::MAX as f32)
                .collect(),
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.unwrap_or(0.0))
                .collect(),
        };

        if samples.is_empty() {
            return Err(AutocutError::AudioAnalysis(
                "Audio file contains no samples".to_string(),
            ));
        }

        let file_threshold_db = file_threshold(&samples, &config);
        debug!("File-level silence threshold: {file_threshold_db:.2} dB");

        Ok(Self {
            samples,
            sample_rate,
            config,
            file_threshold_db,
        })
    }

    /// Trim every sentence. The input list must be in original timeline
    /// order; neighbor-overlap clamping relies on it.
    pub fn trim(&self, sentences: &[Sentence]) -> Result<Vec<AdjustedSegment>> {
        let mut segments = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            segments.push(self.trim_sentence(sentence)?);
        }
        clamp_neighbor_overlaps(&mut segments);
        Ok(segments)
    }

    fn trim_sentence(&self, sentence: &Sentence) -> Result<AdjustedSegment> {
        sentence.validate_bounds()?;

        let start = sentence.start;
        let end = sentence.end;
        let untrimmed = || {
            let mut seg = AdjustedSegment::untrimmed(sentence.id, start, end);
            seg.text = sentence.text.clone();
            seg
        };

        let from = (start * self.sample_rate as f64) as usize;
        let to = ((end * self.sample_rate as f64) as usize).min(self.samples.len());
        if from >= to {
            return Ok(untrimmed());
        }

        let slice = &self.samples[from..to];
        let frames = rms_frames(slice, self.config.frame_len, self.config.hop_len);
        if frames.is_empty() {
            return Ok(untrimmed());
        }

        let peak = frames.iter().cloned().fold(f64::MIN, f64::max);
        if peak <= 0.0 {
            // Digital silence end to end.
            return Ok(untrimmed());
        }

        let frames_db: Vec<f64> = frames.iter().map(|&rms| 20.0 * (rms / peak).log10()).collect();

        let clip_speech_db = percentile(&frames_db, self.config.speech_percentile);
        let clip_threshold = clip_speech_db - self.config.threshold_offset_db;

        // A mostly-silent sentence drags its own speech level down with it;
        // fall back to the file-level threshold there.
        let threshold = if self.file_threshold_db - clip_threshold > self.config.file_level_margin_db
        {
            debug!(
                "Sentence {}: using file-level threshold {:.2} dB",
                sentence.id, self.file_threshold_db
            );
            self.file_threshold_db
        } else {
            clip_threshold
        };

        let first = frames_db.iter().position(|&db| db > threshold);
        let last = frames_db.iter().rposition(|&db| db > threshold);
        let (first, last) = match (first, last) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                debug!(
                    "Sentence {}: no speech above {:.2} dB, keeping raw bounds",
                    sentence.id, threshold
                );
                return Ok(untrimmed());
            }
        };

        let hop_secs = self.config.hop_len as f64 / self.sample_rate as f64;
        let start_offset = first as f64 * hop_secs;
        let end_offset = (last + 1) as f64 * hop_secs;

        let adjusted_start = (start + start_offset - self.config.padding).max(start);
        let adjusted_end = (start + end_offset + self.config.padding).min(end);

        debug!(
            "Sentence {}: trimmed {:.3}s from start, {:.3}s from end",
            sentence.id,
            adjusted_start - start,
            end - adjusted_end
        );

        Ok(AdjustedSegment {
            sentence_id: sentence.id,
            original_start: start,
            original_end: end,
            adjusted_start,
            adjusted_end,
            text: sentence.text.clone(),
        })
    }
}

/// Word-bounds policy: no audio, trim to the first and last word's
/// timestamps clamped into the raw bounds. Sentences without words keep
/// their raw bounds unchanged.
pub fn trim_to_word_bounds(sentences: &[Sentence]) -> Result<Vec<AdjustedSegment>> {
    let mut segments = Vec::with_capacity(sentences.len());

    for sentence in sentences {
        sentence.validate_bounds()?;

        let mut segment = AdjustedSegment::untrimmed(sentence.id, sentence.start, sentence.end);
        segment.text = sentence.text.clone();

        if let (Some(first), Some(last)) = (sentence.words.first(), sentence.words.last()) {
            let start = first.start.clamp(sentence.start, sentence.end);
            let end = last.end.clamp(sentence.start, sentence.end);
            if start <= end {
                segment.adjusted_start = start;
                segment.adjusted_end = end;
            }
        }

        segments.push(segment);
    }

    clamp_neighbor_overlaps(&mut segments);
    Ok(segments)
}

/// Trim with whichever policy the available inputs allow: energy analysis
/// when the extracted WAV is present, word bounds otherwise.
pub fn trim_sentences(
    sentences: &[Sentence],
    audio: Option<&Path>,
    config: SilenceConfig,
) -> Result<Vec<AdjustedSegment>> {
    match audio {
        Some(path) if path.exists() => AudioTrimmer::from_wav(path, config)?.trim(sentences),
        _ => {
            info!("No extracted audio found; trimming to word bounds");
            trim_to_word_bounds(sentences)
        }
    }
}

/// Adjacent sentences must not end up with overlapping adjusted windows in
/// the original timeline. A would-be overlap is clamped to its midpoint;
/// the condition is a warning, not an error.
fn clamp_neighbor_overlaps(segments: &mut [AdjustedSegment]) {
    for i in 1..segments.len() {
        let prev_end = segments[i - 1].adjusted_end;
        let next_start = segments[i].adjusted_start;
        if prev_end > next_start {
            let mid = 0.5 * (prev_end + next_start);
            warn!(
                "Adjusted windows of sentences {} and {} overlap by {:.3}s; clamped to midpoint",
                segments[i - 1].sentence_id,
                segments[i].sentence_id,
                prev_end - next_start
            );
            segments[i - 1].adjusted_end = mid.max(segments[i - 1].adjusted_start);
            segments[i].adjusted_start = mid.min(segments[i].adjusted_end);
        }
    }
}

/// Whole-file silence threshold: speech percentile minus the offset, over
/// the full RMS profile.
fn file_threshold(samples: &[f32], config: &SilenceConfig) -> f64 {
    let frames = rms_frames(samples, config.frame_len, config.hop_len);
    let peak = frames.iter().cloned().fold(f64::MIN, f64::max);
    if frames.is_empty() || peak <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let frames_db: Vec<f64> = frames.iter().map(|&rms| 20.0 * (rms / peak).log10()).collect();
    percentile(&frames_db, config.speech_percentile) - config.threshold_offset_db
}

/// RMS energy per sliding window.
fn rms_frames(samples: &[f32], frame_len: usize, hop_len: usize) -> Vec<f64> {
    let mut frames = Vec::new();
    let mut pos = 0;

    while pos + frame_len <= samples.len() {
        let window = &samples[pos..pos + frame_len];
        let sum_squares: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
        frames.push((sum_squares / frame_len as f64).sqrt());
        pos += hop_len;
    }

    // A slice shorter than one frame still gets a single frame.
    if frames.is_empty() && !samples.is_empty() {
        let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        frames.push((sum_squares / samples.len() as f64).sqrt());
    }

    frames
}

/// Linearly interpolated percentile over unsorted values.
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let weight = rank - lo as f64;
        sorted[lo] * (1.0 - weight) + sorted[hi] * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{SentenceId, WordSpan};
    use hound::{SampleFormat, WavSpec, WavWriter};

    const TEST_RATE: u32 = 16000;

    fn sentence(id: u32, start: f64, end: f64, words: Vec<WordSpan>) -> Sentence {
        Sentence {
            id: SentenceId(id),
            text: format!("sentence {id}"),
            start,
            end,
            words,
        }
    }

    fn word(start: f64, end: f64) -> WordSpan {
        WordSpan {
            word: "w".to_string(),
            start,
            end,
        }
    }

    /// Write a WAV that is silent except for a loud band in
    /// [speech_from, speech_to) seconds.
    fn tone_wav(total: f64, speech_from: f64, speech_to: f64) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        let spec = WavSpec {
            channels: 1,
            sample_rate: TEST_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(file.path(), spec).unwrap();
        let total_samples = (total * TEST_RATE as f64) as usize;
        for i in 0..total_samples {
            let t = i as f64 / TEST_RATE as f64;
            let sample = if t >= speech_from && t < speech_to {
                if i % 2 == 0 {
                    12000
                } else {
                    -12000
                }
            } else {
                0
            };
            writer.write_sample::<i16>(sample).unwrap();
        }
        writer.finalize().unwrap();
        file
    }

    #[test]
    fn test_energy_trim_tightens_bounds() {
        // Sentence spans [0, 3] but speech only occupies [1, 2].
        let wav = tone_wav(3.0, 1.0, 2.0);
        let trimmer = AudioTrimmer::from_wav(wav.path(), SilenceConfig::default()).unwrap();

        let segments = trimmer
            .trim(&[sentence(1, 0.0, 3.0, vec![])])
            .unwrap();
        let seg = &segments[0];

        assert!(seg.adjusted_start > 0.5, "start not trimmed: {seg:?}");
        assert!(seg.adjusted_end < 2.5, "end not trimmed: {seg:?}");
        assert!(seg.adjusted_start <= 1.0 + 0.1);
        assert!(seg.adjusted_end >= 2.0 - 0.1);
        assert!(seg.original_start <= seg.adjusted_start);
        assert!(seg.adjusted_end <= seg.original_end);
    }

    #[test]
    fn test_silent_sentence_keeps_raw_bounds() {
        // Speech exists in the file, but this sentence is digital silence
        // end to end; its bounds pass through unchanged.
        let wav = tone_wav(4.0, 0.0, 1.0);
        let trimmer = AudioTrimmer::from_wav(wav.path(), SilenceConfig::default()).unwrap();

        let segments = trimmer.trim(&[sentence(1, 2.0, 4.0, vec![])]).unwrap();
        assert_eq!(segments[0].adjusted_start, 2.0);
        assert_eq!(segments[0].adjusted_end, 4.0);
    }

    #[test]
    fn test_inverted_bounds_are_fatal() {
        let wav = tone_wav(1.0, 0.0, 1.0);
        let trimmer = AudioTrimmer::from_wav(wav.path(), SilenceConfig::default()).unwrap();

        let err = trimmer.trim(&[sentence(1, 0.8, 0.2, vec![])]).unwrap_err();
        assert!(matches!(err, AutocutError::InvalidBounds { .. }));
    }

    #[test]
    fn test_word_bounds_trim() {
        let sentences = vec![sentence(
            1,
            0.0,
            5.0,
            vec![word(0.4, 0.9), word(1.0, 1.6), word(1.7, 4.2)],
        )];
        let segments = trim_to_word_bounds(&sentences).unwrap();

        assert_eq!(segments[0].adjusted_start, 0.4);
        assert_eq!(segments[0].adjusted_end, 4.2);
        assert_eq!(segments[0].original_start, 0.0);
        assert_eq!(segments[0].original_end, 5.0);
    }

    #[test]
    fn test_word_bounds_without_words_is_noop() {
        let sentences = vec![sentence(1, 1.0, 2.0, vec![])];
        let segments = trim_to_word_bounds(&sentences).unwrap();
        assert_eq!(segments[0].adjusted_start, 1.0);
        assert_eq!(segments[0].adjusted_end, 2.0);
    }

    #[test]
    fn test_word_bounds_clamped_into_sentence() {
        // Word timestamps that leak past the sentence bounds get clamped.
        let sentences = vec![sentence(1, 1.0, 2.0, vec![word(0.5, 1.2), word(1.4, 2.6)])];
        let segments = trim_to_word_bounds(&sentences).unwrap();
        assert_eq!(segments[0].adjusted_start, 1.0);
        assert_eq!(segments[0].adjusted_end, 2.0);
    }

    #[test]
    fn test_neighbor_overlap_clamped_to_midpoint() {
        let sentences = vec![
            sentence(1, 0.0, 2.0, vec![word(0.0, 1.8)]),
            sentence(2, 1.0, 3.0, vec![word(1.2, 3.0)]),
        ];
        let segments = trim_to_word_bounds(&sentences).unwrap();

        // Adjusted windows [0,1.8] and [1.2,3.0] overlapped; both clamp to 1.5.
        assert_eq!(segments[0].adjusted_end, 1.5);
        assert_eq!(segments[1].adjusted_start, 1.5);
        assert!(segments[0].adjusted_start <= segments[0].adjusted_end);
        assert!(segments[1].adjusted_start <= segments[1].adjusted_end);
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = vec![0.0, 10.0];
        assert_eq!(percentile(&values, 0.0), 0.0);
        assert_eq!(percentile(&values, 100.0), 10.0);
        assert_eq!(percentile(&values, 50.0), 5.0);

        let values = vec![1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&values, 85.0) - 3.55).abs() < 1e-9);
    }

    #[test]
    fn test_rms_frames_window_sizes() {
        let samples = vec![0.5f32; 1024];
        let frames = rms_frames(&samples, 512, 256);
        assert_eq!(frames.len(), 3);
        assert!((frames[0] - 0.5).abs() < 1e-6);

        // Shorter than one frame still yields one value.
        let short = vec![0.25f32; 100];
        assert_eq!(rms_frames(&short, 512, 256).len(), 1);
    }
}
