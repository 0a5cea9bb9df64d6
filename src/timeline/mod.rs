//! The timeline compiler.
//!
//! Turns the ordered list of kept, silence-trimmed sentences into the
//! compiled timeline: a contiguous clip sequence whose in/out points
//! reference the original media and whose positions reference the new, cut
//! timeline. Everything downstream (overlay resolution, graph building,
//! the renderer document) is derived from this sequence.
//!
//! The compiler is pure and cheap: it is rerun from scratch whenever the
//! decision changes, and identical inputs always produce an identical clip
//! sequence.

pub mod graph;
pub mod overlay;

use crate::error::{AutocutError, Result};
use crate::transcript::SentenceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A sentence's bounds after silence trimming.
///
/// Invariant: `original_start <= adjusted_start <= adjusted_end <=
/// original_end`. Trimming shrinks, never grows and never inverts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedSegment {
    pub sentence_id: SentenceId,
    pub original_start: f64,
    pub original_end: f64,
    pub adjusted_start: f64,
    pub adjusted_end: f64,
    #[serde(default)]
    pub text: String,
}

impl AdjustedSegment {
    /// Trim-free segment: adjusted bounds equal the raw bounds.
    pub fn untrimmed(sentence_id: SentenceId, start: f64, end: f64) -> Self {
        Self {
            sentence_id,
            original_start: start,
            original_end: end,
            adjusted_start: start,
            adjusted_end: end,
            text: String::new(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.adjusted_end - self.adjusted_start
    }
}

/// One clip on the compiled timeline. `source_in/out` reference the
/// original media; `timeline_start/duration` reference the cut timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledClip {
    pub source_in: f64,
    pub source_out: f64,
    pub timeline_start: f64,
    pub timeline_duration: f64,
    pub source_sentence_id: SentenceId,
}

impl CompiledClip {
    pub fn timeline_end(&self) -> f64 {
        self.timeline_start + self.timeline_duration
    }
}

/// The compiled clip sequence plus a sentence-id lookup, built once per
/// compile and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ClipIndex {
    clips: Vec<CompiledClip>,
    by_sentence: HashMap<SentenceId, usize>,
}

impl ClipIndex {
    pub fn clips(&self) -> &[CompiledClip] {
        &self.clips
    }

    pub fn into_clips(self) -> Vec<CompiledClip> {
        self.clips
    }

    pub fn get(&self, id: SentenceId) -> Option<&CompiledClip> {
        self.by_sentence.get(&id).map(|&i| &self.clips[i])
    }

    pub fn position(&self, id: SentenceId) -> Option<usize> {
        self.by_sentence.get(&id).copied()
    }

    /// Total duration of the cut timeline.
    pub fn total_duration(&self) -> f64 {
        self.clips.last().map(|c| c.timeline_end()).unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }
}

/// Compile the kept sentences into the contiguous clip sequence.
///
/// `kept` is the ordered output of the segment selector; `segments` maps
/// every kept id to its adjusted bounds. One clip is emitted per kept
/// sentence. Adjacent clips are never merged even when contiguous in the
/// source, so each clip keeps its sentence provenance for overlay
/// resolution and debugging.
///
/// A zero-length adjusted window is rejected with `DegenerateSegment`
/// rather than dropped: a silently vanishing sentence would desynchronize
/// every externally tracked sentence-to-time mapping.
pub fn compile_timeline(
    kept: &[SentenceId],
    segments: &HashMap<SentenceId, AdjustedSegment>,
) -> Result<ClipIndex> {
    let mut clips = Vec::with_capacity(kept.len());
    let mut by_sentence = HashMap::with_capacity(kept.len());
    let mut cursor = 0.0_f64;

    for &id in kept {
        let segment = segments.get(&id).ok_or_else(|| {
            AutocutError::Media(format!("no adjusted segment for kept sentence {id}"))
        })?;

        if segment.adjusted_start > segment.adjusted_end {
            return Err(AutocutError::InvalidBounds {
                id,
                start: segment.adjusted_start,
                end: segment.adjusted_end,
            });
        }

        let duration = segment.duration();
        if duration <= 0.0 {
            return Err(AutocutError::DegenerateSegment(id));
        }

        by_sentence.insert(id, clips.len());
        clips.push(CompiledClip {
            source_in: segment.adjusted_start,
            source_out: segment.adjusted_end,
            timeline_start: cursor,
            timeline_duration: duration,
            source_sentence_id: id,
        });
        cursor += duration;
    }

    Ok(ClipIndex { clips, by_sentence })
}
