//! Overlay time mapping: image placements resolved against the compiled
//! timeline.

use crate::error::{AutocutError, Result};
use crate::timeline::ClipIndex;
use crate::transcript::SentenceId;
use serde::{Deserialize, Serialize};

/// Normalized rectangle constraining where an overlay may be positioned,
/// as fractions of the frame in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl SafeZone {
    pub fn validate(&self) -> Result<()> {
        let ordered = self.left < self.right && self.top < self.bottom;
        let bounded = [self.top, self.bottom, self.left, self.right]
            .iter()
            .all(|v| (0.0..=1.0).contains(v));
        if !ordered || !bounded {
            return Err(AutocutError::Config(format!(
                "safe zone {:.3}/{:.3}/{:.3}/{:.3} is not a rectangle inside [0,1]",
                self.top, self.bottom, self.left, self.right
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }
}

impl Default for SafeZone {
    // Upper-middle band: 20-40% height, 30-70% width.
    fn default() -> Self {
        Self {
            top: 0.20,
            bottom: 0.40,
            left: 0.30,
            right: 0.70,
        }
    }
}

/// An authored request to show an image while given sentences are spoken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePlacement {
    pub image_ref: String,
    pub sentence_ids: Vec<SentenceId>,
    #[serde(default)]
    pub safe_zone: SafeZone,
}

impl ImagePlacement {
    pub fn validate(&self) -> Result<()> {
        if self.sentence_ids.is_empty() {
            return Err(AutocutError::Config(format!(
                "image placement '{}' references no sentences",
                self.image_ref
            )));
        }
        self.safe_zone.validate()
    }
}

/// A resolved overlay interval on the compiled timeline. Derived only,
/// never authored directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayWindow {
    pub image_ref: String,
    pub timeline_start: f64,
    pub timeline_end: f64,
    pub safe_zone: SafeZone,
}

impl OverlayWindow {
    pub fn duration(&self) -> f64 {
        self.timeline_end - self.timeline_start
    }

    pub fn overlaps(&self, other: &OverlayWindow) -> bool {
        self.timeline_start < other.timeline_end && other.timeline_start < self.timeline_end
    }
}

/// Resolve each placement's window on the compiled timeline.
///
/// The window spans from the start of the earliest referenced clip to the
/// end of the latest one, measured by compiled position; the id list's
/// order does not matter. A reference to a sentence that is not on the
/// timeline (removed, or never transcribed) aborts the compile: a silently
/// dropped overlay is a correctness regression nobody would notice.
///
/// Windows from different placements may overlap; ordering and lane
/// assignment is the graph builder's job.
pub fn resolve_overlays(
    placements: &[ImagePlacement],
    index: &ClipIndex,
) -> Result<Vec<OverlayWindow>> {
    let mut windows = Vec::with_capacity(placements.len());

    for placement in placements {
        placement.validate()?;

        let mut first: Option<&crate::timeline::CompiledClip> = None;
        let mut last: Option<&crate::timeline::CompiledClip> = None;

        for &id in &placement.sentence_ids {
            let clip = index
                .get(id)
                .ok_or_else(|| AutocutError::UnknownSentenceReference {
                    image: placement.image_ref.clone(),
                    id,
                })?;

            if first.map_or(true, |f| clip.timeline_start < f.timeline_start) {
                first = Some(clip);
            }
            if last.map_or(true, |l| clip.timeline_start > l.timeline_start) {
                last = Some(clip);
            }
        }

        // sentence_ids is non-empty, so both bounds are set.
        let first = first.expect("non-empty placement");
        let last = last.expect("non-empty placement");

        windows.push(OverlayWindow {
            image_ref: placement.image_ref.clone(),
            timeline_start: first.timeline_start,
            timeline_end: last.timeline_end(),
            safe_zone: placement.safe_zone,
        });
    }

    Ok(windows)
}
