//! Renderer-agnostic edit graph assembly.
//!
//! The graph carries everything a renderer needs (named sources, ordered
//! tracks of blanks and entries, and the transitions combining them) but
//! names no renderer concept. Construction and execution are strictly
//! separated: building a graph does no I/O and spawns nothing, so every
//! mode is testable without a renderer installed.

use crate::error::{AutocutError, Result};
use crate::timeline::overlay::{OverlayWindow, SafeZone};
use crate::timeline::{ClipIndex, CompiledClip};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// How the edit is expressed for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphMode {
    /// Cut track only, no overlays.
    CutOnly,
    /// Cut track plus overlay tracks, all against the original media.
    SinglePassCutAndOverlay,
    /// Overlay tracks against an already-cut source; window timestamps are
    /// used as-is since they are already cut-timeline coordinates.
    OverlayOnCutVideo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// The original recording.
    Original,
    /// A pre-cut intermediate produced by an earlier render.
    PreCut,
    /// A still image shown during an overlay window.
    Image,
}

/// A named media reference the tracks can play from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    pub path: PathBuf,
    pub kind: SourceKind,
}

/// One element of a track: either silence/transparency for a duration, or a
/// span of a source played at this position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackItem {
    Blank { duration: f64 },
    Entry {
        source: String,
        source_in: f64,
        source_out: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub items: Vec<TrackItem>,
}

/// How two tracks combine in the composition stage. Track indices count the
/// video track as 0 and overlay tracks from 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    /// Audio blend between two tracks.
    Mix { a_track: usize, b_track: usize },
    /// Video composite placing the b-track inside the safe zone.
    Composite {
        a_track: usize,
        b_track: usize,
        safe_zone: SafeZone,
    },
}

/// The sole artifact handed to the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditGraph {
    pub mode: GraphMode,
    pub sources: Vec<SourceRef>,
    pub clips: Vec<CompiledClip>,
    pub overlays: Vec<OverlayWindow>,
    pub video_track: Track,
    pub overlay_tracks: Vec<Track>,
    pub transitions: Vec<Transition>,
    pub duration: f64,
}

impl EditGraph {
    /// Recover the mode from structure alone: which source kinds exist and
    /// whether overlay tracks are present. No side-channel flag needed.
    pub fn infer_mode(&self) -> GraphMode {
        let has_precut = self.sources.iter().any(|s| s.kind == SourceKind::PreCut);
        if self.overlay_tracks.is_empty() {
            GraphMode::CutOnly
        } else if has_precut {
            GraphMode::OverlayOnCutVideo
        } else {
            GraphMode::SinglePassCutAndOverlay
        }
    }
}

/// Assembles compiled clips and resolved overlay windows into an
/// [`EditGraph`] for one of the three modes. The mode is fixed at
/// construction; `build` is the single dispatch point.
pub struct GraphBuilder {
    mode: GraphMode,
    source: PathBuf,
}

impl GraphBuilder {
    /// Cut the original media; no overlays.
    pub fn cut_only(original: impl AsRef<Path>) -> Self {
        Self {
            mode: GraphMode::CutOnly,
            source: original.as_ref().to_path_buf(),
        }
    }

    /// Cut the original media and composite overlays in one pass.
    pub fn single_pass(original: impl AsRef<Path>) -> Self {
        Self {
            mode: GraphMode::SinglePassCutAndOverlay,
            source: original.as_ref().to_path_buf(),
        }
    }

    /// Composite overlays onto an already-cut video.
    pub fn overlay_on_cut(precut: impl AsRef<Path>) -> Self {
        Self {
            mode: GraphMode::OverlayOnCutVideo,
            source: precut.as_ref().to_path_buf(),
        }
    }

    pub fn mode(&self) -> GraphMode {
        self.mode
    }

    /// Assemble the graph. `windows` must already be resolved against the
    /// same `index`; CutOnly ignores them.
    pub fn build(&self, index: &ClipIndex, windows: &[OverlayWindow]) -> Result<EditGraph> {
        if index.is_empty() {
            return Err(AutocutError::Media(
                "cannot build an edit graph with no clips".to_string(),
            ));
        }

        let duration = index.total_duration();
        let clips = index.clips().to_vec();

        let (video_source, video_track) = match self.mode {
            GraphMode::OverlayOnCutVideo => {
                let source = SourceRef {
                    id: "precut_video".to_string(),
                    path: self.source.clone(),
                    kind: SourceKind::PreCut,
                };
                let track = Track {
                    id: "video".to_string(),
                    items: vec![TrackItem::Entry {
                        source: source.id.clone(),
                        source_in: 0.0,
                        source_out: duration,
                    }],
                };
                (source, track)
            }
            GraphMode::CutOnly | GraphMode::SinglePassCutAndOverlay => {
                let source = SourceRef {
                    id: "source_video".to_string(),
                    path: self.source.clone(),
                    kind: SourceKind::Original,
                };
                let items = clips
                    .iter()
                    .map(|clip| TrackItem::Entry {
                        source: source.id.clone(),
                        source_in: clip.source_in,
                        source_out: clip.source_out,
                    })
                    .collect();
                (
                    source,
                    Track {
                        id: "video".to_string(),
                        items,
                    },
                )
            }
        };

        let mut sources = vec![video_source];
        let mut overlay_tracks = Vec::new();
        let mut transitions = Vec::new();
        let mut overlays = Vec::new();

        if self.mode != GraphMode::CutOnly && !windows.is_empty() {
            let lanes = assign_lanes(windows);
            if lanes.len() > 1 {
                warn!(
                    "Overlapping overlays split across {} parallel tracks",
                    lanes.len()
                );
            }

            let mut image_ids: HashMap<String, String> = HashMap::new();
            for (lane_no, lane) in lanes.iter().enumerate() {
                let track = lane_to_track(lane, lane_no, &mut image_ids, &mut sources);
                overlay_tracks.push(track);

                // Overlay lanes sit above the video track (index 0).
                let b_track = lane_no + 1;
                transitions.push(Transition::Mix { a_track: 0, b_track });
                transitions.push(Transition::Composite {
                    a_track: 0,
                    b_track,
                    safe_zone: lane[0].safe_zone,
                });
            }

            overlays = lanes.into_iter().flatten().collect();
        }

        Ok(EditGraph {
            mode: self.mode,
            sources,
            clips,
            overlays,
            video_track,
            overlay_tracks,
            transitions,
            duration,
        })
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Greedy lane assignment: windows sorted by start (then end) each go to
/// the first lane whose previous window has ended, opening a new lane only
/// when every existing lane is still busy. The lane count therefore equals
/// the maximum concurrent overlay count; nothing is dropped or truncated.
fn assign_lanes(windows: &[OverlayWindow]) -> Vec<Vec<OverlayWindow>> {
    let mut sorted = windows.to_vec();
    sorted.sort_by(|a, b| {
        cmp_f64(a.timeline_start, b.timeline_start).then(cmp_f64(a.timeline_end, b.timeline_end))
    });

    let mut lanes: Vec<Vec<OverlayWindow>> = Vec::new();
    'windows: for window in sorted {
        for lane in &mut lanes {
            let free = lane
                .last()
                .map(|w| w.timeline_end <= window.timeline_start)
                .unwrap_or(true);
            if free {
                lane.push(window);
                continue 'windows;
            }
        }
        lanes.push(vec![window]);
    }
    lanes
}

/// Turn one lane into an alternating blank/entry track. Image sources are
/// deduplicated across lanes and registered on first use.
fn lane_to_track(
    lane: &[OverlayWindow],
    lane_no: usize,
    image_ids: &mut HashMap<String, String>,
    sources: &mut Vec<SourceRef>,
) -> Track {
    let mut items = Vec::new();
    let mut cursor = 0.0_f64;

    for window in lane {
        if window.timeline_start > cursor {
            items.push(TrackItem::Blank {
                duration: window.timeline_start - cursor,
            });
        }

        let source_id = image_ids
            .entry(window.image_ref.clone())
            .or_insert_with(|| {
                let id = format!("image_{}", sources.len() - 1);
                sources.push(SourceRef {
                    id: id.clone(),
                    path: PathBuf::from(&window.image_ref),
                    kind: SourceKind::Image,
                });
                id
            })
            .clone();

        items.push(TrackItem::Entry {
            source: source_id,
            source_in: 0.0,
            source_out: window.duration(),
        });
        cursor = window.timeline_end;
    }

    Track {
        id: format!("overlay{lane_no}"),
        items,
    }
}
