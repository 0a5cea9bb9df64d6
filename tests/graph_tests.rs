//! Integration tests for graph assembly and the MLT document writer.

use autocut::media::VideoProperties;
use autocut::render::MltDocument;
use autocut::timeline::graph::{GraphBuilder, GraphMode, SourceKind, TrackItem};
use autocut::timeline::overlay::{OverlayWindow, SafeZone};
use autocut::timeline::{compile_timeline, AdjustedSegment, ClipIndex};
use autocut::transcript::SentenceId;

use std::collections::HashMap;

fn index_for(bounds: &[(u32, f64, f64)]) -> ClipIndex {
    let segments: HashMap<SentenceId, AdjustedSegment> = bounds
        .iter()
        .map(|&(id, s, e)| {
            (
                SentenceId(id),
                AdjustedSegment::untrimmed(SentenceId(id), s, e),
            )
        })
        .collect();
    let kept: Vec<SentenceId> = bounds.iter().map(|&(id, _, _)| SentenceId(id)).collect();
    compile_timeline(&kept, &segments).unwrap()
}

fn window(image: &str, start: f64, end: f64) -> OverlayWindow {
    OverlayWindow {
        image_ref: image.to_string(),
        timeline_start: start,
        timeline_end: end,
        safe_zone: SafeZone::default(),
    }
}

fn props() -> VideoProperties {
    VideoProperties {
        width: 1920,
        height: 1080,
        frame_rate_num: 30,
        frame_rate_den: 1,
    }
}

// ============================================================================
// Mode recoverability
// ============================================================================

mod mode_tests {
    use super::*;

    #[test]
    fn test_mode_recoverable_from_structure_alone() {
        let index = index_for(&[(1, 0.0, 5.0), (3, 9.0, 12.0)]);
        let windows = vec![window("a.png", 0.0, 5.0)];

        let cut = GraphBuilder::cut_only("in.mp4").build(&index, &[]).unwrap();
        let single = GraphBuilder::single_pass("in.mp4")
            .build(&index, &windows)
            .unwrap();
        let two_step = GraphBuilder::overlay_on_cut("cut.mp4")
            .build(&index, &windows)
            .unwrap();

        // The mode field agrees with what the structure says.
        assert_eq!(cut.infer_mode(), GraphMode::CutOnly);
        assert_eq!(single.infer_mode(), GraphMode::SinglePassCutAndOverlay);
        assert_eq!(two_step.infer_mode(), GraphMode::OverlayOnCutVideo);
        assert_eq!(cut.mode, cut.infer_mode());
        assert_eq!(single.mode, single.infer_mode());
        assert_eq!(two_step.mode, two_step.infer_mode());
    }

    #[test]
    fn test_single_pass_remaps_two_step_does_not() {
        let index = index_for(&[(1, 10.0, 15.0)]);
        let windows = vec![window("a.png", 0.0, 5.0)];

        // Single pass: clip entries reference original source time.
        let single = GraphBuilder::single_pass("in.mp4")
            .build(&index, &windows)
            .unwrap();
        match &single.video_track.items[0] {
            TrackItem::Entry { source_in, source_out, .. } => {
                assert_eq!(*source_in, 10.0);
                assert_eq!(*source_out, 15.0);
            }
            other => panic!("expected entry, got {other:?}"),
        }

        // Two step: one entry spanning the pre-cut duration from zero.
        let two_step = GraphBuilder::overlay_on_cut("cut.mp4")
            .build(&index, &windows)
            .unwrap();
        assert_eq!(two_step.video_track.items.len(), 1);
        match &two_step.video_track.items[0] {
            TrackItem::Entry { source_in, source_out, .. } => {
                assert_eq!(*source_in, 0.0);
                assert_eq!(*source_out, 5.0);
            }
            other => panic!("expected entry, got {other:?}"),
        }
    }
}

// ============================================================================
// Overlay lanes
// ============================================================================

mod lane_tests {
    use super::*;

    #[test]
    fn test_lane_items_alternate_and_do_not_overlap() {
        let index = index_for(&[(1, 0.0, 20.0)]);
        let windows = vec![
            window("a.png", 1.0, 4.0),
            window("b.png", 6.0, 9.0),
            window("c.png", 12.0, 15.0),
        ];
        let graph = GraphBuilder::single_pass("in.mp4")
            .build(&index, &windows)
            .unwrap();

        assert_eq!(graph.overlay_tracks.len(), 1);
        let items = &graph.overlay_tracks[0].items;

        // blank, entry, blank, entry, blank, entry
        assert_eq!(items.len(), 6);
        let mut cursor = 0.0;
        for item in items {
            match item {
                TrackItem::Blank { duration } => {
                    assert!(*duration > 0.0);
                    cursor += duration;
                }
                TrackItem::Entry { source_in, source_out, .. } => {
                    cursor += source_out - source_in;
                }
            }
        }
        assert_eq!(cursor, 15.0);
    }

    #[test]
    fn test_max_concurrency_dictates_lane_count() {
        let index = index_for(&[(1, 0.0, 10.0)]);
        // Three windows all covering t=2.5: three lanes.
        let windows = vec![
            window("a.png", 0.0, 5.0),
            window("b.png", 1.0, 6.0),
            window("c.png", 2.0, 3.0),
            window("d.png", 6.5, 8.0),
        ];
        let graph = GraphBuilder::single_pass("in.mp4")
            .build(&index, &windows)
            .unwrap();

        assert_eq!(graph.overlay_tracks.len(), 3);
        // All four windows survive.
        assert_eq!(graph.overlays.len(), 4);
        // One mix and one composite per lane.
        assert_eq!(graph.transitions.len(), 6);
    }
}

// ============================================================================
// MLT document
// ============================================================================

mod mlt_tests {
    use super::*;

    #[test]
    fn test_cut_only_document_plays_clips_back_to_back() {
        let index = index_for(&[(1, 2.0, 5.0), (2, 8.0, 10.0)]);
        let graph = GraphBuilder::cut_only("talk.mp4").build(&index, &[]).unwrap();
        let xml = MltDocument::new(&graph, &props()).to_xml();

        assert!(xml.contains("<chain id=\"source_video\">"));
        assert!(xml.contains(">talk.mp4<"));
        // Source-relative in/out, inclusive out frames.
        assert!(xml.contains("in=\"00:00:02.000\" out=\"00:00:04.966\""));
        assert!(xml.contains("in=\"00:00:08.000\" out=\"00:00:09.966\""));
        assert!(!xml.contains("qimage"));
    }

    #[test]
    fn test_overlay_document_has_background_and_transitions() {
        let index = index_for(&[(1, 0.0, 10.0)]);
        let windows = vec![window("images/a.png", 2.0, 6.0)];
        let graph = GraphBuilder::single_pass("talk.mp4")
            .build(&index, &windows)
            .unwrap();
        let xml = MltDocument::new(&graph, &props()).to_xml();

        assert!(xml.contains("id=\"black\""));
        assert!(xml.contains(">qimage<"));
        assert!(xml.contains("<blank length=\"00:00:02.000\"/>"));
        assert!(xml.contains(">mix<"));
        assert!(xml.contains(">composite<"));
        // Default safe zone on 1920x1080.
        assert!(xml.contains("576:216:768x216:100"));
    }

    #[test]
    fn test_two_step_document_references_precut_source() {
        let index = index_for(&[(1, 0.0, 5.0), (3, 9.0, 12.0)]);
        let windows = vec![window("images/a.png", 0.0, 5.0)];
        let graph = GraphBuilder::overlay_on_cut("s7_cut.mp4")
            .build(&index, &windows)
            .unwrap();
        let xml = MltDocument::new(&graph, &props()).to_xml();

        assert!(xml.contains("<chain id=\"precut_video\">"));
        assert!(xml.contains(">s7_cut.mp4<"));
        // The single video entry spans the whole 8s cut.
        assert!(xml.contains("in=\"00:00:00.000\" out=\"00:00:07.966\""));
    }

    #[test]
    fn test_fractional_frame_rates_snap_to_frames() {
        let ntsc = VideoProperties {
            width: 1280,
            height: 720,
            frame_rate_num: 30000,
            frame_rate_den: 1001,
        };
        let index = index_for(&[(1, 0.0, 1.0)]);
        let graph = GraphBuilder::cut_only("a.mp4").build(&index, &[]).unwrap();
        let xml = MltDocument::new(&graph, &ntsc).to_xml();

        assert!(xml.contains("frame_rate_num=\"30000\""));
        assert!(xml.contains("frame_rate_den=\"1001\""));
        // 1.0s is ~29.97 frames; the out point lands on frame 29.
        assert!(xml.contains("out=\"00:00:00.967\""));
    }
}

// ============================================================================
// Sources
// ============================================================================

mod source_tests {
    use super::*;

    #[test]
    fn test_source_kinds_per_mode() {
        let index = index_for(&[(1, 0.0, 5.0)]);
        let windows = vec![window("a.png", 0.0, 2.0)];

        let single = GraphBuilder::single_pass("in.mp4")
            .build(&index, &windows)
            .unwrap();
        assert!(single
            .sources
            .iter()
            .any(|s| s.kind == SourceKind::Original));
        assert!(single.sources.iter().any(|s| s.kind == SourceKind::Image));
        assert!(!single.sources.iter().any(|s| s.kind == SourceKind::PreCut));

        let two_step = GraphBuilder::overlay_on_cut("cut.mp4")
            .build(&index, &windows)
            .unwrap();
        assert!(two_step.sources.iter().any(|s| s.kind == SourceKind::PreCut));
        assert!(!two_step
            .sources
            .iter()
            .any(|s| s.kind == SourceKind::Original));
    }
}
