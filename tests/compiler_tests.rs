//! Integration tests for the timeline compiler: selection, clip
//! compilation, overlay resolution and the properties the rest of the
//! system depends on.

use autocut::edit::{select_kept, EditDecision};
use autocut::error::AutocutError;
use autocut::pipeline::compile_edit_graph;
use autocut::timeline::graph::GraphBuilder;
use autocut::timeline::overlay::{resolve_overlays, ImagePlacement, SafeZone};
use autocut::timeline::{compile_timeline, AdjustedSegment};
use autocut::transcript::{Sentence, SentenceId};

use std::collections::HashMap;

fn sentence(id: u32, start: f64, end: f64) -> Sentence {
    Sentence {
        id: SentenceId(id),
        text: format!("sentence {id}"),
        start,
        end,
        words: vec![],
    }
}

fn segment(id: u32, start: f64, end: f64) -> AdjustedSegment {
    AdjustedSegment::untrimmed(SentenceId(id), start, end)
}

fn segment_map(segments: &[AdjustedSegment]) -> HashMap<SentenceId, AdjustedSegment> {
    segments.iter().map(|s| (s.sentence_id, s.clone())).collect()
}

fn placement(image: &str, ids: &[u32]) -> ImagePlacement {
    ImagePlacement {
        image_ref: image.to_string(),
        sentence_ids: ids.iter().map(|&id| SentenceId(id)).collect(),
        safe_zone: SafeZone::default(),
    }
}

// ============================================================================
// Selection
// ============================================================================

mod selection_tests {
    use super::*;

    #[test]
    fn test_selection_preserves_original_order() {
        let sentences = vec![
            sentence(1, 0.0, 5.0),
            sentence(2, 5.0, 9.0),
            sentence(3, 9.0, 12.0),
        ];
        let decision = EditDecision::from_removals(&sentences, &[SentenceId(2)]);

        let kept = select_kept(&sentences, &decision).unwrap();
        assert_eq!(kept, vec![SentenceId(1), SentenceId(3)]);
    }

    #[test]
    fn test_missing_decision_is_an_error_not_a_default() {
        let sentences = vec![sentence(1, 0.0, 5.0), sentence(2, 5.0, 9.0)];
        let mut decision = EditDecision::from_removals(&sentences, &[]);
        decision.sentences.remove(&SentenceId(1));

        assert!(matches!(
            select_kept(&sentences, &decision),
            Err(AutocutError::MissingDecision(SentenceId(1)))
        ));
    }
}

// ============================================================================
// Timeline compilation
// ============================================================================

mod compile_tests {
    use super::*;

    #[test]
    fn test_example_keeping_first_and_third() {
        // Sentences [0-5][5-9][9-12], decision keeps 1 and 3:
        // clip(1) plays source 0-5 at timeline 0-5,
        // clip(3) plays source 9-12 at timeline 5-8.
        let segments = vec![
            segment(1, 0.0, 5.0),
            segment(2, 5.0, 9.0),
            segment(3, 9.0, 12.0),
        ];
        let index =
            compile_timeline(&[SentenceId(1), SentenceId(3)], &segment_map(&segments)).unwrap();

        let clips = index.clips();
        assert_eq!(clips.len(), 2);
        assert_eq!(
            (clips[0].source_in, clips[0].source_out),
            (0.0, 5.0)
        );
        assert_eq!(
            (clips[0].timeline_start, clips[0].timeline_duration),
            (0.0, 5.0)
        );
        assert_eq!(
            (clips[1].source_in, clips[1].source_out),
            (9.0, 12.0)
        );
        assert_eq!(
            (clips[1].timeline_start, clips[1].timeline_duration),
            (5.0, 3.0)
        );
    }

    #[test]
    fn test_total_duration_is_conserved() {
        let segments = vec![
            segment(1, 0.5, 4.25),
            segment(2, 6.0, 6.75),
            segment(3, 10.0, 17.5),
            segment(4, 20.0, 21.125),
        ];
        let kept: Vec<SentenceId> = segments.iter().map(|s| s.sentence_id).collect();
        let index = compile_timeline(&kept, &segment_map(&segments)).unwrap();

        let clip_total: f64 = index.clips().iter().map(|c| c.timeline_duration).sum();
        let segment_total: f64 = segments.iter().map(|s| s.duration()).sum();
        assert_eq!(clip_total, segment_total);
    }

    #[test]
    fn test_clips_are_contiguous_and_start_at_zero() {
        let segments = vec![
            segment(1, 3.0, 4.5),
            segment(2, 8.0, 8.25),
            segment(3, 9.0, 15.0),
        ];
        let kept: Vec<SentenceId> = segments.iter().map(|s| s.sentence_id).collect();
        let index = compile_timeline(&kept, &segment_map(&segments)).unwrap();

        let clips = index.clips();
        assert_eq!(clips[0].timeline_start, 0.0);
        for pair in clips.windows(2) {
            assert_eq!(
                pair[1].timeline_start,
                pair[0].timeline_start + pair[0].timeline_duration
            );
        }
    }

    #[test]
    fn test_degenerate_segment_is_rejected_not_dropped() {
        let segments = vec![segment(1, 0.0, 5.0), segment(2, 6.0, 6.0)];
        let kept = vec![SentenceId(1), SentenceId(2)];

        assert!(matches!(
            compile_timeline(&kept, &segment_map(&segments)),
            Err(AutocutError::DegenerateSegment(SentenceId(2)))
        ));
    }

    #[test]
    fn test_adjacent_source_clips_are_not_merged() {
        // Contiguous in the source, still two clips with provenance.
        let segments = vec![segment(1, 0.0, 5.0), segment(2, 5.0, 9.0)];
        let kept = vec![SentenceId(1), SentenceId(2)];
        let index = compile_timeline(&kept, &segment_map(&segments)).unwrap();

        assert_eq!(index.clips().len(), 2);
        assert_eq!(index.clips()[0].source_sentence_id, SentenceId(1));
        assert_eq!(index.clips()[1].source_sentence_id, SentenceId(2));
    }
}

// ============================================================================
// Overlay resolution
// ============================================================================

mod overlay_tests {
    use super::*;

    fn compiled_example() -> autocut::timeline::ClipIndex {
        let segments = vec![
            segment(1, 0.0, 5.0),
            segment(2, 5.0, 9.0),
            segment(3, 9.0, 12.0),
        ];
        compile_timeline(&[SentenceId(1), SentenceId(3)], &segment_map(&segments)).unwrap()
    }

    #[test]
    fn test_example_window_over_first_sentence() {
        // Placement on sentence 1 against the [1,3] timeline: [0, 5).
        let windows = resolve_overlays(&[placement("img.png", &[1])], &compiled_example()).unwrap();
        assert_eq!(windows[0].timeline_start, 0.0);
        assert_eq!(windows[0].timeline_end, 5.0);
    }

    #[test]
    fn test_example_removed_sentence_reference_fails() {
        // Sentence 2 was removed; referencing it must abort, never shift.
        let err =
            resolve_overlays(&[placement("img.png", &[2])], &compiled_example()).unwrap_err();
        assert!(matches!(
            err,
            AutocutError::UnknownSentenceReference {
                id: SentenceId(2),
                ..
            }
        ));
    }

    #[test]
    fn test_windows_fall_within_compiled_extent() {
        let index = compiled_example();
        let windows = resolve_overlays(
            &[placement("a.png", &[1]), placement("b.png", &[1, 3])],
            &index,
        )
        .unwrap();

        let total = index.total_duration();
        for window in &windows {
            assert!(window.timeline_start >= 0.0);
            assert!(window.timeline_end <= total);
            assert!(window.timeline_start < window.timeline_end);
        }
    }
}

// ============================================================================
// Whole-compile properties
// ============================================================================

mod graph_property_tests {
    use super::*;

    fn decision_for(segments: &[AdjustedSegment], removed: &[u32]) -> EditDecision {
        let sentences: Vec<Sentence> = segments
            .iter()
            .map(|s| sentence(s.sentence_id.0, s.original_start, s.original_end))
            .collect();
        let removed: Vec<SentenceId> = removed.iter().map(|&id| SentenceId(id)).collect();
        EditDecision::from_removals(&sentences, &removed)
    }

    #[test]
    fn test_compile_twice_yields_identical_graph() {
        let segments = vec![
            segment(1, 0.0, 5.0),
            segment(2, 5.0, 9.0),
            segment(3, 9.0, 12.0),
        ];
        let decision = decision_for(&segments, &[2]);
        let placements = vec![placement("a.png", &[1]), placement("b.png", &[3])];
        let builder = GraphBuilder::single_pass("talk.mp4");

        let first = compile_edit_graph(&segments, &decision, &placements, &builder).unwrap();
        let second = compile_edit_graph(&segments, &decision, &placements, &builder).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_fatal_error_yields_no_partial_graph() {
        let segments = vec![segment(1, 0.0, 5.0), segment(2, 5.0, 9.0)];
        let decision = decision_for(&segments, &[2]);
        // References the removed sentence: the whole compile fails.
        let placements = vec![placement("a.png", &[1, 2])];
        let builder = GraphBuilder::single_pass("talk.mp4");

        let result = compile_edit_graph(&segments, &decision, &placements, &builder);
        assert!(matches!(
            result,
            Err(AutocutError::UnknownSentenceReference { .. })
        ));
    }

    #[test]
    fn test_overlapping_placements_both_survive() {
        // Windows [0,5) and [3,8) must both reach the graph, on parallel
        // lanes covering the shared [3,5).
        let segments = vec![segment(1, 0.0, 5.0), segment(2, 5.0, 8.0)];
        let decision = decision_for(&segments, &[]);
        let placements = vec![placement("a.png", &[1]), placement("b.png", &[1, 2])];
        let builder = GraphBuilder::single_pass("talk.mp4");

        let graph = compile_edit_graph(&segments, &decision, &placements, &builder).unwrap();
        assert_eq!(graph.overlays.len(), 2);
        assert_eq!(graph.overlay_tracks.len(), 2);
    }

    #[test]
    fn test_inverted_adjusted_bounds_are_fatal() {
        let mut bad = segment(1, 0.0, 5.0);
        bad.adjusted_start = 4.0;
        bad.adjusted_end = 2.0;
        let segments = vec![bad];
        let decision = decision_for(&segments, &[]);
        let builder = GraphBuilder::cut_only("talk.mp4");

        assert!(matches!(
            compile_edit_graph(&segments, &decision, &[], &builder),
            Err(AutocutError::InvalidBounds { .. })
        ));
    }
}

// ============================================================================
// Stage-file round-trips
// ============================================================================

mod roundtrip_tests {
    use super::*;

    #[test]
    fn test_decision_roundtrip_preserves_ids_exactly() {
        let sentences = vec![sentence(1, 0.0, 1.0), sentence(12, 1.0, 2.0)];
        let decision = EditDecision::from_removals(&sentences, &[SentenceId(12)]);

        let json = serde_json::to_string(&decision).unwrap();
        let reparsed: EditDecision = serde_json::from_str(&json).unwrap();
        assert_eq!(decision, reparsed);
    }

    #[test]
    fn test_placement_accepts_string_ids_from_planning_tools() {
        let raw = r#"{
            "image_ref": "images/cat.png",
            "sentence_ids": ["4", "5"],
            "safe_zone": {"top": 0.2, "bottom": 0.4, "left": 0.3, "right": 0.7}
        }"#;
        let parsed: ImagePlacement = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.sentence_ids, vec![SentenceId(4), SentenceId(5)]);

        // And serializes back as integers, losslessly.
        let json = serde_json::to_string(&parsed).unwrap();
        assert!(json.contains("[4,5]"));
    }

    #[test]
    fn test_adjusted_segment_roundtrip() {
        let original = vec![
            AdjustedSegment {
                sentence_id: SentenceId(1),
                original_start: 0.0,
                original_end: 5.5,
                adjusted_start: 0.25,
                adjusted_end: 5.125,
                text: "first".to_string(),
            },
        ];
        let json = serde_json::to_string(&original).unwrap();
        let reparsed: Vec<AdjustedSegment> = serde_json::from_str(&json).unwrap();
        assert_eq!(original, reparsed);
    }
}
