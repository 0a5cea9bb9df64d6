//! MLT XML document generation from an edit graph.
//!
//! Only this module knows the renderer's dialect. Time is written as
//! `HH:MM:SS.mmm` timecode snapped to the probed frame rate; MLT treats
//! `out` points as inclusive, so entries end one frame early.

use crate::media::VideoProperties;
use crate::timeline::graph::{EditGraph, SourceKind, Track, TrackItem, Transition};
use crate::timeline::overlay::SafeZone;
use std::fmt::Write;

/// Static image producers get a long fixed length; entries clip into it.
const IMAGE_PRODUCER_FRAMES: u64 = 4 * 3600 * 25;

/// Renders an [`EditGraph`] as an MLT XML document.
pub struct MltDocument<'a> {
    graph: &'a EditGraph,
    props: &'a VideoProperties,
}

impl<'a> MltDocument<'a> {
    pub fn new(graph: &'a EditGraph, props: &'a VideoProperties) -> Self {
        Self { graph, props }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        let total = self.timecode(self.graph.duration);
        let has_overlays = !self.graph.overlay_tracks.is_empty();

        xml.push_str("<?xml version=\"1.0\" standalone=\"no\"?>\n");
        writeln!(
            xml,
            "<mlt LC_NUMERIC=\"C\" version=\"7.13.0\" producer=\"main_tractor\">"
        )
        .ok();

        self.write_profile(&mut xml);

        if has_overlays {
            self.write_black_producer(&mut xml, &total);
        }
        for source in &self.graph.sources {
            match source.kind {
                SourceKind::Original | SourceKind::PreCut => {
                    self.write_video_chain(&mut xml, &source.id, &source.path)
                }
                SourceKind::Image => self.write_image_producer(&mut xml, &source.id, &source.path),
            }
        }

        if has_overlays {
            writeln!(xml, "  <playlist id=\"background\">").ok();
            writeln!(
                xml,
                "    <entry producer=\"black\" in=\"00:00:00.000\" out=\"{total}\"/>"
            )
            .ok();
            writeln!(xml, "  </playlist>").ok();
        }

        self.write_playlist(&mut xml, "playlist0", &self.graph.video_track);
        for (i, track) in self.graph.overlay_tracks.iter().enumerate() {
            self.write_playlist(&mut xml, &format!("playlist{}", i + 1), track);
        }

        self.write_tractor(&mut xml, &total, has_overlays);

        xml.push_str("</mlt>\n");
        xml
    }

    fn write_profile(&self, xml: &mut String) {
        writeln!(
            xml,
            "  <profile description=\"automatic\" width=\"{}\" height=\"{}\" progressive=\"1\" \
             sample_aspect_num=\"1\" sample_aspect_den=\"1\" frame_rate_num=\"{}\" \
             frame_rate_den=\"{}\" colorspace=\"601\"/>",
            self.props.width, self.props.height, self.props.frame_rate_num, self.props.frame_rate_den
        )
        .ok();
    }

    fn write_black_producer(&self, xml: &mut String, total: &str) {
        writeln!(
            xml,
            "  <producer id=\"black\" in=\"00:00:00.000\" out=\"{total}\">"
        )
        .ok();
        property(xml, "length", total);
        property(xml, "eof", "pause");
        property(xml, "resource", "0");
        property(xml, "aspect_ratio", "1");
        property(xml, "mlt_service", "color");
        property(xml, "mlt_image_format", "rgba");
        property(xml, "set.test_audio", "0");
        writeln!(xml, "  </producer>").ok();
    }

    fn write_video_chain(&self, xml: &mut String, id: &str, path: &std::path::Path) {
        writeln!(xml, "  <chain id=\"{}\">", escape(id)).ok();
        property(xml, "resource", &path.display().to_string());
        property(xml, "mlt_service", "avformat-novalidate");
        property(xml, "seekable", "1");
        property(xml, "audio_index", "1");
        property(xml, "video_index", "0");
        writeln!(xml, "  </chain>").ok();
    }

    fn write_image_producer(&self, xml: &mut String, id: &str, path: &std::path::Path) {
        let out = frames_to_timecode(IMAGE_PRODUCER_FRAMES - 1, 25.0);
        let length = frames_to_timecode(IMAGE_PRODUCER_FRAMES, 25.0);
        writeln!(
            xml,
            "  <producer id=\"{}\" in=\"00:00:00.000\" out=\"{out}\">",
            escape(id)
        )
        .ok();
        property(xml, "length", &length);
        property(xml, "eof", "pause");
        property(xml, "resource", &path.display().to_string());
        property(xml, "ttl", "1");
        property(xml, "aspect_ratio", "1");
        property(xml, "progressive", "1");
        property(xml, "seekable", "1");
        property(xml, "mlt_service", "qimage");
        writeln!(xml, "  </producer>").ok();
    }

    fn write_playlist(&self, xml: &mut String, id: &str, track: &Track) {
        writeln!(xml, "  <playlist id=\"{}\">", escape(id)).ok();
        for item in &track.items {
            match item {
                TrackItem::Blank { duration } => {
                    writeln!(xml, "    <blank length=\"{}\"/>", self.timecode(*duration)).ok();
                }
                TrackItem::Entry {
                    source,
                    source_in,
                    source_out,
                } => {
                    // MLT out points are inclusive.
                    let in_frame = self.to_frames(*source_in);
                    let out_frame = self.to_frames(*source_out).saturating_sub(1);
                    writeln!(
                        xml,
                        "    <entry producer=\"{}\" in=\"{}\" out=\"{}\"/>",
                        escape(source),
                        frames_to_timecode(in_frame, self.props.fps()),
                        frames_to_timecode(out_frame, self.props.fps()),
                    )
                    .ok();
                }
            }
        }
        writeln!(xml, "  </playlist>").ok();
    }

    fn write_tractor(&self, xml: &mut String, total: &str, has_overlays: bool) {
        writeln!(
            xml,
            "  <tractor id=\"main_tractor\" in=\"00:00:00.000\" out=\"{total}\">"
        )
        .ok();

        if has_overlays {
            writeln!(xml, "    <track producer=\"background\"/>").ok();
        }
        writeln!(xml, "    <track producer=\"playlist0\"/>").ok();
        for i in 0..self.graph.overlay_tracks.len() {
            writeln!(xml, "    <track producer=\"playlist{}\"/>", i + 1).ok();
        }

        if has_overlays {
            // With the background inserted as track 0, the graph's track
            // indices (video 0, overlays 1..) shift up by one. Audio mixes
            // run against the background track, MLT convention.
            self.write_mix(xml, "transition0", 0, 1);
            for (i, transition) in self.graph.transitions.iter().enumerate() {
                match transition {
                    Transition::Mix { a_track: _, b_track } => {
                        self.write_mix(xml, &format!("transition{}", i + 1), 0, b_track + 1);
                    }
                    Transition::Composite {
                        a_track,
                        b_track,
                        safe_zone,
                    } => {
                        self.write_composite(
                            xml,
                            &format!("transition{}", i + 1),
                            a_track + 1,
                            b_track + 1,
                            safe_zone,
                        );
                    }
                }
            }
        }

        writeln!(xml, "  </tractor>").ok();
    }

    fn write_mix(&self, xml: &mut String, id: &str, a_track: usize, b_track: usize) {
        writeln!(xml, "    <transition id=\"{}\">", escape(id)).ok();
        transition_property(xml, "a_track", &a_track.to_string());
        transition_property(xml, "b_track", &b_track.to_string());
        transition_property(xml, "mlt_service", "mix");
        transition_property(xml, "always_active", "1");
        transition_property(xml, "sum", "1");
        writeln!(xml, "    </transition>").ok();
    }

    fn write_composite(
        &self,
        xml: &mut String,
        id: &str,
        a_track: usize,
        b_track: usize,
        safe_zone: &SafeZone,
    ) {
        let left = (self.props.width as f64 * safe_zone.left) as u32;
        let top = (self.props.height as f64 * safe_zone.top) as u32;
        let width = (self.props.width as f64 * safe_zone.width()) as u32;
        let height = (self.props.height as f64 * safe_zone.height()) as u32;
        let geometry = format!("{left}:{top}:{width}x{height}:100");

        writeln!(xml, "    <transition id=\"{}\">", escape(id)).ok();
        transition_property(xml, "a_track", &a_track.to_string());
        transition_property(xml, "b_track", &b_track.to_string());
        transition_property(xml, "mlt_service", "composite");
        transition_property(xml, "geometry", &geometry);
        transition_property(xml, "fill", "1");
        transition_property(xml, "distort", "0");
        transition_property(xml, "operator", "over");
        writeln!(xml, "    </transition>").ok();
    }

    fn to_frames(&self, seconds: f64) -> u64 {
        (seconds * self.props.fps()).round().max(0.0) as u64
    }

    fn timecode(&self, seconds: f64) -> String {
        frames_to_timecode(self.to_frames(seconds), self.props.fps())
    }
}

fn property(xml: &mut String, name: &str, value: &str) {
    writeln!(
        xml,
        "    <property name=\"{}\">{}</property>",
        escape(name),
        escape(value)
    )
    .ok();
}

fn transition_property(xml: &mut String, name: &str, value: &str) {
    writeln!(
        xml,
        "      <property name=\"{}\">{}</property>",
        escape(name),
        escape(value)
    )
    .ok();
}

/// Convert a frame count to `HH:MM:SS.mmm` timecode.
pub fn frames_to_timecode(frames: u64, fps: f64) -> String {
    let total_seconds = frames as f64 / fps;
    let hours = (total_seconds / 3600.0) as u64;
    let minutes = ((total_seconds % 3600.0) / 60.0) as u64;
    let seconds = (total_seconds % 60.0) as u64;
    let milliseconds = ((total_seconds % 1.0) * 1000.0) as u64;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
