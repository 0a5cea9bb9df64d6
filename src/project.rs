//! Per-video project folder: every pipeline stage reads and writes
//! stage-numbered artifacts under `assets/<name>/`, so each step can be
//! rerun or hand-edited in isolation.
//!
//! Layout:
//! ```text
//! assets/<name>/<name>.mp4        input video
//! assets/<name>/s1_proxy.mp4      downsampled proxy
//! assets/<name>/s2_audio.wav      extracted mono audio
//! assets/<name>/s3_transcript.json
//! assets/<name>/s4_decision.json  human-editable keep/remove map
//! assets/<name>/s5_adjusted.json  silence-trimmed segments
//! assets/<name>/s6_image_plan.json
//! assets/<name>/images/           generated overlay images
//! assets/<name>/s7_cut.mp4        cut-only render
//! assets/<name>/s8_overlaid.mp4   cut + overlays render
//! ```

use crate::edit::EditDecision;
use crate::error::{AutocutError, Result};
use crate::images::ImagePlan;
use crate::timeline::AdjustedSegment;
use crate::transcript::Transcript;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Input video extensions probed in order.
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "MP4", "mov", "MOV", "mkv", "webm"];

/// Memo file holding the most recently used project name.
const LAST_PROJECT_FILE: &str = ".last_project";

#[derive(Debug, Clone)]
pub struct Project {
    assets_dir: PathBuf,
    name: String,
}

impl Project {
    pub fn new(assets_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            name: name.into(),
        }
    }

    /// Derive the project from a video path: `clips/talk.mp4` becomes
    /// project "talk" under `clips/`.
    pub fn from_video_path(video: &Path) -> Result<Self> {
        let name = video
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                AutocutError::Config(format!("cannot derive project name from {video:?}"))
            })?
            .to_string();
        let assets_dir = video
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self { assets_dir, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> PathBuf {
        self.assets_dir.join(&self.name)
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(self.dir())?;
        Ok(())
    }

    /// Locate the input video, trying common extensions.
    pub fn input_video(&self) -> Result<PathBuf> {
        for ext in VIDEO_EXTENSIONS {
            let candidate = self.dir().join(format!("{}.{}", self.name, ext));
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(AutocutError::FileNotFound(format!(
            "no input video for project '{}' under {}",
            self.name,
            self.dir().display()
        )))
    }

    pub fn proxy_path(&self) -> PathBuf {
        self.dir().join("s1_proxy.mp4")
    }

    pub fn audio_path(&self) -> PathBuf {
        self.dir().join("s2_audio.wav")
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.dir().join("s3_transcript.json")
    }

    pub fn decision_path(&self) -> PathBuf {
        self.dir().join("s4_decision.json")
    }

    pub fn adjusted_path(&self) -> PathBuf {
        self.dir().join("s5_adjusted.json")
    }

    pub fn image_plan_path(&self) -> PathBuf {
        self.dir().join("s6_image_plan.json")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.dir().join("images")
    }

    pub fn cut_path(&self) -> PathBuf {
        self.dir().join("s7_cut.mp4")
    }

    pub fn overlaid_path(&self) -> PathBuf {
        self.dir().join("s8_overlaid.mp4")
    }

    pub fn save_transcript(&self, transcript: &Transcript) -> Result<PathBuf> {
        self.save_json(self.transcript_path(), transcript)
    }

    pub fn load_transcript(&self) -> Result<Transcript> {
        self.load_json(self.transcript_path())
    }

    pub fn save_decision(&self, decision: &EditDecision) -> Result<PathBuf> {
        self.save_json(self.decision_path(), decision)
    }

    pub fn load_decision(&self) -> Result<EditDecision> {
        self.load_json(self.decision_path())
    }

    pub fn save_adjusted(&self, segments: &[AdjustedSegment]) -> Result<PathBuf> {
        self.save_json(self.adjusted_path(), &segments)
    }

    pub fn load_adjusted(&self) -> Result<Vec<AdjustedSegment>> {
        self.load_json(self.adjusted_path())
    }

    pub fn save_image_plan(&self, plan: &ImagePlan) -> Result<PathBuf> {
        self.save_json(self.image_plan_path(), plan)
    }

    pub fn load_image_plan(&self) -> Result<ImagePlan> {
        self.load_json(self.image_plan_path())
    }

    fn save_json<T: Serialize>(&self, path: PathBuf, value: &T) -> Result<PathBuf> {
        self.ensure_dir()?;
        let contents = serde_json::to_string_pretty(value)?;
        fs::write(&path, contents)?;
        Ok(path)
    }

    fn load_json<T: DeserializeOwned>(&self, path: PathBuf) -> Result<T> {
        if !path.exists() {
            return Err(AutocutError::FileNotFound(path.display().to_string()));
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Remember this project as the most recently used one.
    pub fn save_as_last(&self) -> Result<()> {
        fs::create_dir_all(&self.assets_dir)?;
        fs::write(self.assets_dir.join(LAST_PROJECT_FILE), &self.name)?;
        Ok(())
    }

    /// Name of the most recently used project, if any.
    pub fn last_project(assets_dir: &Path) -> Option<String> {
        let name = fs::read_to_string(assets_dir.join(LAST_PROJECT_FILE)).ok()?;
        let name = name.trim().to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::AdjustedSegment;
    use crate::transcript::SentenceId;

    fn temp_project() -> (tempfile::TempDir, Project) {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::new(dir.path(), "talk");
        (dir, project)
    }

    #[test]
    fn test_from_video_path() {
        let project = Project::from_video_path(Path::new("/videos/interview.mp4")).unwrap();
        assert_eq!(project.name(), "interview");
        assert_eq!(project.dir(), PathBuf::from("/videos/interview"));
    }

    #[test]
    fn test_stage_paths() {
        let (_dir, project) = temp_project();
        assert!(project.proxy_path().ends_with("talk/s1_proxy.mp4"));
        assert!(project.transcript_path().ends_with("talk/s3_transcript.json"));
        assert!(project.images_dir().ends_with("talk/images"));
    }

    #[test]
    fn test_adjusted_segments_roundtrip() {
        let (_dir, project) = temp_project();
        let segments = vec![AdjustedSegment {
            sentence_id: SentenceId(1),
            original_start: 0.0,
            original_end: 5.0,
            adjusted_start: 0.25,
            adjusted_end: 4.75,
            text: "hello".to_string(),
        }];

        project.save_adjusted(&segments).unwrap();
        let loaded = project.load_adjusted().unwrap();
        assert_eq!(loaded, segments);
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let (_dir, project) = temp_project();
        assert!(matches!(
            project.load_transcript(),
            Err(AutocutError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_last_project_memo() {
        let (dir, project) = temp_project();
        assert_eq!(Project::last_project(dir.path()), None);

        project.save_as_last().unwrap();
        assert_eq!(Project::last_project(dir.path()), Some("talk".to_string()));
    }

    #[test]
    fn test_missing_input_video() {
        let (_dir, project) = temp_project();
        assert!(matches!(
            project.input_video(),
            Err(AutocutError::FileNotFound(_))
        ));
    }
}
