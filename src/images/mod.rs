//! Overlay image planning records and generation.
//!
//! The plan file binds prompts to sentence ids; generation materializes the
//! missing files. Generation is allowed to partially fail: a placement
//! whose image never materialized is dropped from the render with an
//! explicit warning, never by silently shifting timestamps.

pub mod generate;
pub mod openrouter;

pub use generate::{GenerationOrchestrator, GenerationOutcome, GenerationStats, ImageGenerator};
pub use openrouter::OpenRouterImageClient;

use crate::error::{AutocutError, Result};
use crate::timeline::overlay::{ImagePlacement, SafeZone};
use crate::transcript::SentenceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// One planned overlay image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedImage {
    /// File name inside the project's images folder, e.g. "image1.png".
    pub file_name: String,
    /// Prompt for the image generator.
    pub prompt: String,
    /// Sentences the image should appear over.
    pub sentence_ids: Vec<SentenceId>,
    /// Per-image safe zone override; the configured zone applies otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_zone: Option<SafeZone>,
}

/// The image plan as authored by the planning collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagePlan {
    pub images: Vec<PlannedImage>,
}

impl ImagePlan {
    /// Boundary validation: reject malformed records before anything runs.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for image in &self.images {
            if image.file_name.trim().is_empty() {
                return Err(AutocutError::Config(
                    "image plan entry has an empty file name".to_string(),
                ));
            }
            if !seen.insert(image.file_name.as_str()) {
                return Err(AutocutError::Config(format!(
                    "image plan lists '{}' more than once",
                    image.file_name
                )));
            }
            if image.sentence_ids.is_empty() {
                return Err(AutocutError::Config(format!(
                    "image plan entry '{}' references no sentences",
                    image.file_name
                )));
            }
            if let Some(zone) = &image.safe_zone {
                zone.validate()?;
            }
        }
        Ok(())
    }

    /// Resolve the plan into compiler-facing placements. `images_dir` is
    /// the folder the generated files live in.
    pub fn to_placements(&self, images_dir: &Path, default_zone: SafeZone) -> Vec<ImagePlacement> {
        self.images
            .iter()
            .map(|image| ImagePlacement {
                image_ref: images_dir.join(&image.file_name).display().to_string(),
                sentence_ids: image.sentence_ids.clone(),
                safe_zone: image.safe_zone.unwrap_or(default_zone),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn planned(file_name: &str, ids: &[u32]) -> PlannedImage {
        PlannedImage {
            file_name: file_name.to_string(),
            prompt: "a test image".to_string(),
            sentence_ids: ids.iter().map(|&id| SentenceId(id)).collect(),
            safe_zone: None,
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_plan() {
        let plan = ImagePlan {
            images: vec![planned("a.png", &[1, 2]), planned("b.png", &[5])],
        };
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty_ids() {
        let plan = ImagePlan {
            images: vec![planned("a.png", &[1]), planned("a.png", &[2])],
        };
        assert!(plan.validate().is_err());

        let plan = ImagePlan {
            images: vec![planned("b.png", &[])],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_to_placements_applies_default_zone() {
        let plan = ImagePlan {
            images: vec![planned("a.png", &[1])],
        };
        let placements = plan.to_placements(&PathBuf::from("/proj/images"), SafeZone::default());

        assert_eq!(placements.len(), 1);
        assert!(placements[0].image_ref.ends_with("a.png"));
        assert_eq!(placements[0].safe_zone, SafeZone::default());
    }

    #[test]
    fn test_plan_roundtrips_string_sentence_ids() {
        let raw = r#"{"images":[{"file_name":"a.png","prompt":"p","sentence_ids":["3","4"]}]}"#;
        let plan: ImagePlan = serde_json::from_str(raw).unwrap();
        assert_eq!(
            plan.images[0].sentence_ids,
            vec![SentenceId(3), SentenceId(4)]
        );
    }
}
