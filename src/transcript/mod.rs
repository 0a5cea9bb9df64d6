//! Transcript data model: word-level timestamps grouped into sentences.
//!
//! Sentences are the unit of editing. Their ids are assigned once, at
//! transcription time, and stay stable across every later pipeline stage;
//! decisions, adjusted segments and image placements all join on them.

use crate::error::{AutocutError, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of one transcribed sentence.
///
/// Serialized as a JSON integer. The deserializer also accepts the same
/// value as a decimal string, since planning collaborators have historically
/// emitted string indexes; either form round-trips without coercion loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SentenceId(pub u32);

impl fmt::Display for SentenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SentenceId {
    fn from(raw: u32) -> Self {
        SentenceId(raw)
    }
}

impl<'de> Deserialize<'de> for SentenceId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = SentenceId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a sentence id as integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<SentenceId, E> {
                u32::try_from(v)
                    .map(SentenceId)
                    .map_err(|_| E::custom(format!("sentence id {v} out of range")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<SentenceId, E> {
                u32::try_from(v)
                    .map(SentenceId)
                    .map_err(|_| E::custom(format!("sentence id {v} out of range")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<SentenceId, E> {
                v.trim()
                    .parse::<u32>()
                    .map(SentenceId)
                    .map_err(|_| E::custom(format!("invalid sentence id '{v}'")))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// A single word with its timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSpan {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// A raw transcription segment as returned by the speech-to-text provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Vec<WordSpan>,
}

/// One transcribed sentence with stable id and time bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sentence {
    pub id: SentenceId,
    pub text: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub words: Vec<WordSpan>,
}

impl Sentence {
    /// Check the raw bounds; inverted bounds poison the whole edit.
    pub fn validate_bounds(&self) -> Result<()> {
        if self.start > self.end {
            return Err(AutocutError::InvalidBounds {
                id: self.id,
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }
}

/// Complete transcript of a video's audio track.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub sentences: Vec<Sentence>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl Transcript {
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn word_count(&self) -> usize {
        self.segments.iter().map(|s| s.words.len()).sum()
    }
}

fn ends_sentence(word: &str) -> bool {
    matches!(word.trim_end().chars().last(), Some('.' | '?' | '!'))
}

/// Group the word stream into sentences, splitting after terminal
/// punctuation. Ids are assigned 1-based in stream order. Trailing words
/// without punctuation still form a final sentence.
pub fn assemble_sentences(segments: &[TranscriptSegment]) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut words: Vec<WordSpan> = Vec::new();

    let flush = |words: &mut Vec<WordSpan>, sentences: &mut Vec<Sentence>| {
        if words.is_empty() {
            return;
        }
        let text = words
            .iter()
            .map(|w| w.word.trim())
            .collect::<Vec<_>>()
            .join(" ");
        let start = words.first().map(|w| w.start).unwrap_or(0.0);
        let end = words.last().map(|w| w.end).unwrap_or(start);
        sentences.push(Sentence {
            id: SentenceId(sentences.len() as u32 + 1),
            text,
            start,
            end,
            words: std::mem::take(words),
        });
    };

    for segment in segments {
        for word in &segment.words {
            words.push(word.clone());
            if ends_sentence(&word.word) {
                flush(&mut words, &mut sentences);
            }
        }
    }
    flush(&mut words, &mut sentences);

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, start: f64, end: f64) -> WordSpan {
        WordSpan {
            word: text.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_assemble_splits_on_punctuation() {
        let segments = vec![TranscriptSegment {
            text: "Hello there. How are you?".to_string(),
            start: 0.0,
            end: 3.0,
            words: vec![
                word("Hello", 0.0, 0.4),
                word("there.", 0.5, 0.9),
                word("How", 1.2, 1.4),
                word("are", 1.5, 1.7),
                word("you?", 1.8, 2.2),
            ],
        }];

        let sentences = assemble_sentences(&segments);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].id, SentenceId(1));
        assert_eq!(sentences[0].text, "Hello there.");
        assert_eq!(sentences[0].start, 0.0);
        assert_eq!(sentences[0].end, 0.9);
        assert_eq!(sentences[1].id, SentenceId(2));
        assert_eq!(sentences[1].start, 1.2);
        assert_eq!(sentences[1].end, 2.2);
    }

    #[test]
    fn test_assemble_keeps_trailing_words() {
        let segments = vec![TranscriptSegment {
            text: "unfinished thought".to_string(),
            start: 0.0,
            end: 1.0,
            words: vec![word("unfinished", 0.0, 0.5), word("thought", 0.5, 1.0)],
        }];

        let sentences = assemble_sentences(&segments);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "unfinished thought");
    }

    #[test]
    fn test_assemble_spans_segments() {
        let segments = vec![
            TranscriptSegment {
                text: "one two".to_string(),
                start: 0.0,
                end: 1.0,
                words: vec![word("one", 0.0, 0.4), word("two", 0.5, 1.0)],
            },
            TranscriptSegment {
                text: "three.".to_string(),
                start: 1.0,
                end: 2.0,
                words: vec![word("three.", 1.1, 1.9)],
            },
        ];

        let sentences = assemble_sentences(&segments);
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0].text, "one two three.");
        assert_eq!(sentences[0].end, 1.9);
    }

    #[test]
    fn test_sentence_id_accepts_string_and_integer() {
        let from_int: SentenceId = serde_json::from_str("7").unwrap();
        let from_str: SentenceId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(from_int, from_str);

        // Serializes back as an integer.
        assert_eq!(serde_json::to_string(&from_int).unwrap(), "7");

        assert!(serde_json::from_str::<SentenceId>("\"x\"").is_err());
        assert!(serde_json::from_str::<SentenceId>("-1").is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let mut sentence = Sentence {
            id: SentenceId(1),
            text: "hi".to_string(),
            start: 2.0,
            end: 1.0,
            words: vec![],
        };
        assert!(matches!(
            sentence.validate_bounds(),
            Err(AutocutError::InvalidBounds { .. })
        ));

        sentence.end = 3.0;
        assert!(sentence.validate_bounds().is_ok());
    }
}
