//! Edit decisions: which sentences survive the cut.

pub mod suggest;

pub use suggest::{EditSuggestion, SuggestionClient};

use crate::error::{AutocutError, Result};
use crate::transcript::{Sentence, SentenceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Per-sentence verdict in the human-editable decision file. The text is
/// carried along so the file can be reviewed and flipped by hand without
/// the transcript open next to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceChoice {
    pub text: String,
    pub keep: bool,
}

/// Total keep/remove mapping over sentence ids.
///
/// A `BTreeMap` keeps serialization deterministic; compiling the same
/// decision twice must produce byte-identical stage files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditDecision {
    pub sentences: BTreeMap<SentenceId, SentenceChoice>,
}

impl EditDecision {
    /// Build a full decision map from an LLM removal list: every sentence
    /// gets an explicit entry, removed ids flipped to `keep: false`.
    pub fn from_removals(sentences: &[Sentence], to_remove: &[SentenceId]) -> Self {
        let removed: BTreeSet<SentenceId> = to_remove.iter().copied().collect();
        let sentences = sentences
            .iter()
            .map(|s| {
                (
                    s.id,
                    SentenceChoice {
                        text: s.text.clone(),
                        keep: !removed.contains(&s.id),
                    },
                )
            })
            .collect();
        Self { sentences }
    }

    pub fn kept_count(&self) -> usize {
        self.sentences.values().filter(|c| c.keep).count()
    }

    pub fn removed_count(&self) -> usize {
        self.sentences.values().filter(|c| !c.keep).count()
    }
}

/// Filter the ordered sentence list down to the kept ids, preserving the
/// original relative order. Every sentence must have an explicit entry in
/// the decision; ambiguity is an error, not a guess.
pub fn select_kept(sentences: &[Sentence], decision: &EditDecision) -> Result<Vec<SentenceId>> {
    let order: Vec<SentenceId> = sentences.iter().map(|s| s.id).collect();
    select_kept_ids(&order, decision)
}

/// Id-level variant of [`select_kept`] for callers that carry the original
/// order without full sentences (e.g. the adjusted-segment file).
///
/// The decision must cover exactly the known ids: a sentence without an
/// entry is [`AutocutError::MissingDecision`], and an entry for an id the
/// transcript never produced is rejected too (it usually means the decision
/// file belongs to a different transcript).
pub fn select_kept_ids(order: &[SentenceId], decision: &EditDecision) -> Result<Vec<SentenceId>> {
    let known: BTreeSet<SentenceId> = order.iter().copied().collect();
    if let Some(unknown) = decision.sentences.keys().find(|id| !known.contains(*id)) {
        return Err(AutocutError::Config(format!(
            "decision has an entry for unknown sentence {unknown}"
        )));
    }

    let mut kept = Vec::with_capacity(order.len());
    for &id in order {
        let choice = decision
            .sentences
            .get(&id)
            .ok_or(AutocutError::MissingDecision(id))?;
        if choice.keep {
            kept.push(id);
        }
    }
    Ok(kept)
}
