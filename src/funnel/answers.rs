//! Answer store: the collected answers, mirrored to durable storage.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::{ANSWERS_SLOT, SUBMISSION_SLOT, SlotStorage};

/// Separator used when a multi-select answer is stored as one string.
pub const MULTI_SELECT_SEPARATOR: &str = ", ";

/// The questions the funnel asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKey {
    Q1,
    Q2,
    Name,
    Email,
}

impl AnswerKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Q1 => "q1",
            Self::Q2 => "q2",
            Self::Name => "name",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Answers collected so far. Set fields are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingAnswers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Milliseconds since the Unix epoch, set when the email is submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl OnboardingAnswers {
    pub fn get(&self, key: AnswerKey) -> Option<&str> {
        self.slot(key).as_deref()
    }

    /// Number of answered questions (the timestamp is not counted).
    pub fn len(&self) -> usize {
        [&self.q1, &self.q2, &self.name, &self.email]
            .iter()
            .filter(|v| v.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, key: AnswerKey) -> &Option<String> {
        match key {
            AnswerKey::Q1 => &self.q1,
            AnswerKey::Q2 => &self.q2,
            AnswerKey::Name => &self.name,
            AnswerKey::Email => &self.email,
        }
    }

    fn slot_mut(&mut self, key: AnswerKey) -> &mut Option<String> {
        match key {
            AnswerKey::Q1 => &mut self.q1,
            AnswerKey::Q2 => &mut self.q2,
            AnswerKey::Name => &mut self.name,
            AnswerKey::Email => &mut self.email,
        }
    }
}

/// Join multi-select choices into the single stored string.
pub fn join_selection<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(MULTI_SELECT_SEPARATOR)
}

/// In-memory answers with a best-effort durable mirror.
///
/// Every mutation rewrites the whole snapshot into [`ANSWERS_SLOT`]. Storage
/// failures are logged and otherwise ignored.
pub struct AnswerStore {
    answers: OnboardingAnswers,
    storage: Arc<dyn SlotStorage>,
}

impl AnswerStore {
    pub fn new(storage: Arc<dyn SlotStorage>) -> Self {
        Self {
            answers: OnboardingAnswers::default(),
            storage,
        }
    }

    /// Overwrite one answer, keeping the rest. Empty values are ignored.
    pub async fn set(&mut self, key: AnswerKey, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            debug!(key = %key, "Ignoring empty answer");
            return;
        }
        *self.answers.slot_mut(key) = Some(value);
        self.persist().await;
    }

    /// Record the submission timestamp.
    pub async fn stamp(&mut self, timestamp_ms: i64) {
        self.answers.timestamp = Some(timestamp_ms);
        self.persist().await;
    }

    /// Snapshot of the current answers.
    pub fn get_all(&self) -> OnboardingAnswers {
        self.answers.clone()
    }

    /// Write the final-submission snapshot.
    pub async fn save_submission(&self) {
        self.write_slot(SUBMISSION_SLOT).await;
    }

    /// Drop all answers and both storage slots.
    pub async fn clear(&mut self) {
        self.answers = OnboardingAnswers::default();
        for slot in [ANSWERS_SLOT, SUBMISSION_SLOT] {
            if let Err(e) = self.storage.remove(slot).await {
                warn!(slot, error = %e, "Failed to clear storage slot");
            }
        }
    }

    /// Replace the in-memory answers with the persisted snapshot. A missing
    /// or unreadable slot leaves the store empty.
    pub async fn restore(&mut self) {
        self.answers = OnboardingAnswers::default();
        let raw = match self.storage.get(ANSWERS_SLOT).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Failed to read stored answers");
                return;
            }
        };
        match serde_json::from_str::<OnboardingAnswers>(&raw) {
            Ok(answers) => self.answers = answers,
            Err(e) => warn!(error = %e, "Stored answers are not valid JSON, starting empty"),
        }
    }

    async fn persist(&self) {
        self.write_slot(ANSWERS_SLOT).await;
    }

    async fn write_slot(&self, slot: &str) {
        let json = match serde_json::to_string(&self.answers) {
            Ok(json) => json,
            Err(e) => {
                warn!(slot, error = %e, "Failed to serialize answers");
                return;
            }
        };
        if let Err(e) = self.storage.set(slot, &json).await {
            warn!(slot, error = %e, "Failed to persist answers");
        }
    }
}
