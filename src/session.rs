//! Per-chat conversation sessions and the store that owns them.
//!
//! All conversation state is volatile: a session lives in memory from first
//! contact until submit or cancel, and nothing survives a restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Which step of the conversation a session is waiting on.
///
/// The single source of truth for "where we are" — never inferred from
/// which optional fields happen to be populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingName,
    AwaitingCategory,
    AwaitingAnswer,
}

/// One respondent's in-flight conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub state: SessionState,
    /// Set once from the first text message, immutable after.
    pub respondent_name: Option<String>,
    /// Set once at category selection, immutable after.
    pub category: Option<String>,
    /// Cursor into the active question list. Meaningful only in
    /// `AwaitingAnswer`, where `cursor < answers.len()` always holds.
    pub cursor: usize,
    /// One slot per question, allocated at category selection and never
    /// resized. `None` marks a question not answered yet.
    pub answers: Vec<Option<String>>,
    last_activity: Instant,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::AwaitingName,
            respondent_name: None,
            category: None,
            cursor: 0,
            answers: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    /// Store the respondent's name and move on to category selection.
    pub fn set_name(&mut self, name: &str) {
        self.respondent_name = Some(name.trim().to_string());
        self.state = SessionState::AwaitingCategory;
    }

    /// Fix the category and allocate the answer buffer for its questions.
    pub fn select_category(&mut self, key: &str, question_count: usize) {
        self.category = Some(key.to_string());
        self.answers = vec![None; question_count];
        self.cursor = 0;
        self.state = SessionState::AwaitingAnswer;
    }

    /// Buffer (or overwrite) the answer at the cursor.
    pub fn record_answer(&mut self, answer: String) {
        self.answers[self.cursor] = Some(answer);
    }

    pub fn answered(&self, index: usize) -> Option<&str> {
        self.answers.get(index).and_then(|a| a.as_deref())
    }

    pub fn all_answered(&self) -> bool {
        self.answers.iter().all(|a| a.is_some())
    }

    pub fn first_unanswered(&self) -> Option<usize> {
        self.answers.iter().position(|a| a.is_none())
    }

    pub fn is_last_question(&self) -> bool {
        self.cursor + 1 == self.answers.len()
    }

    /// The flat record handed to persistence:
    /// `[name, category, answers...]`, field order matching question order.
    pub fn record(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(2 + self.answers.len());
        fields.push(self.respondent_name.clone().unwrap_or_default());
        fields.push(self.category.clone().unwrap_or_default());
        fields.extend(self.answers.iter().map(|a| a.clone().unwrap_or_default()));
        fields
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A session slot: `None` between conversations.
///
/// The slot mutex is the per-identity serialization point: a transition
/// holds it from lookup through action emission, so a double-click queues
/// behind the first click and then sees the already-advanced state.
pub type SessionSlot = Arc<Mutex<Option<Session>>>;

/// Holds one slot per chat identity. The only shared mutable state in the
/// bot; only the engine mutates sessions, under the slot lock.
pub struct SessionStore {
    slots: Mutex<HashMap<String, SessionSlot>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the slot for an identity.
    pub async fn slot(&self, identity: &str) -> SessionSlot {
        let mut slots = self.slots.lock().await;
        slots
            .entry(identity.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    /// Drop empty slots and sessions idle longer than `max_idle`.
    ///
    /// Slots whose transition is in flight are skipped and picked up on the
    /// next sweep.
    pub async fn prune_idle(&self, max_idle: Duration) -> usize {
        let mut slots = self.slots.lock().await;
        let before = slots.len();
        slots.retain(|identity, slot| {
            let Ok(mut guard) = slot.try_lock() else {
                return true;
            };
            match guard.as_ref() {
                None => false,
                Some(session) if session.idle_for() > max_idle => {
                    tracing::debug!(%identity, "Pruning idle session");
                    *guard = None;
                    false
                }
                Some(_) => true,
            }
        });
        before - slots.len()
    }

    #[cfg(test)]
    pub async fn slot_count(&self) -> usize {
        self.slots.lock().await.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
