//! The conversation state machine.
//!
//! One call to [`ConversationEngine::handle`] consumes one decoded event,
//! applies at most one transition under the identity's session slot lock,
//! and returns the outbound actions the dispatcher should execute. The
//! engine itself never touches the transport or the spreadsheet.

pub mod action;
pub mod event;

pub use action::{Action, Button, Keyboard};
pub use event::{Direction, Event};

use std::sync::Arc;

use crate::catalog::{Catalog, Question};
use crate::config::SubmitPolicy;
use crate::session::{Session, SessionState, SessionStore};

/// The state machine core. Cheap to share; all mutable state lives in the
/// injected [`SessionStore`].
pub struct ConversationEngine {
    catalog: Arc<Catalog>,
    store: Arc<SessionStore>,
    policy: SubmitPolicy,
    banner_url: Option<String>,
}

impl ConversationEngine {
    pub fn new(catalog: Arc<Catalog>, store: Arc<SessionStore>, policy: SubmitPolicy) -> Self {
        Self {
            catalog,
            store,
            policy,
            banner_url: None,
        }
    }

    /// Attach a decorative image to the welcome prompt.
    pub fn with_banner(mut self, url: impl Into<String>) -> Self {
        self.banner_url = Some(url.into());
        self
    }

    /// Apply one transition for `identity`.
    ///
    /// The slot lock is held from lookup through action assembly, so
    /// transitions for one identity are strictly serialized: the second of
    /// two racing clicks waits here, then sees the advanced (or cleared)
    /// session and falls through to the ignore arm.
    pub async fn handle(&self, identity: &str, event: Event) -> Vec<Action> {
        if event == Event::Unrecognized {
            tracing::debug!(identity, "Ignoring unrecognized event");
            return Vec::new();
        }

        let slot = self.store.slot(identity).await;
        let mut guard = slot.lock().await;

        let Some(mut session) = guard.take() else {
            return match event {
                Event::Start => {
                    tracing::info!(identity, "Conversation started");
                    *guard = Some(Session::new());
                    self.welcome()
                }
                other => {
                    tracing::debug!(identity, ?other, "Event without a session; ignoring");
                    Vec::new()
                }
            };
        };
        session.touch();

        // Exhaustive over (state, event); arms that keep the conversation
        // alive put the session back, terminal arms drop it.
        match (session.state, event) {
            (_, Event::Cancel) => {
                tracing::info!(identity, "Conversation cancelled");
                vec![Action::text(
                    "❌ Survey cancelled. Nothing was saved. Send /start to begin again.",
                )]
            }

            (SessionState::AwaitingName, Event::Start) => {
                let actions = vec![ask_name()];
                *guard = Some(session);
                actions
            }

            (SessionState::AwaitingName, Event::Text(name)) => {
                session.set_name(&name);
                let actions = vec![self.category_prompt(&session)];
                *guard = Some(session);
                actions
            }

            (SessionState::AwaitingCategory, Event::SelectCategory(key)) => {
                match self.catalog.questions_for(&key) {
                    Ok(questions) => {
                        session.select_category(&key, questions.len());
                        let actions = vec![self.question_prompt(questions, &session)];
                        *guard = Some(session);
                        actions
                    }
                    Err(e) => {
                        // The keys on our own keyboard come from the catalog,
                        // so a miss is a data-consistency bug, fatal for this
                        // session only.
                        tracing::error!(identity, error = %e, "Category lookup failed; discarding session");
                        vec![Action::text(
                            "⚠️ Something went wrong and the survey can't continue. Send /start to try again.",
                        )]
                    }
                }
            }

            (SessionState::AwaitingAnswer, Event::SelectOption(label)) => {
                let questions = match self.active_questions(&session) {
                    Ok(q) => q,
                    Err(actions) => return actions,
                };
                if !questions[session.cursor].options.contains(&label) {
                    // Stale click from an earlier question's keyboard.
                    tracing::debug!(identity, %label, "Option not on the current question; ignoring");
                    *guard = Some(session);
                    return Vec::new();
                }
                session.record_answer(label);
                self.advance_or_finish(identity, session, &mut guard)
            }

            (SessionState::AwaitingAnswer, Event::Text(text)) => {
                // Free-text answers are first-class: typing beats clicking.
                session.record_answer(text);
                self.advance_or_finish(identity, session, &mut guard)
            }

            (SessionState::AwaitingAnswer, Event::Navigate(direction)) => {
                let questions = match self.active_questions(&session) {
                    Ok(q) => q,
                    Err(actions) => return actions,
                };
                let last = questions.len() - 1;
                session.cursor = match direction {
                    Direction::Back => session.cursor.saturating_sub(1),
                    Direction::Forward => (session.cursor + 1).min(last),
                };
                let actions = vec![self.question_prompt(questions, &session)];
                *guard = Some(session);
                actions
            }

            (SessionState::AwaitingAnswer, Event::Submit) => {
                if session.all_answered() {
                    finish(identity, session)
                } else {
                    let questions = match self.active_questions(&session) {
                        Ok(q) => q,
                        Err(actions) => return actions,
                    };
                    session.cursor = session.first_unanswered().unwrap_or(0);
                    let prompt = self.question_prompt(questions, &session);
                    let actions = vec![
                        Action::text("✋ A few questions are still unanswered."),
                        prompt,
                    ];
                    *guard = Some(session);
                    actions
                }
            }

            (state, other) => {
                tracing::debug!(identity, ?state, ?other, "Event not valid for state; ignoring");
                *guard = Some(session);
                Vec::new()
            }
        }
    }

    // ── Transition helpers ──────────────────────────────────────────

    /// After an answer lands at the cursor: move forward, or hand off.
    fn advance_or_finish(
        &self,
        identity: &str,
        mut session: Session,
        guard: &mut Option<Session>,
    ) -> Vec<Action> {
        let questions = match self.active_questions(&session) {
            Ok(q) => q,
            Err(actions) => return actions,
        };

        if !session.is_last_question() {
            session.cursor += 1;
            let actions = vec![self.question_prompt(questions, &session)];
            *guard = Some(session);
            return actions;
        }

        // Last question answered.
        match self.policy {
            SubmitPolicy::Auto if session.all_answered() => finish(identity, session),
            SubmitPolicy::Auto => {
                // Holes are only reachable by skipping questions through
                // navigation; walk back to the first one instead of
                // persisting blanks.
                session.cursor = session.first_unanswered().unwrap_or(0);
                let prompt = self.question_prompt(questions, &session);
                let actions = vec![
                    Action::text("✋ A few questions are still unanswered."),
                    prompt,
                ];
                *guard = Some(session);
                actions
            }
            SubmitPolicy::Explicit => {
                let actions = vec![self.question_prompt(questions, &session)];
                *guard = Some(session);
                actions
            }
        }
    }

    /// The question list the session branched into at category selection.
    ///
    /// A lookup failure after that point means the catalog and the session
    /// disagree: fatal for this session, reported and never retried.
    fn active_questions(&self, session: &Session) -> Result<&[Question], Vec<Action>> {
        let key = session.category.as_deref().unwrap_or_default();
        self.catalog.questions_for(key).map_err(|e| {
            tracing::error!(error = %e, "Active category vanished from catalog; discarding session");
            vec![Action::text(
                "⚠️ Something went wrong and the survey can't continue. Send /start to try again.",
            )]
        })
    }

    // ── Prompt rendering ────────────────────────────────────────────

    fn welcome(&self) -> Vec<Action> {
        let text = "👋 Hi! This is a short survey with a handful of quick questions.\n\
                    Press Begin, or just type your name.";
        let keyboard = Keyboard::new().row(vec![Button::new("🚀 Begin", event::START)]);
        match &self.banner_url {
            Some(url) => vec![Action::SendImage {
                image_url: url.clone(),
                caption: Some(text.to_string()),
                keyboard: Some(keyboard),
            }],
            None => vec![Action::text_with_keyboard(text, keyboard)],
        }
    }

    fn category_prompt(&self, session: &Session) -> Action {
        let name = session.respondent_name.as_deref().unwrap_or("there");
        let mut keyboard = Keyboard::new();
        for category in self.catalog.categories() {
            keyboard = keyboard.row(vec![Button::new(
                category.label.clone(),
                event::category_token(&category.key),
            )]);
        }
        Action::text_with_keyboard(
            format!("Nice to meet you, {name}! Pick a topic:"),
            keyboard,
        )
    }

    fn question_prompt(&self, questions: &[Question], session: &Session) -> Action {
        let question = &questions[session.cursor];
        let mut text = format!(
            "Question {}/{}\n\n{}",
            session.cursor + 1,
            questions.len(),
            question.prompt
        );
        if let Some(previous) = session.answered(session.cursor) {
            text.push_str(&format!("\n\nCurrent answer: {previous}"));
        }

        let mut keyboard = Keyboard::new();
        for option in &question.options {
            keyboard = keyboard.row(vec![Button::new(
                option.clone(),
                event::answer_token(option),
            )]);
        }
        if questions.len() > 1 {
            keyboard = keyboard.row(vec![
                Button::new("⬅️ Back", "prev"),
                Button::new("Next ➡️", "next"),
            ]);
        }
        if self.policy == SubmitPolicy::Explicit && session.all_answered() {
            keyboard = keyboard.row(vec![Button::new("✅ Submit", event::SUBMIT)]);
        }

        Action::text_with_keyboard(text, keyboard)
    }
}

fn ask_name() -> Action {
    Action::text("What's your name?")
}

/// Terminal transition: the session is dropped here, before the append is
/// executed, so a replayed submit finds no session and cannot double-append.
fn finish(identity: &str, session: Session) -> Vec<Action> {
    tracing::info!(identity, "Survey complete, handing record to persistence");
    vec![Action::Append {
        record: session.record(),
    }]
}
