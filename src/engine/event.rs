//! Inbound event decoding.
//!
//! Every inbound text or callback token is decoded exactly once into a
//! closed variant, then matched against the current session state. Tokens
//! that fit no variant decode to `Unrecognized` and never reach a
//! transition.

/// Callback token vocabulary. Builders and the decoder live side by side
/// so the keyboard layer cannot drift from the parser.
pub const START: &str = "start";
pub const CATEGORY_PREFIX: &str = "type_";
pub const NUMBER_PREFIX: &str = "num_";
pub const ANSWER_PREFIX: &str = "ans_";
pub const SUBMIT: &str = "submit";
pub const FINAL_SUBMIT: &str = "final_submit";

pub fn category_token(key: &str) -> String {
    format!("{CATEGORY_PREFIX}{key}")
}

pub fn answer_token(label: &str) -> String {
    format!("{ANSWER_PREFIX}{label}")
}

/// Navigation direction through the question list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Back,
    Forward,
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `/start` command or the begin button.
    Start,
    /// `/cancel` command.
    Cancel,
    /// A plain text message (name entry or free-text answer).
    Text(String),
    /// A category button.
    SelectCategory(String),
    /// An option button; the label doubles as the persisted value.
    SelectOption(String),
    /// Previous/next question button.
    Navigate(Direction),
    /// Explicit submit button.
    Submit,
    /// Anything the decoder does not know. Ignored without a transition.
    Unrecognized,
}

impl Event {
    /// Decode a plain text message. Commands win over free text.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if let Some(command) = trimmed.strip_prefix('/') {
            // In group chats commands arrive as `/start@bot_name`.
            let name = command
                .split_whitespace()
                .next()
                .unwrap_or("")
                .split('@')
                .next()
                .unwrap_or("");
            return match name {
                "start" => Self::Start,
                "cancel" => Self::Cancel,
                _ => Self::Unrecognized,
            };
        }
        if trimmed.is_empty() {
            return Self::Unrecognized;
        }
        Self::Text(trimmed.to_string())
    }

    /// Decode a callback token from a button click.
    pub fn from_token(token: &str) -> Self {
        match token {
            START => return Self::Start,
            SUBMIT | FINAL_SUBMIT => return Self::Submit,
            "prev" | "prev_q" => return Self::Navigate(Direction::Back),
            "next" | "next_q" => return Self::Navigate(Direction::Forward),
            _ => {}
        }
        if let Some(key) = token.strip_prefix(CATEGORY_PREFIX) {
            if !key.is_empty() {
                return Self::SelectCategory(key.to_string());
            }
        }
        if let Some(key) = token.strip_prefix(NUMBER_PREFIX) {
            if !key.is_empty() {
                return Self::SelectCategory(key.to_string());
            }
        }
        if let Some(label) = token.strip_prefix(ANSWER_PREFIX) {
            if !label.is_empty() {
                return Self::SelectOption(label.to_string());
            }
        }
        Self::Unrecognized
    }
}
