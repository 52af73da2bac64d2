//! Outbound actions emitted by a transition.
//!
//! Actions are addressed to the session's own chat; the dispatcher pairs
//! them with the identity the triggering event arrived on.

/// One inline button: a visible label and the callback token it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub token: String,
}

impl Button {
    pub fn new(label: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            token: token.into(),
        }
    }
}

/// Rows of buttons attached to an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What the engine asks the outside world to do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a text prompt, optionally with buttons.
    SendText {
        text: String,
        keyboard: Option<Keyboard>,
    },
    /// Send a decorative image. Transports without image support may send
    /// the caption as plain text instead.
    SendImage {
        image_url: String,
        caption: Option<String>,
        keyboard: Option<Keyboard>,
    },
    /// Hand the finished record to persistence. Emitted at most once per
    /// session; the session is already gone when this action is executed.
    Append { record: Vec<String> },
}

impl Action {
    pub fn text(text: impl Into<String>) -> Self {
        Self::SendText {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn text_with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self::SendText {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}
