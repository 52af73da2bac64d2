//! End-to-end conversation flows through the dispatcher, with a stub
//! transport and a recording gateway standing in for Telegram and Sheets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use survey_bot::bot::SurveyBot;
use survey_bot::catalog::{Catalog, Category, Question};
use survey_bot::channels::{Channel, ChannelEvent, EventStream};
use survey_bot::config::SubmitPolicy;
use survey_bot::engine::{ConversationEngine, Keyboard};
use survey_bot::error::{ChannelError, PersistError};
use survey_bot::persist::PersistenceGateway;
use survey_bot::session::SessionStore;

// ── Test doubles ────────────────────────────────────────────────────

#[derive(Default)]
struct StubChannel {
    sent: Mutex<Vec<(String, String)>>,
    acked: Mutex<Vec<String>>,
}

impl StubChannel {
    async fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().await.iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Channel for StubChannel {
    fn name(&self) -> &str {
        "stub"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn send_text(
        &self,
        identity: &str,
        text: &str,
        _keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .await
            .push((identity.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_image(
        &self,
        identity: &str,
        _image_url: &str,
        caption: Option<&str>,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        self.send_text(identity, caption.unwrap_or_default(), keyboard)
            .await
    }

    async fn ack_click(&self, callback_id: &str) -> Result<(), ChannelError> {
        self.acked.lock().await.push(callback_id.to_string());
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingGateway {
    records: Mutex<Vec<Vec<String>>>,
    fail: bool,
}

impl RecordingGateway {
    fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    async fn appended(&self) -> Vec<Vec<String>> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl PersistenceGateway for RecordingGateway {
    async fn append_record(&self, fields: &[String]) -> Result<(), PersistError> {
        if self.fail {
            return Err(PersistError::Request("sheet unreachable".into()));
        }
        self.records.lock().await.push(fields.to_vec());
        Ok(())
    }
}

// ── Fixture ─────────────────────────────────────────────────────────

fn survey_catalog() -> Catalog {
    Catalog::new(vec![Category {
        key: "hero".into(),
        label: "Heroes".into(),
        questions: vec![
            Question {
                prompt: "Q1?".into(),
                options: vec!["O1".into(), "Z1".into()],
            },
            Question {
                prompt: "Q2?".into(),
                options: vec!["O2".into(), "Z2".into()],
            },
            Question {
                prompt: "Q3?".into(),
                options: vec!["O3".into(), "Z3".into()],
            },
            Question {
                prompt: "Q4?".into(),
                options: vec!["O4".into(), "Z4".into()],
            },
        ],
    }])
    .unwrap()
}

fn bot_with(
    gateway: Arc<RecordingGateway>,
) -> (SurveyBot, Arc<StubChannel>) {
    let store = Arc::new(SessionStore::new());
    let engine = ConversationEngine::new(
        Arc::new(survey_catalog()),
        Arc::clone(&store),
        SubmitPolicy::Auto,
    );
    let channel = Arc::new(StubChannel::default());
    let bot = SurveyBot::new(
        Arc::new(engine),
        Arc::clone(&channel) as Arc<dyn Channel>,
        gateway as Arc<dyn PersistenceGateway>,
        store,
        Duration::from_secs(3600),
    );
    (bot, channel)
}

fn text(identity: &str, text: &str) -> ChannelEvent {
    ChannelEvent::Text {
        identity: identity.into(),
        text: text.into(),
    }
}

fn click(identity: &str, token: &str) -> ChannelEvent {
    ChannelEvent::Click {
        identity: identity.into(),
        callback_id: format!("cb-{token}"),
        token: token.into(),
    }
}

// ── Flows ───────────────────────────────────────────────────────────

#[tokio::test]
async fn completed_survey_appends_one_row_and_confirms() {
    let gateway = Arc::new(RecordingGateway::default());
    let (bot, channel) = bot_with(Arc::clone(&gateway));

    bot.handle_event(text("42", "/start")).await;
    bot.handle_event(text("42", "Alex")).await;
    bot.handle_event(click("42", "type_hero")).await;
    for token in ["ans_O1", "ans_O2", "ans_O3", "ans_O4"] {
        bot.handle_event(click("42", token)).await;
    }

    assert_eq!(
        gateway.appended().await,
        vec![vec![
            "Alex".to_string(),
            "hero".to_string(),
            "O1".to_string(),
            "O2".to_string(),
            "O3".to_string(),
            "O4".to_string(),
        ]]
    );

    let texts = channel.sent_texts().await;
    assert!(texts.last().unwrap().contains("saved"));
}

#[tokio::test]
async fn every_click_is_acknowledged() {
    let gateway = Arc::new(RecordingGateway::default());
    let (bot, channel) = bot_with(gateway);

    bot.handle_event(text("42", "/start")).await;
    bot.handle_event(text("42", "Alex")).await;
    bot.handle_event(click("42", "type_hero")).await;
    bot.handle_event(click("42", "ans_O1")).await;

    let acked = channel.acked.lock().await.clone();
    assert_eq!(acked, ["cb-type_hero", "cb-ans_O1"]);
}

#[tokio::test]
async fn replayed_final_click_does_not_double_append() {
    let gateway = Arc::new(RecordingGateway::default());
    let (bot, _channel) = bot_with(Arc::clone(&gateway));

    bot.handle_event(text("42", "/start")).await;
    bot.handle_event(text("42", "Alex")).await;
    bot.handle_event(click("42", "type_hero")).await;
    for token in ["ans_O1", "ans_O2", "ans_O3", "ans_O4"] {
        bot.handle_event(click("42", token)).await;
    }
    // The respondent double-clicked the last option.
    bot.handle_event(click("42", "ans_O4")).await;
    bot.handle_event(click("42", "submit")).await;

    assert_eq!(gateway.appended().await.len(), 1);
}

#[tokio::test]
async fn gateway_failure_reports_and_discards_the_session() {
    let gateway = Arc::new(RecordingGateway::failing());
    let (bot, channel) = bot_with(Arc::clone(&gateway));

    bot.handle_event(text("42", "/start")).await;
    bot.handle_event(text("42", "Alex")).await;
    bot.handle_event(click("42", "type_hero")).await;
    for token in ["ans_O1", "ans_O2", "ans_O3", "ans_O4"] {
        bot.handle_event(click("42", token)).await;
    }

    let texts = channel.sent_texts().await;
    assert!(texts.last().unwrap().contains("could not be saved"));
    assert!(gateway.appended().await.is_empty());

    // The session is gone either way; a new /start begins from scratch.
    let sent_before = channel.sent.lock().await.len();
    bot.handle_event(text("42", "/start")).await;
    assert!(channel.sent.lock().await.len() > sent_before);
}

#[tokio::test]
async fn cancel_persists_nothing() {
    let gateway = Arc::new(RecordingGateway::default());
    let (bot, channel) = bot_with(Arc::clone(&gateway));

    bot.handle_event(text("42", "/start")).await;
    bot.handle_event(text("42", "Alex")).await;
    bot.handle_event(click("42", "type_hero")).await;
    bot.handle_event(click("42", "ans_O1")).await;
    bot.handle_event(text("42", "/cancel")).await;

    assert!(gateway.appended().await.is_empty());
    let texts = channel.sent_texts().await;
    assert!(texts.last().unwrap().contains("cancelled"));
}

#[tokio::test]
async fn respondents_do_not_interfere() {
    let gateway = Arc::new(RecordingGateway::default());
    let (bot, _channel) = bot_with(Arc::clone(&gateway));

    // Two interleaved conversations.
    bot.handle_event(text("a", "/start")).await;
    bot.handle_event(text("b", "/start")).await;
    bot.handle_event(text("a", "Alex")).await;
    bot.handle_event(text("b", "Blake")).await;
    bot.handle_event(click("a", "type_hero")).await;
    bot.handle_event(click("b", "type_hero")).await;

    for token in ["ans_O1", "ans_O2", "ans_O3", "ans_O4"] {
        bot.handle_event(click("a", token)).await;
    }
    for token in ["ans_Z1", "ans_Z2", "ans_Z3", "ans_Z4"] {
        bot.handle_event(click("b", token)).await;
    }

    let records = gateway.appended().await;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0][0], "Alex");
    assert_eq!(records[0][2..], ["O1", "O2", "O3", "O4"]);
    assert_eq!(records[1][0], "Blake");
    assert_eq!(records[1][2..], ["Z1", "Z2", "Z3", "Z4"]);
}

#[tokio::test]
async fn free_text_answers_mix_with_clicks() {
    let gateway = Arc::new(RecordingGateway::default());
    let (bot, _channel) = bot_with(Arc::clone(&gateway));

    bot.handle_event(text("42", "/start")).await;
    bot.handle_event(text("42", "Alex")).await;
    bot.handle_event(click("42", "type_hero")).await;
    bot.handle_event(click("42", "ans_O1")).await;
    bot.handle_event(text("42", "my own answer")).await;
    bot.handle_event(click("42", "ans_O3")).await;
    bot.handle_event(click("42", "ans_O4")).await;

    assert_eq!(
        gateway.appended().await[0][2..],
        ["O1", "my own answer", "O3", "O4"]
    );
}
