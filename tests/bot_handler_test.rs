use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use recipe_bot::bot::{run_polling, RecipeBot};
use recipe_bot::extract::ParseError;
use recipe_bot::generation::{GenerationError, GenerationRequest, RecipeGenerator};
use recipe_bot::telegram::{MessageSink, ParseMode, TransportError, Update, UpdateSource};
use recipe_bot::Recipe;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
struct Sent {
    chat_id: i64,
    text: String,
    parse_mode: Option<ParseMode>,
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<Sent>>,
    fail: bool,
}

impl RecordingSink {
    fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent {
            chat_id,
            text: text.to_string(),
            parse_mode,
        });
        if self.fail {
            return Err(TransportError::Api {
                description: "Bad Request: can't parse entities".to_string(),
            });
        }
        Ok(())
    }
}

enum Behaviour {
    Recipes(Vec<Recipe>),
    Fail,
    Hang,
}

struct FakeGenerator {
    behaviour: Behaviour,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RecipeGenerator for FakeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Recipe>, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.behaviour {
            Behaviour::Recipes(recipes) => Ok(recipes.clone()),
            Behaviour::Fail => Err(GenerationError::Parse(ParseError {
                raw: "no structured data here".to_string(),
            })),
            Behaviour::Hang => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }
}

fn bot(generator: Arc<FakeGenerator>, sink: Arc<RecordingSink>) -> RecipeBot {
    RecipeBot::new(generator, sink, Duration::from_secs(5))
}

#[tokio::test]
async fn test_ack_then_one_message_per_recipe() {
    let generator = Arc::new(FakeGenerator::new(Behaviour::Recipes(vec![
        Recipe::new("Arroz con pollo", "Cocinar el arroz."),
        Recipe::new("Pollo *crujiente*", "Freír."),
    ])));
    let sink = Arc::new(RecordingSink::default());

    bot(generator.clone(), sink.clone())
        .handle_message(42, "  dos recetas con pollo y arroz  ")
        .await;

    let sent = sink.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].text, "Generaré 2 receta(s) como pediste.");
    assert_eq!(sent[0].parse_mode, None);
    assert_eq!(sent[1].text, "*Arroz con pollo*\n\nCocinar el arroz\\.");
    assert_eq!(sent[1].parse_mode, Some(ParseMode::MarkdownV2));
    assert_eq!(sent[2].text, "*Pollo \\*crujiente\\**\n\nFreír\\.");
    assert!(sent.iter().all(|m| m.chat_id == 42));

    let requests = generator.requests.lock().unwrap();
    assert_eq!(
        requests[0],
        GenerationRequest::new("dos recetas con pollo y arroz", 2)
    );
}

#[tokio::test]
async fn test_large_request_is_capped_with_notice() {
    let generator = Arc::new(FakeGenerator::new(Behaviour::Recipes(vec![Recipe::new(
        "A", "B",
    )])));
    let sink = Arc::new(RecordingSink::default());

    bot(generator.clone(), sink.clone())
        .handle_message(1, "quiero 5 recetas")
        .await;

    assert_eq!(
        sink.sent()[0].text,
        "Pediste 5 recetas. Generaré un máximo de 3 recetas."
    );
    assert_eq!(generator.requests.lock().unwrap()[0].count, 3);
}

#[tokio::test]
async fn test_unspecified_count_is_between_one_and_three() {
    let generator = Arc::new(FakeGenerator::new(Behaviour::Recipes(vec![])));
    let sink = Arc::new(RecordingSink::default());

    bot(generator.clone(), sink.clone())
        .handle_message(1, "pollo y arroz")
        .await;

    let count = generator.requests.lock().unwrap()[0].count;
    assert!((1..=3).contains(&count));
    assert!(sink.sent()[0].text.starts_with("Recibí tus ingredientes."));
}

#[tokio::test]
async fn test_generation_error_becomes_single_message() {
    let generator = Arc::new(FakeGenerator::new(Behaviour::Fail));
    let sink = Arc::new(RecordingSink::default());

    bot(generator, sink.clone()).handle_message(7, "tres huevos").await;

    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].text.starts_with("Error generando recetas: "));
    assert!(sent[1].text.contains("no structured data here"));
    assert_eq!(sent[1].parse_mode, None);
}

#[tokio::test]
async fn test_empty_result_is_reported() {
    let generator = Arc::new(FakeGenerator::new(Behaviour::Recipes(vec![])));
    let sink = Arc::new(RecordingSink::default());

    bot(generator, sink.clone()).handle_message(7, "una receta").await;

    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].text, "Generaré 1 receta(s) como pediste.");
}

#[tokio::test]
async fn test_request_timeout_reports_error() {
    let generator = Arc::new(FakeGenerator::new(Behaviour::Hang));
    let sink = Arc::new(RecordingSink::default());

    RecipeBot::new(generator, sink.clone(), Duration::from_millis(50))
        .handle_message(7, "una receta")
        .await;

    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[1].text.starts_with("Error generando recetas: "));
}

#[tokio::test]
async fn test_delivery_failures_do_not_stop_dispatch() {
    let generator = Arc::new(FakeGenerator::new(Behaviour::Recipes(vec![
        Recipe::new("A", "1"),
        Recipe::new("B", "2"),
    ])));
    let sink = Arc::new(RecordingSink::failing());

    bot(generator, sink.clone()).handle_message(7, "dos recetas").await;

    // ack + both recipes were still attempted
    assert_eq!(sink.sent().len(), 3);
}

#[tokio::test]
async fn test_blank_message_is_ignored() {
    let generator = Arc::new(FakeGenerator::new(Behaviour::Recipes(vec![])));
    let sink = Arc::new(RecordingSink::default());

    bot(generator.clone(), sink.clone()).handle_message(7, "   ").await;

    assert!(sink.sent().is_empty());
    assert!(generator.requests.lock().unwrap().is_empty());
}

// Hands out queued batches, then blocks like an idle long poll.
struct ScriptedUpdates {
    batches: Mutex<VecDeque<Vec<Update>>>,
    offsets: Mutex<Vec<i64>>,
}

#[async_trait]
impl UpdateSource for ScriptedUpdates {
    async fn next_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.offsets.lock().unwrap().push(offset);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => Ok(batch),
            None => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }
}

fn update(json: serde_json::Value) -> Update {
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn test_polling_dispatches_text_updates_until_shutdown() {
    let generator = Arc::new(FakeGenerator::new(Behaviour::Recipes(vec![Recipe::new(
        "A", "B",
    )])));
    let sink = Arc::new(RecordingSink::default());
    let bot = Arc::new(bot(generator, sink.clone()));

    let source = Arc::new(ScriptedUpdates {
        batches: Mutex::new(VecDeque::from(vec![vec![
            update(serde_json::json!({
                "update_id": 100,
                "message": {"message_id": 1, "chat": {"id": 5}, "text": "una receta"}
            })),
            update(serde_json::json!({
                "update_id": 101,
                "message": {"message_id": 2, "chat": {"id": 6}}
            })),
        ]])),
        offsets: Mutex::new(Vec::new()),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(run_polling(bot, source.clone(), shutdown_rx));

    for _ in 0..100 {
        if sink.sent().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("polling loop stops on shutdown")
        .unwrap();

    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|m| m.chat_id == 5));
    // offset moves past the last seen update, text or not
    assert_eq!(*source.offsets.lock().unwrap(), vec![0, 102]);
}
