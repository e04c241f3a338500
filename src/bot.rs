// Per-message handling and the Telegram polling loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::format::{format_recipe, truncate_message};
use crate::generation::{GenerationRequest, RecipeGenerator};
use crate::quantity::{parse_requested_count, resolve_count};
use crate::telegram::{MessageSink, ParseMode, UpdateSource};

const EMPTY_RESULT_MESSAGE: &str = "No se me ocurrió ninguna receta con esos ingredientes.";
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(5);

pub struct RecipeBot {
    generator: Arc<dyn RecipeGenerator>,
    sink: Arc<dyn MessageSink>,
    request_timeout: Duration,
}

impl RecipeBot {
    pub fn new(
        generator: Arc<dyn RecipeGenerator>,
        sink: Arc<dyn MessageSink>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            sink,
            request_timeout,
        }
    }

    /// Handles one inbound text message end to end.
    ///
    /// Never fails: generation errors become a chat message, delivery errors are logged.
    #[instrument(skip(self, text))]
    pub async fn handle_message(&self, chat_id: i64, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let decision = {
            let mut rng = rand::thread_rng();
            resolve_count(parse_requested_count(text), &mut rng)
        };
        info!(count = decision.count, note = ?decision.note, "Resolved recipe count");
        self.send(chat_id, &decision.ack_message(), None).await;

        let request = GenerationRequest::new(text, decision.count);
        let outcome =
            tokio::time::timeout(self.request_timeout, self.generator.generate(&request)).await;

        let failure = match outcome {
            Ok(Ok(recipes)) if recipes.is_empty() => {
                warn!("Generation returned no recipes");
                self.send(chat_id, EMPTY_RESULT_MESSAGE, None).await;
                return;
            }
            Ok(Ok(recipes)) => {
                for recipe in &recipes {
                    self.send(chat_id, &format_recipe(recipe), Some(ParseMode::MarkdownV2))
                        .await;
                }
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "no hubo respuesta en {} segundos",
                self.request_timeout.as_secs()
            ),
        };

        error!(error = %failure, "Error generating recipes");
        let message = truncate_message(&format!("Error generando recetas: {}", failure));
        self.send(chat_id, &message, None).await;
    }

    // Best effort: a failed delivery is logged and dropped.
    async fn send(&self, chat_id: i64, text: &str, parse_mode: Option<ParseMode>) {
        if let Err(e) = self.sink.send_message(chat_id, text, parse_mode).await {
            error!(chat_id, error = %e, "Failed to deliver message");
        }
    }
}

/// Polls `source` and handles each text message on its own task until `shutdown` fires.
///
/// In-flight handlers are aborted on shutdown.
pub async fn run_polling<U>(bot: Arc<RecipeBot>, source: Arc<U>, mut shutdown: watch::Receiver<bool>)
where
    U: UpdateSource + ?Sized,
{
    info!("Starting update polling loop...");
    let mut offset = 0;
    let mut handlers = JoinSet::new();

    loop {
        let batch = tokio::select! {
            _ = shutdown.changed() => break,
            batch = source.next_updates(offset) => batch,
        };

        while let Some(finished) = handlers.try_join_next() {
            if let Err(e) = finished {
                if e.is_panic() {
                    error!("Message handler panicked: {:?}", e);
                }
            }
        }

        let updates = match batch {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Polling for updates failed, pausing");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(POLL_ERROR_PAUSE) => continue,
                }
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some((chat_id, text)) = update.text_message() else {
                debug!(update_id = update.update_id, "Skipping update without text");
                continue;
            };
            let text = text.to_string();
            let bot = bot.clone();
            handlers.spawn(async move {
                bot.handle_message(chat_id, &text).await;
            });
        }
    }

    info!(in_flight = handlers.len(), "Stopping update polling loop...");
    handlers.abort_all();
    while handlers.join_next().await.is_some() {}
}
