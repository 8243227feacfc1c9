//! Analytics chat pipeline: classify → execute → shape → narrate.
//!
//! One stateless pass per request; nothing is shared between requests and
//! no step is retried. Only classification failures (and a classification
//! that carries no SQL) produce an error envelope; everything after that
//! degrades to a valid, if empty, KPI or chart response.

use crate::classifier;
use crate::executor::QueryRunner;
use crate::llm::ChatModel;
use crate::narrator;
use crate::prompts;
use crate::shaper::{self, ResponseEnvelope};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// What `/analytics/chat` returns: the shaped envelope plus the narrator's
/// one-sentence summary.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    #[serde(flatten)]
    pub envelope: ResponseEnvelope,
    pub message: String,
}

pub struct AnalyticsChat {
    model: Arc<dyn ChatModel>,
    store: Arc<dyn QueryRunner>,
    schema: String,
}

impl AnalyticsChat {
    pub fn new(model: Arc<dyn ChatModel>, store: Arc<dyn QueryRunner>) -> Self {
        Self {
            model,
            store,
            schema: prompts::DB_SCHEMA.to_string(),
        }
    }

    /// Run one request through the whole pipeline, narration included.
    pub async fn ask(&self, user_message: &str) -> ChatReply {
        let envelope = self.process(user_message).await;
        let message = narrator::narrate(self.model.as_ref(), &envelope, user_message).await;
        ChatReply { envelope, message }
    }

    /// Classification, execution and shaping; narration is layered on top by
    /// [`AnalyticsChat::ask`].
    pub async fn process(&self, user_message: &str) -> ResponseEnvelope {
        let request_id = Uuid::new_v4();
        info!(%request_id, "traitement de la question analytique");

        let classification =
            match classifier::classify(self.model.as_ref(), user_message, &self.schema).await {
                Ok(c) => c,
                Err(e) => {
                    error!(%request_id, "Erreur classification: {}", e);
                    return ResponseEnvelope::error(
                        "Impossible de comprendre votre demande. Essayez de reformuler.",
                    );
                }
            };

        if classification.sql_query.trim().is_empty() {
            error!(%request_id, "la classification ne contient aucune requête SQL");
            return ResponseEnvelope::error("Impossible de générer la requête SQL.");
        }

        let rows = self.store.run(&classification.sql_query).await;
        shaper::shape(&rows, &classification)
    }
}
