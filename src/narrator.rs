//! Narrator - one-sentence natural-language summary of a shaped envelope.

use crate::llm::ChatModel;
use crate::prompts::NARRATION_SYSTEM_PROMPT;
use crate::shaper::{EnvelopeData, EnvelopeKind, KpiData, ResponseEnvelope};
use tracing::warn;

/// Summarize `envelope` for the chat transcript.
///
/// Error envelopes return their description verbatim without touching the
/// model. For everything else the model gets the serialized envelope plus
/// the original question; if it is unreachable, a deterministic template
/// takes over. This function never fails.
pub async fn narrate(
    model: &dyn ChatModel,
    envelope: &ResponseEnvelope,
    message: &str,
) -> String {
    if envelope.kind == EnvelopeKind::Error {
        return envelope.description.clone();
    }

    let payload = serde_json::to_string(envelope).unwrap_or_default();
    let user = format!("Question: {}\n\nRésultats: {}", message, payload);

    match model.complete(NARRATION_SYSTEM_PROMPT, &user).await {
        Ok(answer) => answer.trim().to_string(),
        Err(e) => {
            warn!("narration indisponible, réponse générée localement: {}", e);
            fallback_narration(envelope)
        }
    }
}

/// Deterministic narration used when the model is unavailable.
fn fallback_narration(envelope: &ResponseEnvelope) -> String {
    match &envelope.data {
        EnvelopeData::Kpi(KpiData::Scalar { formatted, .. }) => {
            format!("{}: {}", envelope.title, formatted)
        }
        EnvelopeData::Kpi(data) => {
            let dump = serde_json::to_string(data).unwrap_or_default();
            format!("{}: {}", envelope.title, dump)
        }
        _ => format!(
            "Voici le graphique '{}' avec les données demandées.",
            envelope.title
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ChartKind, Classification, OutputKind};
    use crate::error::{AnalyticsError, Result};
    use crate::executor::ResultSet;
    use crate::shaper::shape;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Model stub that always fails, counting how often it was consulted.
    struct OfflineModel {
        calls: AtomicUsize,
    }

    impl OfflineModel {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatModel for OfflineModel {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AnalyticsError::Llm("modèle indisponible".to_string()))
        }
    }

    fn classification(output: OutputKind, chart_type: Option<ChartKind>) -> Classification {
        Classification {
            output,
            chart_type,
            title: "Chiffre d'affaires".to_string(),
            description: String::new(),
            sql_query: "SELECT 1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_error_envelope_skips_the_model() {
        let model = OfflineModel::new();
        let envelope = ResponseEnvelope::error("Impossible de comprendre votre demande.");

        let message = narrate(&model, &envelope, "???").await;

        assert_eq!(message, "Impossible de comprendre votre demande.");
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_kpi_fallback_uses_formatted_value() {
        let model = OfflineModel::new();
        let rows = ResultSet {
            columns: vec!["value".to_string()],
            rows: vec![[("value".to_string(), serde_json::json!(2500))]
                .into_iter()
                .collect()],
        };
        let envelope = shape(&rows, &classification(OutputKind::Kpi, None));

        let message = narrate(&model, &envelope, "chiffre d'affaires total").await;

        assert_eq!(message, "Chiffre d'affaires: 2.5K");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chart_fallback_names_the_title() {
        let model = OfflineModel::new();
        let envelope = shape(
            &ResultSet::empty(),
            &classification(OutputKind::Chart, Some(ChartKind::Bar)),
        );

        let message = narrate(&model, &envelope, "ventes par catégorie").await;

        assert_eq!(
            message,
            "Voici le graphique 'Chiffre d'affaires' avec les données demandées."
        );
    }
}
