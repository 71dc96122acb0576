use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{EnrichedIndicator, Month};

#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("request to the analysis service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("analysis service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("analysis service returned no text")]
    EmptyResponse,
    #[error("could not serialize indicator summary: {0}")]
    Summary(#[from] serde_json::Error),
}

/// Answers free-text questions about a unit's indicators.
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn analyze(
        &self,
        indicators: &[EnrichedIndicator],
        question: Option<&str>,
    ) -> Result<String, AnalystError>;
}

const SYSTEM_INSTRUCTION: &str = "\
Eres un analista experto en datos estadísticos para la Iglesia de Jesucristo de los Santos de los Últimos Días.
Analizas los indicadores de las unidades pertenecientes a los Consejos de Tegucigalpa y Comayagüela en Honduras.
Si el usuario no hace una pregunta específica, proporciona un resumen ejecutivo que destaque:
1. Los logros más significativos (indicadores cerca o sobre la meta).
2. Las áreas que requieren atención urgente (donde el progreso es lento).
3. Una tendencia general de la salud espiritual y administrativa de la unidad.
Si el usuario hace una pregunta, respóndela basándote estrictamente en los datos proporcionados.
Sé amable, motivador y profesional. Responde en formato Markdown claro.";

#[derive(Debug, Serialize)]
struct MonthEntry {
    month: Month,
    value: f64,
}

#[derive(Debug, Serialize)]
struct IndicatorSummary<'a> {
    nombre: &'a str,
    prioridad: &'a str,
    meta: f64,
    tipo: &'a str,
    valores_mensuales: Vec<MonthEntry>,
}

/// Pretty JSON of the indicator data the model is allowed to see.
pub fn summary_payload(indicators: &[EnrichedIndicator]) -> Result<String, AnalystError> {
    let summary: Vec<IndicatorSummary<'_>> = indicators
        .iter()
        .map(|indicator| IndicatorSummary {
            nombre: indicator.template.name,
            prioridad: indicator.template.priority.label(),
            meta: indicator.goal,
            tipo: indicator.template.criteria.label(),
            valores_mensuales: Month::ALL
                .iter()
                .map(|month| MonthEntry {
                    month: *month,
                    value: indicator.value_in(*month),
                })
                .collect(),
        })
        .collect();
    Ok(serde_json::to_string_pretty(&summary)?)
}

pub fn build_prompt(summary: &str, question: Option<&str>) -> String {
    match question.map(str::trim).filter(|q| !q.is_empty()) {
        Some(question) => format!(
            "Basado en estos datos de la unidad: {summary}\n\nResponde la siguiente pregunta: {question}"
        ),
        None => format!(
            "Analiza estos datos de la unidad de los Consejos Tegucigalpa y Comayagüela y dame un resumen ejecutivo: {summary}"
        ),
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.7,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

pub struct GeminiAnalyst {
    config: GeminiConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn response_text(response: GenerateResponse) -> Result<String, AnalystError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(AnalystError::EmptyResponse)
    } else {
        Ok(text)
    }
}

impl GeminiAnalyst {
    pub fn new(config: GeminiConfig) -> Result<Self, AnalystError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

#[async_trait]
impl Analyst for GeminiAnalyst {
    async fn analyze(
        &self,
        indicators: &[EnrichedIndicator],
        question: Option<&str>,
    ) -> Result<String, AnalystError> {
        let prompt = build_prompt(&summary_payload(indicators)?, question);
        let body = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.config.temperature },
        });

        debug!(model = %self.config.model, "requesting analysis");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "analysis request rejected");
            return Err(AnalystError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response_text(response.json::<GenerateResponse>().await?)
    }
}
