//! AI question generation.
//!
//! [`QuestionGenerator`] is the seam for tests and alternative providers;
//! [`GeminiGenerator`] is the production implementation over a Gemini-style
//! `generateContent` HTTP API. Failed calls are reported and never retried
//! automatically; the user re-runs the command.

pub mod prompt;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{GenerationError, Result};
use crate::model::{
    new_id, GenerationSession, GenerationSettings, Question, QuestionBody, SessionEntry,
};
use crate::repo::{QuestionRepo, SessionRepo, UserRepo};
use crate::store::keys::SessionContext;
use crate::store::Store;

/// Minimum source content length; shorter inputs are rejected up front.
pub const MIN_CONTENT_CHARS: usize = 50;

/// Anything that can turn study material into quiz questions.
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(
        &self,
        content: &str,
        settings: &GenerationSettings,
    ) -> Result<Vec<Question>>;
}

// ─── Gemini wire types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 8192,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

/// One question as the model emits it, before validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    question: String,
    #[serde(flatten)]
    body: RawBody,
    #[serde(default)]
    explanation: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum RawBody {
    #[serde(rename_all = "camelCase")]
    MultipleChoice {
        options: Vec<String>,
        correct_index: usize,
    },
    TrueFalse {
        answer: bool,
    },
    Essay,
}

// ─── Gemini client ──────────────────────────────────────────────────

pub struct GeminiGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    source_label: String,
}

impl GeminiGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            source_label: "pasted text".to_string(),
        }
    }

    /// Label recorded as each generated question's source.
    pub fn with_source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = label.into();
        self
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }

    async fn call(&self, prompt: String) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig::default(),
        };

        let response = self
            .client
            .post(self.url())
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Http {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| GenerationError::Empty.into())
    }
}

#[async_trait]
impl QuestionGenerator for GeminiGenerator {
    async fn generate(
        &self,
        content: &str,
        settings: &GenerationSettings,
    ) -> Result<Vec<Question>> {
        check_content(content)?;
        let prompt = prompt::build_prompt(content, settings);
        debug!(model = %self.model, prompt_chars = prompt.len(), "calling generation API");
        let text = self.call(prompt).await?;
        parse_questions(&text, settings, &self.source_label)
    }
}

/// Reject source material too short to generate meaningful questions.
pub fn check_content(content: &str) -> Result<()> {
    let length = content.trim().chars().count();
    if length < MIN_CONTENT_CHARS {
        return Err(GenerationError::InsufficientContent {
            length,
            minimum: MIN_CONTENT_CHARS,
        }
        .into());
    }
    Ok(())
}

/// Strip an optional Markdown code fence from around the model's reply.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop a language tag such as `json` on the opening fence line.
    let inner = match inner.find('\n') {
        Some(pos) => &inner[pos + 1..],
        None => inner,
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Wrapper object shape the model is asked for.
#[derive(Debug, Deserialize)]
struct RawReply {
    questions: Vec<RawQuestion>,
}

/// Parse and validate the model's reply into stored questions.
///
/// Accepts the requested `{ "questions": [...] }` object or, since models
/// sometimes drop the wrapper, a bare array.
fn parse_questions(
    text: &str,
    settings: &GenerationSettings,
    source: &str,
) -> Result<Vec<Question>> {
    let payload = strip_fence(text);
    let raw: Vec<RawQuestion> = match serde_json::from_str::<RawReply>(payload) {
        Ok(reply) => reply.questions,
        Err(_) => serde_json::from_str(payload)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?,
    };

    if raw.is_empty() {
        return Err(GenerationError::Empty.into());
    }

    let mut questions = Vec::with_capacity(raw.len());
    for item in raw {
        let body = match item.body {
            RawBody::MultipleChoice {
                options,
                correct_index,
            } => {
                if correct_index >= options.len() {
                    return Err(GenerationError::MalformedResponse(format!(
                        "correctIndex {} out of range for {} options",
                        correct_index,
                        options.len()
                    ))
                    .into());
                }
                QuestionBody::MultipleChoice {
                    options,
                    correct_index,
                }
            }
            RawBody::TrueFalse { answer } => QuestionBody::TrueFalse { answer },
            RawBody::Essay => QuestionBody::Essay,
        };
        questions.push(
            Question::new(item.question, body, settings.difficulty, source)
                .with_explanation(item.explanation),
        );
    }
    Ok(questions)
}

/// Generates questions and persists them with their generation record.
pub struct GenerationService {
    generator: Box<dyn QuestionGenerator>,
    questions: QuestionRepo,
    sessions: SessionRepo,
    users: UserRepo,
}

impl GenerationService {
    pub fn new(store: Store, generator: Box<dyn QuestionGenerator>) -> Self {
        Self {
            generator,
            questions: QuestionRepo::new(store.clone()),
            sessions: SessionRepo::new(store.clone()),
            users: UserRepo::new(store),
        }
    }

    /// Generate questions from `content` and persist them for the active
    /// user, along with a generation-session history record.
    pub async fn generate_and_save(
        &self,
        ctx: &SessionContext,
        content: &str,
        source: &str,
        settings: &GenerationSettings,
    ) -> Result<Vec<Question>> {
        let questions = self.generator.generate(content, settings).await?;

        self.questions.bulk_append(ctx, &questions)?;
        let session = GenerationSession {
            id: new_id(),
            timestamp: Utc::now(),
            source: source.to_string(),
            settings: settings.clone(),
            question_count: questions.len(),
            question_ids: questions.iter().map(|q| q.id.clone()).collect(),
        };
        self.sessions
            .append(ctx, &SessionEntry::Generation(session))?;

        if let Some(user_id) = ctx.user_id() {
            if let Some(mut user) = self.users.get_by_id(user_id)? {
                user.stats.questions_generated += questions.len() as u64;
                user.stats.documents_processed += 1;
                self.users.upsert(&user)?;
            }
        }

        info!(count = questions.len(), source, "generated questions");
        Ok(questions)
    }
}
