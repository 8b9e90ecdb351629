//! # Nutrition Recommendation Module
//!
//! Static goal-based advice, and generated advice from a Gemini-style
//! `generateContent` API. The HTTP client retries transient failures with
//! exponential backoff and jitter, behind a [`CircuitBreaker`].

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::collaborators::RecommendationProvider;
use crate::config::{AiConfig, RecoveryConfig};
use crate::errors::IncompleteProfileError;
use crate::formulas::{compute_report, CalorieReport};
use crate::localization::{Language, Localizer};
use crate::profile::{Field, PhysicalProfile, ProfileDraft};
use crate::report::format_field_value;

/// Time span a generated plan should cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecommendationPeriod {
    Day,
    Week,
}

impl RecommendationPeriod {
    pub const ALL: [RecommendationPeriod; 2] = [RecommendationPeriod::Day, RecommendationPeriod::Week];

    pub fn key(&self) -> &'static str {
        match self {
            RecommendationPeriod::Day => "day",
            RecommendationPeriod::Week => "week",
        }
    }

    /// Callback data of the period keyboard
    pub fn signal(&self) -> String {
        format!("AI_REC_{}", self.key())
    }

    pub fn from_signal(signal: &str) -> Option<Self> {
        let key = signal.strip_prefix("AI_REC_")?;
        Self::ALL.into_iter().find(|period| period.key() == key)
    }
}

/// Errors surfaced to the user when asking for a recommendation
#[derive(Debug)]
pub enum RecommendationError {
    /// Profile lacks fields the recommendation needs
    IncompleteProfile(IncompleteProfileError),
    /// The user asked again too soon
    CoolingDown { remaining_secs: u64 },
    /// No API credentials configured
    NotConfigured,
    /// Upstream failed repeatedly, requests are paused
    CircuitOpen,
    /// Upstream answered without any text
    EmptyResponse,
    /// Request failed after retries
    Api(String),
}

impl fmt::Display for RecommendationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendationError::IncompleteProfile(err) => write!(f, "{err}"),
            RecommendationError::CoolingDown { remaining_secs } => {
                write!(f, "Recommendation cooldown active, {remaining_secs}s remaining")
            }
            RecommendationError::NotConfigured => write!(f, "Recommendation API is not configured"),
            RecommendationError::CircuitOpen => write!(f, "Recommendation API circuit is open"),
            RecommendationError::EmptyResponse => write!(f, "Recommendation API returned no text"),
            RecommendationError::Api(msg) => write!(f, "Recommendation API error: {msg}"),
        }
    }
}

impl std::error::Error for RecommendationError {}

impl From<IncompleteProfileError> for RecommendationError {
    fn from(err: IncompleteProfileError) -> Self {
        RecommendationError::IncompleteProfile(err)
    }
}

impl RecommendationError {
    /// Localized message key shown to the user
    pub fn message_key(&self) -> &'static str {
        match self {
            RecommendationError::IncompleteProfile(_) => "error-profile-not-complete",
            RecommendationError::CoolingDown { .. } => "error-recommendation-cooldown",
            RecommendationError::NotConfigured => "error-ai-disabled",
            RecommendationError::CircuitOpen | RecommendationError::Api(_) => "error-ai-communication",
            RecommendationError::EmptyResponse => "error-ai-generation-failed",
        }
    }
}

/// Goal-specific advice that needs no API call
pub fn static_recommendation(
    draft: &ProfileDraft,
    language: Language,
    localizer: &dyn Localizer,
) -> Result<String, IncompleteProfileError> {
    let goal = draft.main_goal.ok_or(IncompleteProfileError {
        missing: vec![Field::MainGoal],
    })?;
    Ok(localizer.message(&format!("recommendation-static-{}", goal.key()), language))
}

/// Per-user cooldown and completeness checks in front of a [`RecommendationProvider`]
pub struct RecommendationService {
    provider: Option<Arc<dyn RecommendationProvider>>,
    cooldown: Duration,
    last_request: Mutex<HashMap<i64, Instant>>,
}

impl RecommendationService {
    pub fn new(provider: Option<Arc<dyn RecommendationProvider>>, cooldown: Duration) -> Self {
        Self {
            provider,
            cooldown,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Ask the provider for a plan; the cooldown starts when the request is accepted
    pub async fn recommend(
        &self,
        chat_id: i64,
        draft: &ProfileDraft,
        period: RecommendationPeriod,
        language: Language,
    ) -> Result<String, RecommendationError> {
        let provider = self.provider.as_ref().ok_or(RecommendationError::NotConfigured)?;

        let profile = self.accept_request(chat_id, draft)?;
        let report = compute_report(&profile);
        info!(user_id = %chat_id, period = period.key(), "Requesting AI recommendation");

        provider
            .recommend(&profile, &report, period, language)
            .await
            .map_err(|e| match e.downcast_ref::<GeminiError>() {
                Some(GeminiError::CircuitOpen) => RecommendationError::CircuitOpen,
                Some(GeminiError::EmptyResponse) => RecommendationError::EmptyResponse,
                _ => RecommendationError::Api(e.to_string()),
            })
    }

    /// Cooldown check and insert happen under one lock
    fn accept_request(&self, chat_id: i64, draft: &ProfileDraft) -> Result<PhysicalProfile, RecommendationError> {
        let mut last_request = self.last_request.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(last) = last_request.get(&chat_id) {
            let elapsed = last.elapsed();
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                return Err(RecommendationError::CoolingDown {
                    remaining_secs: remaining.as_secs_f64().ceil() as u64,
                });
            }
        }

        let profile = PhysicalProfile::try_from(draft)?;
        last_request.insert(chat_id, Instant::now());
        Ok(profile)
    }
}

/// Build the localized prompt sent to the generative API
pub fn build_prompt(
    profile: &PhysicalProfile,
    report: &CalorieReport,
    period: RecommendationPeriod,
    language: Language,
    localizer: &dyn Localizer,
) -> String {
    let period_text = localizer.message(&format!("ai-period-{}", period.key()), language);
    let goal_text = localizer.message(&format!("goal-{}", profile.main_goal.key()), language);
    let draft = ProfileDraft::from(*profile);

    let mut prompt = localizer.message_with_args("ai-prompt-request", language, &[("period", period_text.as_str())]);
    prompt.push_str("\n\n");

    prompt.push_str(&localizer.message("ai-prompt-calories-intro", language));
    prompt.push('\n');
    for (method, kcal) in report.entries() {
        prompt.push_str(&format!("- {}: {kcal:.2} kcal\n", localizer.method_name(method, language)));
    }
    prompt.push('\n');

    prompt.push_str(&localizer.message("ai-prompt-profile-intro", language));
    prompt.push('\n');
    for field in Field::SEQUENCE {
        // Zero body fat means "unknown" to most users, leave it out
        if field == Field::BodyFat && profile.body_fat_percent <= 0.0 {
            continue;
        }
        if let Some(value) = format_field_value(&draft, field, language, localizer) {
            prompt.push_str(&format!("{}: {value}\n", localizer.field_label(field, language)));
        }
    }
    prompt.push('\n');

    prompt.push_str(&localizer.message_with_args(
        "ai-prompt-task",
        language,
        &[("period", period_text.as_str()), ("goal", goal_text.as_str())],
    ));
    prompt.push_str("\n\n");
    prompt.push_str(&localizer.message("ai-prompt-format", language));
    prompt
}

/// `generateContent` request body for a single user turn
pub fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [{ "text": prompt }]
            }
        ]
    })
}

/// Text of the first candidate, `None` when missing or blank
pub fn extract_text(response: &Value) -> Option<String> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Delay before retry `attempt` (1-based): exponential, capped, with up to 10% jitter
pub fn calculate_retry_delay(attempt: u32, config: &RecoveryConfig) -> u64 {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = config
        .base_retry_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(config.max_retry_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=base / 10);
    base + jitter
}

/// Failure kinds of the HTTP client
#[derive(Debug)]
pub enum GeminiError {
    CircuitOpen,
    /// Network error, timeout, 429 or 5xx; worth retrying
    Transient(String),
    /// Any other 4xx or an unreadable body
    Permanent(String),
    EmptyResponse,
}

impl fmt::Display for GeminiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeminiError::CircuitOpen => write!(f, "Circuit breaker is open"),
            GeminiError::Transient(msg) => write!(f, "Transient API failure: {msg}"),
            GeminiError::Permanent(msg) => write!(f, "API request rejected: {msg}"),
            GeminiError::EmptyResponse => write!(f, "API response contained no text"),
        }
    }
}

impl std::error::Error for GeminiError {}

/// HTTP client for a Gemini-style `generateContent` endpoint
pub struct GeminiClient {
    http: reqwest::Client,
    config: AiConfig,
    breaker: CircuitBreaker,
    localizer: Arc<dyn Localizer>,
}

impl GeminiClient {
    pub fn new(config: AiConfig, localizer: Arc<dyn Localizer>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.recovery.operation_timeout_secs))
            .build()?;
        let breaker = CircuitBreaker::new(config.recovery.clone());
        Ok(Self {
            http,
            config,
            breaker,
            localizer,
        })
    }

    async fn post_once(&self, body: &Value) -> Result<Value, GeminiError> {
        let response = self
            .http
            .post(&self.config.api_url)
            .header("X-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GeminiError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeminiError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GeminiError::Permanent(format!("HTTP {status}: {text}")));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GeminiError::Permanent(format!("Invalid JSON response: {e}")))
    }

    async fn generate(&self, prompt: &str) -> Result<String, GeminiError> {
        if self.breaker.is_open() {
            warn!("Recommendation API circuit is open, failing fast");
            return Err(GeminiError::CircuitOpen);
        }

        let body = request_body(prompt);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.post_once(&body).await {
                Ok(response) => {
                    self.breaker.record_success();
                    return extract_text(&response).ok_or_else(|| {
                        error!(response = %response, "Response did not contain candidate text");
                        GeminiError::EmptyResponse
                    });
                }
                Err(GeminiError::Transient(msg)) if attempt <= self.config.recovery.max_retries => {
                    let delay = calculate_retry_delay(attempt, &self.config.recovery);
                    warn!(attempt, delay_ms = delay, error = %msg, "Transient API failure, retrying");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => {
                    self.breaker.record_failure();
                    error!(attempt, error = %e, "Recommendation request failed");
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl RecommendationProvider for GeminiClient {
    async fn recommend(
        &self,
        profile: &PhysicalProfile,
        report: &CalorieReport,
        period: RecommendationPeriod,
        language: Language,
    ) -> Result<String> {
        let prompt = build_prompt(profile, report, period, language, self.localizer.as_ref());
        debug!(prompt_length = prompt.len(), "Built recommendation prompt");
        Ok(self.generate(&prompt).await?)
    }
}
