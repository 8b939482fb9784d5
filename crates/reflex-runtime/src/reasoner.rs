//! [`ReasonerEngine`] – a [`DecisionEngine`] backed by a remote language
//! model.
//!
//! Each decide phase renders the cycle's [`Context`] into a short state
//! report, sends it with a fixed system instruction, and parses the JSON
//! reply into [`ActionToken`]s. Three backends are supported:
//!
//! | Provider | Endpoint | Auth |
//! |---|---|---|
//! | [`ReasonerProvider::OpenAi`] | `/v1/chat/completions` | `Authorization: Bearer` |
//! | [`ReasonerProvider::Ollama`] | `/v1/chat/completions` (OpenAI-compatible) | none |
//! | [`ReasonerProvider::Anthropic`] | `/v1/messages` | `x-api-key` |
//!
//! The chat-completions request carries the JSON Schema of
//! [`ReasonerReply`] in `response_format` so compliant servers return
//! strictly typed output.
//!
//! The engine never fails a cycle: a missing key, transport error, bad
//! status or malformed reply is logged and yields an empty action list.
//! Requests are bounded by `timeout_secs`.
//!
//! # Example
//!
//! ```rust,no_run
//! use reflex_kernel::DecisionEngine;
//! use reflex_runtime::reasoner::{ReasonerConfig, ReasonerEngine, ReasonerProvider};
//! use reflex_types::Context;
//!
//! let engine = ReasonerEngine::new(ReasonerConfig {
//!     provider: ReasonerProvider::Ollama,
//!     model: "llama3".into(),
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! // Requires a running Ollama instance.
//! let actions = engine.evaluate(&Context::new().with("face_detected", true)).unwrap();
//! ```

use std::fmt;
use std::fmt::Write as _;
use std::time::Duration;

use parking_lot::Mutex;
use reflex_kernel::DecisionEngine;
use reflex_types::{ActionToken, Context, ReflexError};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasonerProvider {
    #[default]
    OpenAi,
    Anthropic,
    Ollama,
}

impl ReasonerProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ReasonerProvider::OpenAi => "https://api.openai.com",
            ReasonerProvider::Anthropic => "https://api.anthropic.com",
            ReasonerProvider::Ollama => "http://localhost:11434",
        }
    }

    fn needs_key(&self) -> bool {
        !matches!(self, ReasonerProvider::Ollama)
    }
}

impl fmt::Display for ReasonerProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReasonerProvider::OpenAi => "openai",
            ReasonerProvider::Anthropic => "anthropic",
            ReasonerProvider::Ollama => "ollama",
        })
    }
}

/// Settings for [`ReasonerEngine`].
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasonerConfig {
    pub provider: ReasonerProvider,
    /// Overrides the provider's default base URL.
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Distance (cm) named in the safety section of the system instruction.
    pub obstacle_threshold: f64,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            provider: ReasonerProvider::OpenAi,
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 10,
            obstacle_threshold: 20.0,
        }
    }
}

impl fmt::Debug for ReasonerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReasonerConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("obstacle_threshold", &self.obstacle_threshold)
            .finish()
    }
}

impl ReasonerConfig {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reply
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReplyPriority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for ReplyPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReplyPriority::High => "high",
            ReplyPriority::Medium => "medium",
            ReplyPriority::Low => "low",
        })
    }
}

/// The JSON object the model is asked to answer with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReasonerReply {
    /// Action names from the vocabulary, in execution order.
    pub actions: Vec<String>,
    /// Short justification for the choice.
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub priority: ReplyPriority,
}

impl ReasonerReply {
    /// Decode the action names, dropping (and warning about) unknown ones.
    pub fn action_tokens(&self) -> Vec<ActionToken> {
        self.actions
            .iter()
            .filter_map(|name| match name.parse::<ActionToken>() {
                Ok(token) => Some(token),
                Err(e) => {
                    warn!(error = %e, "dropping reasoner action");
                    None
                }
            })
            .collect()
    }
}

/// Parse the model's reply text.
///
/// Tolerates a Markdown code fence or prose around the JSON object.
pub fn parse_reply(raw: &str) -> Result<ReasonerReply, ReflexError> {
    let start = raw.find('{');
    let end = raw.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => &raw[s..=e],
        _ => {
            return Err(ReflexError::ReasonerFailed(
                "reply contains no JSON object".to_string(),
            ));
        }
    };
    serde_json::from_str(body)
        .map_err(|e| ReflexError::ReasonerFailed(format!("malformed reply: {e}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompts
// ─────────────────────────────────────────────────────────────────────────────

/// The system instruction: vocabulary, safety rules, behaviour hints and
/// reply shape.
pub fn system_instruction(obstacle_threshold: f64) -> String {
    let mut out = String::from(
        "You are the brain of a small wheeled robot with a camera, a microphone, \
         an ultrasonic range finder and a speaker. Read the sensor report and \
         decide what the robot does next.\n\nAVAILABLE ACTIONS:\n",
    );
    for (name, description) in ActionToken::VOCABULARY {
        let _ = writeln!(out, "- {name}: {description}");
    }
    let _ = write!(
        out,
        "\nSAFETY RULES:\n\
         1. If an obstacle is closer than {obstacle_threshold} cm, ALWAYS stop or avoid it.\n\
         2. Never move forward with an obstacle close ahead.\n\
         3. Safety comes before every other goal.\n\
         \nBEHAVIOUR:\n\
         - React to what the sensors report.\n\
         - If a face is detected, follow it.\n\
         - If the target colour is detected, approach it.\n\
         - If a voice command is heard, carry it out.\n\
         - If nothing interesting is happening, explore.\n\
         - Do not repeat the same action list forever; vary it when nothing changes.\n\
         \nReply ONLY with a JSON object of this shape:\n\
         {{\"actions\": [\"action1\", \"action2\"], \
         \"reasoning\": \"short explanation\", \
         \"priority\": \"high|medium|low\"}}"
    );
    out
}

/// Render `ctx` as the user message: vision, audio, distance, movement and
/// idle facts, then the question.
pub fn describe_context(ctx: &Context, obstacle_threshold: f64) -> String {
    let mut lines = vec!["CURRENT ROBOT STATE:".to_string()];

    if ctx.flag("face_detected") {
        lines.push("- Face detected".to_string());
    }
    if ctx.flag("color_detected") {
        let size = ctx.number("color_size").unwrap_or(0.0);
        lines.push(format!("- Color detected (size: {size})"));
    }
    if ctx.flag("qr_detected") {
        lines.push("- QR code detected".to_string());
    }
    if ctx.flag("gesture_detected") {
        lines.push("- Gesture detected".to_string());
    }
    if ctx.flag("traffic_sign_detected") {
        lines.push("- Traffic sign detected".to_string());
    }

    if ctx.flag("voice_detected") {
        let text = ctx.text("voice_text").unwrap_or_default();
        lines.push(format!("- Voice command: '{text}'"));
    }

    let distance = ctx.number("obstacle_distance").unwrap_or(0.0);
    if distance > 0.0 {
        lines.push(format!("- Distance to obstacle: {distance:.1} cm"));
        if ctx.flag("has_obstacle") {
            lines.push(format!("  OBSTACLE CLOSE (under {obstacle_threshold} cm)"));
        }
    }

    if ctx.flag("is_moving") {
        lines.push("- Robot moving".to_string());
    } else {
        lines.push("- Robot stopped".to_string());
    }

    let idle = ctx.number("idle_time").unwrap_or(0.0);
    if idle > 5.0 {
        lines.push(format!("- No activity for {idle:.1} s"));
    }

    lines.push(String::new());
    lines.push("What should the robot do?".to_string());
    lines.join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct JsonSchemaFormat {
    name: &'static str,
    schema: serde_json::Value,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

fn user(content: &str) -> ChatMessage {
    ChatMessage {
        role: "user".to_string(),
        content: content.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ReasonerEngine
// ─────────────────────────────────────────────────────────────────────────────

pub struct ReasonerEngine {
    config: ReasonerConfig,
    system: String,
    client: reqwest::blocking::Client,
    last_reply: Mutex<Option<ReasonerReply>>,
}

impl ReasonerEngine {
    /// Build the engine and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`ReflexError::Initialization`] if the HTTP client cannot be
    /// built. A missing API key is not an error here; it is reported on
    /// every decision instead.
    pub fn new(config: ReasonerConfig) -> Result<Self, ReflexError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReflexError::init("reasoner", format!("http client: {e}")))?;
        if config.provider.needs_key() && config.api_key.is_none() {
            warn!(provider = %config.provider, "no API key configured; reasoner will return no actions");
        }
        info!(provider = %config.provider, model = %config.model, "reasoner ready");
        Ok(Self {
            system: system_instruction(config.obstacle_threshold),
            config,
            client,
            last_reply: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ReasonerConfig {
        &self.config
    }

    /// The most recent successfully parsed reply.
    pub fn last_reply(&self) -> Option<ReasonerReply> {
        self.last_reply.lock().clone()
    }

    /// Ask the model about `ctx` and parse its reply.
    pub fn consult(&self, ctx: &Context) -> Result<ReasonerReply, ReflexError> {
        let prompt = describe_context(ctx, self.config.obstacle_threshold);
        debug!(%prompt, "consulting reasoner");
        let raw = match self.config.provider {
            ReasonerProvider::OpenAi | ReasonerProvider::Ollama => self.chat_completion(&prompt)?,
            ReasonerProvider::Anthropic => self.messages(&prompt)?,
        };
        let reply = parse_reply(&raw)?;
        info!(
            priority = %reply.priority,
            reasoning = %reply.reasoning,
            actions = ?reply.actions,
            "reasoner decision"
        );
        *self.last_reply.lock() = Some(reply.clone());
        Ok(reply)
    }

    fn api_key(&self) -> Result<Option<&str>, ReflexError> {
        match self.config.api_key.as_deref() {
            Some(key) => Ok(Some(key)),
            None if self.config.provider.needs_key() => Err(ReflexError::ReasonerFailed(
                format!("no API key configured for {}", self.config.provider),
            )),
            None => Ok(None),
        }
    }

    fn chat_completion(&self, prompt: &str) -> Result<String, ReflexError> {
        let key = self.api_key()?;
        let schema = serde_json::to_value(schema_for!(ReasonerReply))
            .map_err(|e| ReflexError::ReasonerFailed(format!("schema: {e}")))?;
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.system.clone(),
                },
                user(prompt),
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: false,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: "reasoner_reply",
                    schema,
                },
            },
        };

        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = key {
            request = request.bearer_auth(key);
        }
        let response: ChatResponse = request
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| ReflexError::ReasonerFailed(format!("{url}: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ReflexError::ReasonerFailed("empty choices array".to_string()))
    }

    fn messages(&self, prompt: &str) -> Result<String, ReflexError> {
        let key = self.api_key()?.unwrap_or_default();
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: &self.system,
            messages: vec![user(prompt)],
        };

        let url = format!("{}/v1/messages", self.config.base_url());
        let response: MessagesResponse = self
            .client
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .map_err(|e| ReflexError::ReasonerFailed(format!("{url}: {e}")))?;

        response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| ReflexError::ReasonerFailed("reply has no text block".to_string()))
    }
}

impl DecisionEngine for ReasonerEngine {
    fn name(&self) -> &str {
        "reasoner"
    }

    fn evaluate(&self, context: &Context) -> Result<Vec<ActionToken>, ReflexError> {
        match self.consult(context) {
            Ok(reply) => Ok(reply.action_tokens()),
            Err(e) => {
                error!(error = %e, "reasoner failed; no actions this cycle");
                Ok(Vec::new())
            }
        }
    }

    fn explain(&self, context: &Context) -> String {
        match self.consult(context) {
            Ok(reply) => format!(
                "Actions: {}\nReasoning: {}\nPriority: {}",
                reply.actions.join(", "),
                reply.reasoning,
                reply.priority
            ),
            Err(e) => format!("reasoner unavailable: {e}"),
        }
    }
}
