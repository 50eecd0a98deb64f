//! src/llm/request.rs

use super::catalog::ModelDescriptor;
use serde::{Deserialize, Serialize};

/// Model ids with this prefix belong to the reasoning family.
pub const REASONING_PREFIX: &str = "o1";

// --- 数据结构定义 ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Turns exchanged with the model during one invocation. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Appends a completed exchange: the prompt, then the reply.
    pub fn record_exchange(&mut self, prompt: &str, reply: &str) {
        self.turns.push(ChatMessage::user(prompt));
        self.turns.push(ChatMessage::assistant(reply));
    }
}

impl From<Vec<ChatMessage>> for Conversation {
    fn from(turns: Vec<ChatMessage>) -> Self {
        Self { turns }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Standard,
    /// Rejects system messages and sampling parameters.
    Reasoning,
}

impl ModelFamily {
    pub fn of(model_id: &str) -> Self {
        if model_id.starts_with(REASONING_PREFIX) {
            ModelFamily::Reasoning
        } else {
            ModelFamily::Standard
        }
    }

    pub fn preamble_role(self) -> Role {
        match self {
            ModelFamily::Standard => Role::System,
            ModelFamily::Reasoning => Role::User,
        }
    }

    pub fn accepts_sampling(self) -> bool {
        matches!(self, ModelFamily::Standard)
    }
}

/// Body of `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub stream: bool,
    pub n: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// Produces a [`ChatRequest`] whose fields follow the rules of the model family.
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    model_id: &'a str,
    family: ModelFamily,
    max_output_tokens: u64,
    preamble: Option<&'a str>,
    temperature: f64,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(model: &'a ModelDescriptor) -> Self {
        Self::for_model(&model.id, model.capabilities.limits.max_output_tokens)
    }

    pub fn for_model(model_id: &'a str, max_output_tokens: u64) -> Self {
        Self {
            model_id,
            family: ModelFamily::of(model_id),
            max_output_tokens,
            preamble: None,
            temperature: 0.1,
        }
    }

    pub fn preamble(mut self, text: &'a str) -> Self {
        let text = text.trim();
        self.preamble = (!text.is_empty()).then_some(text);
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// `[preamble?] ++ history ++ [user: prompt]`.
    pub fn messages(&self, history: &[ChatMessage], prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(preamble) = self.preamble {
            messages.push(ChatMessage::new(self.family.preamble_role(), preamble));
        }
        messages.extend_from_slice(history);
        if !prompt.is_empty() {
            messages.push(ChatMessage::user(prompt));
        }
        messages
    }

    pub fn build(&self, history: &Conversation, prompt: &str) -> ChatRequest {
        let sampling = self.family.accepts_sampling();
        ChatRequest {
            messages: self.messages(history.turns(), prompt),
            model: self.model_id.to_string(),
            stream: false,
            n: 1,
            max_tokens: (self.max_output_tokens > 0).then_some(self.max_output_tokens),
            temperature: sampling.then_some(self.temperature),
            top_p: sampling.then_some(1.0),
        }
    }
}

// --- 响应结构 ---

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl CompletionResponse {
    /// Content of the top choice, if it has any text.
    pub fn reply(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
            .filter(|content| !content.trim().is_empty())
    }
}
