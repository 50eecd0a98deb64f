//! src/llm/copilot.rs

use super::catalog::{AgentCatalog, AgentsResponse, CatalogCache, ModelCatalog, ModelsResponse};
use super::http::{self, Headers};
use super::request::{CompletionResponse, Conversation, RequestBuilder};
use super::session::SessionManager;
use super::LLMClient;
use crate::auth::{CredentialStore, LongLivedCredential};
use crate::config::{Config, Paths};
use crate::errors::{Error, Result};
use rand::Rng;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const MODELS_PATH: &str = "models";
const AGENTS_PATH: &str = "agents";
const COMPLETIONS_PATH: &str = "chat/completions";

const STEP_MODELS: &str = "fetch models";
const STEP_AGENTS: &str = "fetch agents";
const STEP_COMPLETION: &str = "chat completion";

const MACHINE_ID_LEN: usize = 65;

pub const COPILOT_INSTRUCTIONS: &str = r#"
You are an AI programming assistant.
When asked for your name, you must respond with "GitHub Copilot".
Follow the user's requirements carefully & to the letter.
You are an expert at reading code changes and describing them for other developers.
Keep your answers short and impersonal.
Avoid wrapping the whole response in triple backticks.
"#;

/// Random hex string identifying this client installation to the service.
pub fn generate_machine_id() -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..MACHINE_ID_LEN)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}

/// Talks to the Copilot chat API on behalf of one CLI invocation.
pub struct CopilotClient {
    http: Client,
    config: Config,
    credential: Option<LongLivedCredential>,
    session: SessionManager,
    catalog: CatalogCache,
    machine_id: String,
}

impl CopilotClient {
    /// Builds a client from the on-disk caches. Nothing is fetched yet.
    pub async fn new(config: Config, paths: &Paths) -> Result<Self> {
        let credential = CredentialStore::new(paths).load().await;
        let session = SessionManager::load(paths.token_file()).await;
        let catalog = CatalogCache::load(paths.models_file(), paths.agents_file()).await;
        Ok(Self::with_parts(
            http::build_client()?,
            config,
            credential,
            session,
            catalog,
        ))
    }

    pub fn with_parts(
        http: Client,
        config: Config,
        credential: Option<LongLivedCredential>,
        session: SessionManager,
        catalog: CatalogCache,
    ) -> Self {
        Self {
            http,
            config,
            credential,
            session,
            catalog,
            machine_id: generate_machine_id(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Authenticates (refreshing the session token if needed) and returns the
    /// headers every Copilot API call carries.
    async fn request_headers(&mut self, cancel: &CancellationToken) -> Result<Headers> {
        let token = self
            .session
            .ensure_valid(
                &self.http,
                &self.config.endpoints,
                cancel,
                self.credential.as_ref(),
            )
            .await?;
        let authorization = format!("Bearer {}", token.token);
        let session_id = self.session.session_id().to_string();

        Ok(vec![
            ("authorization", authorization),
            ("x-request-id", Uuid::new_v4().to_string()),
            ("vscode-sessionid", session_id),
            ("vscode-machineid", self.machine_id.clone()),
            ("copilot-integration-id", "vscode-chat".to_string()),
            ("openai-organization", "github-copilot".to_string()),
            ("openai-intent", "conversation-panel".to_string()),
        ])
    }

    async fn get(&mut self, step: &'static str, path: &str, cancel: &CancellationToken) -> Result<String> {
        let headers = self.request_headers(cancel).await?;
        let url = self.config.endpoints.copilot_api_url(path);
        let request = http::with_headers(self.http.get(url), &headers);
        http::send(step, cancel, request).await
    }

    /// Model catalog. Served from memory or disk when present, fetched once otherwise.
    pub async fn models(&mut self, cancel: &CancellationToken) -> Result<&ModelCatalog> {
        if self.catalog.has_models() {
            return Ok(self.catalog.models());
        }

        log::debug!("Model catalog empty, fetching it");
        let body = self.get(STEP_MODELS, MODELS_PATH, cancel).await?;
        let response: ModelsResponse = http::decode(STEP_MODELS, &body)?;
        self.catalog.populate_models(response.data).await
    }

    /// Agent catalog, same caching rules as [`CopilotClient::models`].
    pub async fn agents(&mut self, cancel: &CancellationToken) -> Result<&AgentCatalog> {
        if self.catalog.has_agents() {
            return Ok(self.catalog.agents());
        }

        log::debug!("Agent catalog empty, fetching it");
        let body = self.get(STEP_AGENTS, AGENTS_PATH, cancel).await?;
        let response: AgentsResponse = http::decode(STEP_AGENTS, &body)?;
        self.catalog.populate_agents(response.agents).await
    }

    /// Sends `prompt` after the turns in `history` and returns the reply.
    ///
    /// On success the prompt and reply are appended to `history`; on failure it
    /// is left untouched.
    pub async fn ask(
        &mut self,
        cancel: &CancellationToken,
        prompt: &str,
        history: &mut Conversation,
    ) -> Result<String> {
        let prompt = prompt.trim();
        if !history.is_empty() {
            log::debug!("Continuing a conversation of {} turns", history.len());
        }
        let model_id = self.config.model.clone();
        let temperature = self.config.temperature;

        let request = {
            let models = self.models(cancel).await?;
            let model = models
                .get(&model_id)
                .ok_or_else(|| Error::ModelUnavailable(model_id.clone()))?;
            RequestBuilder::new(model)
                .preamble(COPILOT_INSTRUCTIONS)
                .temperature(temperature)
                .build(history, prompt)
        };

        let headers = self.request_headers(cancel).await?;
        log::debug!(
            "Sending {} messages to {}",
            request.messages.len(),
            request.model
        );

        let url = self.config.endpoints.copilot_api_url(COMPLETIONS_PATH);
        let builder = http::with_headers(self.http.post(url).json(&request), &headers);
        let body = http::send(STEP_COMPLETION, cancel, builder).await?;
        let response: CompletionResponse = http::decode(STEP_COMPLETION, &body)?;

        if let Some(usage) = &response.usage {
            log::debug!(
                "Token usage: prompt={} completion={} total={}",
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }

        let reply = response
            .reply()
            .map(str::to_string)
            .ok_or(Error::EmptyResult(STEP_COMPLETION))?;

        history.record_exchange(prompt, &reply);
        Ok(reply)
    }
}

#[async_trait::async_trait]
impl LLMClient for CopilotClient {
    fn name(&self) -> &str {
        "GitHub Copilot"
    }

    async fn ask(
        &mut self,
        cancel: &CancellationToken,
        prompt: &str,
        history: &mut Conversation,
    ) -> Result<String> {
        CopilotClient::ask(self, cancel, prompt, history).await
    }
}
