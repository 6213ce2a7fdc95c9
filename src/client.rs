//! The caller-facing client.
//!
//! A [`Client`] ties together a provider registry, an HTTP client, a
//! credential store, and the standard pipeline. Models are addressed as
//! `"provider:model"`, e.g. `"openai:gpt-4o"`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::assembler::OBJECT_TOOL_NAME;
use crate::auth::{CredentialStore, EnvCredentialStore};
use crate::error::ClientError;
use crate::options::{OptionMap, PASSTHROUGH_KEY};
use crate::pipeline::{Pipeline, RequestCarrier, StepContext};
use crate::registry::{self, ProviderRegistry};
use crate::streaming::StreamResponse;
use crate::types::{
    ChunkStream, Context, EmbeddingResponse, Message, ModelDescriptor, Operation, Response,
};

/// Provider-agnostic LLM client.
pub struct Client {
    registry: Arc<ProviderRegistry>,
    http: reqwest::Client,
    credentials: Arc<dyn CredentialStore>,
    global_defaults: OptionMap,
    base_urls: HashMap<String, String>,
    pipeline: Pipeline,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// A client with the process-wide registry and environment credentials.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// The registry this client resolves providers against.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Parse a `"provider:model"` reference and resolve it.
    fn resolve(
        &self,
        model_ref: &str,
    ) -> Result<(Arc<dyn crate::adapter::ProviderAdapter>, ModelDescriptor), ClientError> {
        let (provider_id, model_name) = model_ref.split_once(':').ok_or_else(|| {
            ClientError::ConfigurationError(format!(
                "model reference '{model_ref}' must have the form 'provider:model'"
            ))
        })?;
        let adapter = self.registry.get_adapter(provider_id)?;
        let model = self.registry.get_model(provider_id, model_name)?;
        Ok((adapter, model))
    }

    fn step_context(&self, adapter: Arc<dyn crate::adapter::ProviderAdapter>) -> StepContext {
        let base_url = self.base_urls.get(adapter.provider_id()).cloned();
        StepContext {
            http: self.http.clone(),
            adapter,
            credentials: self.credentials.clone(),
            base_url,
            global_defaults: self.global_defaults.clone(),
        }
    }

    async fn run(
        &self,
        operation: Operation,
        model_ref: &str,
        context: Context,
        options: OptionMap,
        streaming: bool,
    ) -> Result<RequestCarrier, ClientError> {
        let (adapter, model) = self.resolve(model_ref)?;
        debug!(%operation, model = %model.name, provider = %model.provider_id, streaming, "dispatching call");
        let carrier = RequestCarrier::new(operation, model, context, options, streaming);
        let ctx = self.step_context(adapter);
        Ok(self.pipeline.execute(&ctx, carrier).await?)
    }

    /// Buffered chat completion.
    pub async fn generate_text(
        &self,
        model_ref: &str,
        context: Context,
        options: OptionMap,
    ) -> Result<Response, ClientError> {
        let carrier = self
            .run(Operation::Chat, model_ref, context, options, false)
            .await?;
        carrier
            .response
            .ok_or_else(|| ClientError::InternalError("pipeline produced no response".into()))
    }

    /// One-shot prompt convenience over [`Client::generate_text`].
    pub async fn generate_text_value(
        &self,
        model_ref: &str,
        prompt: &str,
    ) -> Result<String, ClientError> {
        let response = self
            .generate_text(
                model_ref,
                Context::new().with(Message::user(prompt)),
                OptionMap::new(),
            )
            .await?;
        Ok(response.text().unwrap_or_default())
    }

    /// Streaming chat completion. The returned handle carries the chunk
    /// sequence, a cancellation lever, and the out-of-band metadata.
    pub async fn stream_text(
        &self,
        model_ref: &str,
        context: Context,
        options: OptionMap,
    ) -> Result<StreamResponse, ClientError> {
        let mut carrier = self
            .run(Operation::Chat, model_ref, context, options, true)
            .await?;
        carrier
            .stream
            .take()
            .ok_or_else(|| ClientError::InternalError("pipeline produced no stream".into()))
    }

    /// Streaming chat completion as a plain chunk stream, discarding the
    /// metadata handle.
    pub async fn stream_text_chunks(
        &self,
        model_ref: &str,
        context: Context,
        options: OptionMap,
    ) -> Result<ChunkStream, ClientError> {
        let response = self.stream_text(model_ref, context, options).await?;
        let (chunks, _metadata, _cancel) = response.split();
        Ok(chunks)
    }

    /// Schema-constrained generation. The schema rides as a forced tool
    /// call; the assembled response carries the parsed object when the model
    /// honored it.
    pub async fn generate_object(
        &self,
        model_ref: &str,
        context: Context,
        schema: Value,
        mut options: OptionMap,
    ) -> Result<Response, ClientError> {
        attach_object_tool(&mut options, schema)?;
        let carrier = self
            .run(Operation::Object, model_ref, context, options, false)
            .await?;
        carrier
            .response
            .ok_or_else(|| ClientError::InternalError("pipeline produced no response".into()))
    }

    /// Embedding computation over a batch of inputs.
    pub async fn generate_embedding(
        &self,
        model_ref: &str,
        inputs: Vec<String>,
        options: OptionMap,
    ) -> Result<EmbeddingResponse, ClientError> {
        let context: Context = inputs.into_iter().map(Message::user).collect();
        let carrier = self
            .run(Operation::Embedding, model_ref, context, options, false)
            .await?;
        carrier
            .embedding
            .ok_or_else(|| ClientError::InternalError("pipeline produced no embedding".into()))
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Force the structured-output tool into the provider passthrough bucket,
/// merging with any passthrough the caller already supplied.
fn attach_object_tool(options: &mut OptionMap, schema: Value) -> Result<(), ClientError> {
    let passthrough = options
        .entry(PASSTHROUGH_KEY.to_string())
        .or_insert_with(|| Value::Object(Default::default()));
    let Value::Object(passthrough) = passthrough else {
        return Err(ClientError::InvalidOption(format!(
            "'{PASSTHROUGH_KEY}' must be an object"
        )));
    };
    passthrough.insert(
        "tools".into(),
        json!([{
            "type": "function",
            "function": {
                "name": OBJECT_TOOL_NAME,
                "description": "Emit the requested structured object.",
                "parameters": schema,
            },
        }]),
    );
    passthrough.insert(
        "tool_choice".into(),
        json!({ "type": "function", "function": { "name": OBJECT_TOOL_NAME } }),
    );
    Ok(())
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    registry: Option<Arc<ProviderRegistry>>,
    http: Option<reqwest::Client>,
    credentials: Option<Arc<dyn CredentialStore>>,
    global_defaults: OptionMap,
    base_urls: HashMap<String, String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            registry: None,
            http: None,
            credentials: None,
            global_defaults: OptionMap::new(),
            base_urls: HashMap::new(),
        }
    }
}

impl ClientBuilder {
    /// Use a specific registry instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// A client-wide option default, lowest merge precedence.
    pub fn default_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.global_defaults.insert(key.into(), value);
        self
    }

    /// Override a provider's base URL, e.g. for a proxy or a test server.
    pub fn base_url(mut self, provider_id: impl Into<String>, url: impl Into<String>) -> Self {
        self.base_urls.insert(provider_id.into(), url.into());
        self
    }

    pub fn build(self) -> Client {
        Client {
            registry: self.registry.unwrap_or_else(registry::global),
            http: self.http.unwrap_or_default(),
            credentials: self
                .credentials
                .unwrap_or_else(|| Arc::new(EnvCredentialStore)),
            global_defaults: self.global_defaults,
            base_urls: self.base_urls,
            pipeline: Pipeline::standard(),
        }
    }
}
