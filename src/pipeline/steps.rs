//! The standard pipeline steps, in execution order.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::debug;

use crate::assembler;
use crate::error::ClientError;
use crate::options;
use crate::streaming::spawn_producer;
use crate::types::Operation;

use super::carrier::RequestCarrier;
use super::{PipelineStep, StepContext};

/// Resolves endpoint, method, and timeout from the adapter's request plan.
pub(super) struct PlanStep;

#[async_trait]
impl PipelineStep for PlanStep {
    fn name(&self) -> &'static str {
        "plan"
    }

    async fn run(
        &self,
        ctx: &StepContext,
        carrier: &mut RequestCarrier,
    ) -> Result<(), ClientError> {
        let plan = ctx
            .adapter
            .prepare_request(carrier.operation, &carrier.model)?;
        let base = ctx
            .base_url
            .as_deref()
            .unwrap_or_else(|| ctx.adapter.default_base_url());
        carrier.url = format!("{}{}", base.trim_end_matches('/'), plan.path);
        carrier.method = plan.method;
        carrier.timeout = plan.timeout;
        Ok(())
    }
}

/// Runs option preparation: validation, defaults, translation.
pub(super) struct OptionsStep;

#[async_trait]
impl PipelineStep for OptionsStep {
    fn name(&self) -> &'static str {
        "options"
    }

    async fn run(
        &self,
        ctx: &StepContext,
        carrier: &mut RequestCarrier,
    ) -> Result<(), ClientError> {
        let user = std::mem::take(&mut carrier.user_options);
        let prepared = options::prepare(
            ctx.adapter.as_ref(),
            carrier.operation,
            &carrier.model,
            user,
            &ctx.global_defaults,
        )?;
        for warning in &prepared.warnings {
            debug!(
                request_id = %carrier.request_id,
                key = %warning.key,
                "{}", warning.message
            );
        }
        carrier.prepared = Some(prepared);
        Ok(())
    }
}

/// Attaches the bearer token. Missing credentials fail here, before any
/// network I/O.
pub(super) struct AuthStep;

#[async_trait]
impl PipelineStep for AuthStep {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn run(
        &self,
        ctx: &StepContext,
        carrier: &mut RequestCarrier,
    ) -> Result<(), ClientError> {
        let provider_id = ctx.adapter.provider_id();
        let key = ctx
            .credentials
            .get(provider_id)
            .ok_or_else(|| ClientError::MissingCredentials(provider_id.to_string()))?;
        let mut value = HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
            .map_err(|_| {
                ClientError::ConfigurationError(format!(
                    "credential for '{provider_id}' contains non-header characters"
                ))
            })?;
        value.set_sensitive(true);
        carrier.headers.insert(AUTHORIZATION, value);
        carrier
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(())
    }
}

/// Serializes the request body via the adapter.
pub(super) struct EncodeStep;

#[async_trait]
impl PipelineStep for EncodeStep {
    fn name(&self) -> &'static str {
        "encode"
    }

    async fn run(
        &self,
        ctx: &StepContext,
        carrier: &mut RequestCarrier,
    ) -> Result<(), ClientError> {
        let prepared = carrier
            .prepared
            .as_ref()
            .ok_or_else(|| ClientError::InternalError("encode ran before options".into()))?;
        carrier.body = Some(ctx.adapter.encode_body(
            carrier.operation,
            &carrier.context,
            prepared,
            carrier.streaming,
        )?);
        Ok(())
    }
}

/// Sends the request. Buffered calls land the parsed body on the carrier;
/// streaming calls spawn the producer and land the stream handle instead.
pub(super) struct DispatchStep;

#[async_trait]
impl PipelineStep for DispatchStep {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    async fn run(
        &self,
        ctx: &StepContext,
        carrier: &mut RequestCarrier,
    ) -> Result<(), ClientError> {
        let body = carrier
            .body
            .as_ref()
            .ok_or_else(|| ClientError::InternalError("dispatch ran before encode".into()))?;
        let mut request = ctx
            .http
            .request(carrier.method.clone(), &carrier.url)
            .headers(carrier.headers.clone())
            .json(body);
        if let Some(timeout) = carrier.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        carrier.http_status = Some(status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::api_error(
                status.as_u16(),
                extract_api_message(&body)
                    .unwrap_or_else(|| format!("provider returned HTTP {status}")),
                body,
            ));
        }

        if carrier.streaming {
            let bytes = response.bytes_stream().map_err(ClientError::from);
            carrier.stream = Some(spawn_producer(
                bytes,
                ctx.adapter.clone(),
                carrier.model.clone(),
            ));
        } else {
            carrier.raw_body = Some(response.json::<Value>().await?);
        }
        Ok(())
    }
}

/// Pulls a structured message out of a provider error body when there is one.
fn extract_api_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(String::from)
}

/// Decodes the buffered body and assembles the canonical response. A no-op
/// for streaming calls, whose decoding lives in the producer.
pub(super) struct DecodeStep;

#[async_trait]
impl PipelineStep for DecodeStep {
    fn name(&self) -> &'static str {
        "decode"
    }

    async fn run(
        &self,
        ctx: &StepContext,
        carrier: &mut RequestCarrier,
    ) -> Result<(), ClientError> {
        if carrier.streaming {
            return Ok(());
        }
        let raw = carrier
            .raw_body
            .as_ref()
            .ok_or_else(|| ClientError::InternalError("decode ran before dispatch".into()))?;
        match carrier.operation {
            Operation::Embedding => {
                carrier.embedding = Some(ctx.adapter.decode_embedding(raw, &carrier.model)?);
            }
            Operation::Chat | Operation::Object => {
                let input = ctx.adapter.decode_response(raw, &carrier.model)?;
                carrier.response = Some(assembler::assemble(
                    ctx.adapter.as_ref(),
                    input,
                    carrier.context.clone(),
                    &carrier.model,
                    carrier.operation == Operation::Object,
                ));
            }
        }
        Ok(())
    }
}
