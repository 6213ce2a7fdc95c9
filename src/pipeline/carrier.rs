//! The mutable state threaded through the pipeline.

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::options::{OptionMap, PreparedOptions};
use crate::streaming::StreamResponse;
use crate::types::{Context, EmbeddingResponse, ModelDescriptor, Operation, Response};

/// Everything one request accumulates as it moves through the steps.
///
/// Steps only ever add to the carrier; a step failure hands the carrier back
/// intact so the caller can inspect how far the request got.
#[derive(Debug)]
pub struct RequestCarrier {
    pub request_id: String,
    pub operation: Operation,
    pub model: ModelDescriptor,
    pub context: Context,
    pub streaming: bool,

    /// Caller-supplied options, consumed by the options step.
    pub user_options: OptionMap,
    pub prepared: Option<PreparedOptions>,

    pub method: Method,
    pub url: String,
    pub timeout: Option<Duration>,
    pub headers: HeaderMap,
    pub body: Option<Value>,

    pub http_status: Option<u16>,
    pub raw_body: Option<Value>,

    pub stream: Option<StreamResponse>,
    pub response: Option<Response>,
    pub embedding: Option<EmbeddingResponse>,

    /// Names of the steps that ran, in order.
    pub trace: Vec<&'static str>,
}

impl RequestCarrier {
    pub fn new(
        operation: Operation,
        model: ModelDescriptor,
        context: Context,
        user_options: OptionMap,
        streaming: bool,
    ) -> Self {
        Self {
            request_id: format!("req-{}", Uuid::new_v4()),
            operation,
            model,
            context,
            streaming,
            user_options,
            prepared: None,
            method: Method::POST,
            url: String::new(),
            timeout: None,
            headers: HeaderMap::new(),
            body: None,
            http_status: None,
            raw_body: None,
            stream: None,
            response: None,
            embedding: None,
            trace: Vec::new(),
        }
    }
}
