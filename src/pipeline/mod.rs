//! Ordered request pipeline.
//!
//! Every call runs the same fixed sequence of steps over a mutable
//! [`RequestCarrier`]: plan, options, auth, encode, dispatch, decode. Steps
//! are small and single-purpose; a failure stops the run and hands back both
//! the error and the carrier as it stood, so callers can see how far the
//! request got.

mod carrier;
mod steps;

pub use carrier::RequestCarrier;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::adapter::ProviderAdapter;
use crate::auth::CredentialStore;
use crate::error::ClientError;
use crate::options::OptionMap;

/// Shared, read-only context the steps run against.
#[derive(Clone)]
pub struct StepContext {
    pub http: reqwest::Client,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub credentials: Arc<dyn CredentialStore>,
    /// Overrides the adapter's default base URL, e.g. for proxies and tests.
    pub base_url: Option<String>,
    /// Client-wide option defaults, lowest merge precedence.
    pub global_defaults: OptionMap,
}

/// One stage of the pipeline.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &StepContext, carrier: &mut RequestCarrier)
    -> Result<(), ClientError>;
}

/// A step failure with the carrier preserved for inspection.
#[derive(Debug)]
pub struct PipelineFailure {
    pub carrier: RequestCarrier,
    pub error: ClientError,
}

impl From<PipelineFailure> for ClientError {
    fn from(failure: PipelineFailure) -> Self {
        failure.error
    }
}

/// The fixed step sequence.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    /// The standard sequence every operation runs.
    pub fn standard() -> Self {
        Self {
            steps: vec![
                Box::new(steps::PlanStep),
                Box::new(steps::OptionsStep),
                Box::new(steps::AuthStep),
                Box::new(steps::EncodeStep),
                Box::new(steps::DispatchStep),
                Box::new(steps::DecodeStep),
            ],
        }
    }

    /// Run the carrier through every step in order.
    pub async fn execute(
        &self,
        ctx: &StepContext,
        mut carrier: RequestCarrier,
    ) -> Result<RequestCarrier, PipelineFailure> {
        for step in &self.steps {
            carrier.trace.push(step.name());
            debug!(
                request_id = %carrier.request_id,
                step = step.name(),
                operation = %carrier.operation,
                "pipeline step"
            );
            if let Err(error) = step.run(ctx, &mut carrier).await {
                return Err(PipelineFailure { carrier, error });
            }
        }
        Ok(carrier)
    }
}
