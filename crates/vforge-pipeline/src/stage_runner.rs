//! Generic executor for one pipeline stage invocation.
//!
//! Runs the primary collaborator with a bounded retry budget for transient
//! errors, then the fallback collaborator (if configured) through the same
//! budget, and reports the path taken as a tagged [`StageResult`].

use std::future::Future;

use tracing::{debug, info, warn};

use vforge_models::{Stage, StageError, StageResult};

use crate::config::RetryPolicy;

/// Executes a single stage invocation against a collaborator pair.
#[derive(Debug, Clone, Default)]
pub struct StageRunner {
    policy: RetryPolicy,
}

impl StageRunner {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run a stage with no fallback configured.
    pub async fn run<T, P, PF>(&self, stage: Stage, scene: Option<usize>, primary: P) -> StageResult<T>
    where
        P: Fn() -> PF,
        PF: Future<Output = Result<T, StageError>>,
    {
        match self.attempt(stage, scene, "primary", primary).await {
            Ok(payload) => {
                info!(stage = %stage, scene = ?scene, path = "primary", "Stage succeeded");
                StageResult::Success(payload)
            }
            Err(error) => {
                warn!(stage = %stage, scene = ?scene, error = %error, "Stage failed, no fallback configured");
                StageResult::Failed(error)
            }
        }
    }

    /// Run a stage, invoking the fallback collaborator if the primary fails.
    pub async fn run_with_fallback<T, P, PF, F, FF>(
        &self,
        stage: Stage,
        scene: Option<usize>,
        primary: P,
        fallback: F,
    ) -> StageResult<T>
    where
        P: Fn() -> PF,
        PF: Future<Output = Result<T, StageError>>,
        F: Fn() -> FF,
        FF: Future<Output = Result<T, StageError>>,
    {
        let primary_error = match self.attempt(stage, scene, "primary", primary).await {
            Ok(payload) => {
                info!(stage = %stage, scene = ?scene, path = "primary", "Stage succeeded");
                return StageResult::Success(payload);
            }
            Err(error) => error,
        };

        if primary_error.is_auth() {
            warn!(
                stage = %stage,
                scene = ?scene,
                error = %primary_error,
                "Credentials rejected, fallback not attempted"
            );
            return StageResult::Failed(primary_error);
        }

        warn!(
            stage = %stage,
            scene = ?scene,
            error = %primary_error,
            "Primary collaborator failed, invoking fallback"
        );

        match self.attempt(stage, scene, "fallback", fallback).await {
            Ok(payload) => {
                info!(stage = %stage, scene = ?scene, path = "fallback", "Stage succeeded via fallback");
                StageResult::FallbackUsed {
                    payload,
                    reason: primary_error.to_string(),
                }
            }
            Err(error) => {
                warn!(stage = %stage, scene = ?scene, error = %error, "Fallback collaborator failed");
                StageResult::Failed(error)
            }
        }
    }

    /// Invoke one collaborator, retrying transient errors within the policy
    /// bound. Auth and content errors fail immediately.
    async fn attempt<T, P, PF>(
        &self,
        stage: Stage,
        scene: Option<usize>,
        path: &str,
        operation: P,
    ) -> Result<T, StageError>
    where
        P: Fn() -> PF,
        PF: Future<Output = Result<T, StageError>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for_attempt(attempt);
                    debug!(
                        stage = %stage,
                        scene = ?scene,
                        path = path,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
