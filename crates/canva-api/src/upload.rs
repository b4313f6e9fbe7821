//! Asset upload job poller
//!
//! Upload is asynchronous on the provider side: the POST returns a job which
//! moves from `in_progress` to `success` or `failed`. The relay submits the
//! bytes and polls the job until it leaves `in_progress`.
//!
//! Polling is bounded: exponential backoff from `initial_interval`, capped at
//! `max_interval`, at most `max_polls` status checks and an overall
//! `deadline`. A `CancellationToken` stops the loop between and during
//! requests (server shutdown).

use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::client::CanvaClient;
use crate::error::{Error, Result};

/// Header carrying upload metadata as JSON.
pub const METADATA_HEADER: &str = "Asset-Upload-Metadata";

/// Backoff and budget for the status loop.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: u32,
    pub max_polls: u32,
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(1000),
            max_interval: Duration::from_secs(10),
            multiplier: 2,
            max_polls: 30,
            deadline: Duration::from_secs(120),
        }
    }
}

impl PollPolicy {
    /// Sleep before the status check following `backoffs` earlier sleeps.
    pub fn delay(&self, backoffs: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(backoffs);
        self.initial_interval
            .saturating_mul(factor)
            .min(self.max_interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    InProgress,
    Success,
    Failed,
    /// Any other status the provider reports is treated as terminal success.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadJob {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub error: Option<JobError>,
    /// Created asset, present once the job succeeds.
    #[serde(default)]
    pub asset: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct JobEnvelope {
    job: UploadJob,
}

/// Terminal successful job plus how much polling it took.
#[derive(Debug)]
pub struct UploadOutcome {
    pub job: UploadJob,
    /// Status requests issued after the submit, each preceded by a backoff
    /// sleep.
    pub polls: u32,
    pub elapsed: Duration,
}

impl CanvaClient {
    /// `POST /asset-uploads` with the raw file body.
    pub async fn submit_upload(&self, token: &str, name: &str, bytes: Vec<u8>) -> Result<UploadJob> {
        let metadata = serde_json::json!({ "name_base64": STANDARD.encode(name) }).to_string();
        let request = self
            .request(Method::POST, self.endpoint(&["asset-uploads"]), token)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(METADATA_HEADER, metadata)
            .body(bytes);
        let envelope: JobEnvelope = self.send_json(request).await?;
        Ok(envelope.job)
    }

    /// `GET /asset-uploads/{job_id}`
    pub async fn upload_job(&self, token: &str, job_id: &str) -> Result<UploadJob> {
        let request = self.request(
            Method::GET,
            self.endpoint(&["asset-uploads", job_id]),
            token,
        );
        let envelope: JobEnvelope = self.send_json(request).await?;
        Ok(envelope.job)
    }
}

/// Submit an upload and poll it until it finishes, fails, runs out of budget
/// or is cancelled.
#[instrument(skip_all, fields(name = %name, bytes = bytes.len()))]
pub async fn upload_and_wait(
    client: &CanvaClient,
    token: &str,
    name: &str,
    bytes: Vec<u8>,
    policy: &PollPolicy,
    cancel: &CancellationToken,
) -> Result<UploadOutcome> {
    let started = Instant::now();
    let mut job = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        job = client.submit_upload(token, name, bytes) => job?,
    };
    debug!(job_id = %job.id, status = ?job.status, "upload submitted");

    let mut polls = 0u32;
    loop {
        match job.status {
            JobStatus::InProgress => {}
            JobStatus::Failed => {
                let (code, message) = match job.error {
                    Some(e) => (e.code, e.message),
                    None => (None, String::new()),
                };
                let message = if message.is_empty() {
                    "upload job failed".to_string()
                } else {
                    message
                };
                warn!(
                    job_id = %job.id,
                    polls,
                    code = code.as_deref().unwrap_or("unknown"),
                    error = %message,
                    "upload job failed"
                );
                metrics::counter!("relay_upload_jobs_total", "outcome" => "failed").increment(1);
                return Err(Error::UploadFailed(message));
            }
            JobStatus::Success | JobStatus::Unknown => {
                let elapsed = started.elapsed();
                info!(job_id = %job.id, polls, elapsed_ms = elapsed.as_millis() as u64, "upload job finished");
                metrics::counter!("relay_upload_jobs_total", "outcome" => "success").increment(1);
                metrics::histogram!("relay_upload_duration_seconds").record(elapsed.as_secs_f64());
                return Ok(UploadOutcome {
                    job,
                    polls,
                    elapsed,
                });
            }
        }

        let delay = policy.delay(polls);
        if polls >= policy.max_polls || started.elapsed() + delay > policy.deadline {
            warn!(job_id = %job.id, polls, "upload job still in progress, giving up");
            metrics::counter!("relay_upload_jobs_total", "outcome" => "timeout").increment(1);
            return Err(Error::UploadTimedOut {
                job_id: job.id,
                polls,
            });
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        let job_id = job.id.clone();
        job = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            next = client.upload_job(token, &job_id) => next?,
        };
        polls += 1;
        metrics::counter!("relay_upload_polls_total").increment(1);
        debug!(job_id = %job.id, polls, status = ?job.status, "polled upload job");
    }
}
