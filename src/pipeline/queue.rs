//! Single-flight FIFO job queue.
//!
//! One drain task consumes submissions strictly in the order they were enqueued,
//! one at a time. Every submission owns a oneshot completion handle that the drain
//! task resolves with that job's outcome. Identical URLs are not merged: each
//! submission runs the pipeline, and later ones are normally served by the cache.
//!
//! Without a job timeout, a hung job holds the queue and every entry behind it waits.

use async_trait::async_trait;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use crate::cache::TranscriptRecord;
use crate::{PipelineError, Result};

/// Work performed for each queued URL
#[async_trait]
pub trait UrlProcessor: Send + Sync + 'static {
    async fn process(&self, url: &str) -> Result<TranscriptRecord>;
}

struct QueueEntry {
    url: String,
    done: oneshot::Sender<Result<TranscriptRecord>>,
}

#[derive(Default)]
struct QueueState {
    pending: AtomicUsize,
    processing: AtomicBool,
}

/// Completion handle for one submission
pub struct JobHandle {
    url: String,
    rx: oneshot::Receiver<Result<TranscriptRecord>>,
}

impl JobHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait for the drain task to finish this submission.
    pub async fn wait(self) -> Result<TranscriptRecord> {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(PipelineError::Unknown(format!(
                "Job for {} was dropped before completion",
                self.url
            ))
            .into()),
        }
    }
}

#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<QueueEntry>,
    state: Arc<QueueState>,
}

impl JobQueue {
    /// Start the drain task on the current tokio runtime.
    pub fn new(processor: Arc<dyn UrlProcessor>, job_timeout: Option<Duration>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(QueueState::default());

        tokio::spawn(drain(rx, processor, state.clone(), job_timeout));

        Self { tx, state }
    }

    /// Append `url` to the tail of the queue. Ordering is fixed when this returns.
    pub fn enqueue(&self, url: impl Into<String>) -> JobHandle {
        let url = url.into();
        let (done, rx) = oneshot::channel();

        self.state.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(entry)) = self.tx.send(QueueEntry {
            url: url.clone(),
            done,
        }) {
            self.state.pending.fetch_sub(1, Ordering::SeqCst);
            let _ = entry.done.send(Err(PipelineError::Unknown(
                "Job queue has shut down".to_string(),
            )
            .into()));
        } else {
            tracing::debug!(url = %url, pending = self.pending(), "Job enqueued");
        }

        JobHandle { url, rx }
    }

    /// Enqueue `url` and wait for its record.
    pub async fn submit(&self, url: impl Into<String>) -> Result<TranscriptRecord> {
        self.enqueue(url).wait().await
    }

    /// Submissions not yet finished, including the one in progress
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    pub fn is_processing(&self) -> bool {
        self.state.processing.load(Ordering::SeqCst)
    }
}

async fn drain(
    mut rx: mpsc::UnboundedReceiver<QueueEntry>,
    processor: Arc<dyn UrlProcessor>,
    state: Arc<QueueState>,
    job_timeout: Option<Duration>,
) {
    while let Some(entry) = rx.recv().await {
        state.processing.store(true, Ordering::SeqCst);
        tracing::info!(url = %entry.url, "Processing job");

        let outcome = run_job(processor.as_ref(), &entry.url, job_timeout).await;

        state.pending.fetch_sub(1, Ordering::SeqCst);
        state.processing.store(false, Ordering::SeqCst);

        match &outcome {
            Ok(record) => tracing::info!(url = %entry.url, id = %record.id, "Job completed"),
            Err(e) => tracing::warn!(url = %entry.url, error = %e, "Job failed"),
        }

        if entry.done.send(outcome).is_err() {
            tracing::debug!(url = %entry.url, "Submitter stopped waiting");
        }
    }

    tracing::debug!("Job queue closed");
}

/// Run one job so that neither an error nor a panic can escape into the drain loop.
async fn run_job(
    processor: &dyn UrlProcessor,
    url: &str,
    job_timeout: Option<Duration>,
) -> Result<TranscriptRecord> {
    let job = AssertUnwindSafe(processor.process(url)).catch_unwind();

    let caught = match job_timeout {
        Some(limit) => match tokio::time::timeout(limit, job).await {
            Ok(caught) => caught,
            Err(_) => {
                return Err(PipelineError::Unknown(format!(
                    "Job for {} timed out after {}s",
                    url,
                    limit.as_secs()
                ))
                .into())
            }
        },
        None => job.await,
    };

    caught.unwrap_or_else(|panic| {
        Err(PipelineError::Unknown(format!("Job for {} panicked: {}", url, panic_message(&*panic))).into())
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
