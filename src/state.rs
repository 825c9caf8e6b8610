use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::completion::{CompletionError, CompletionRequest, TextGenerator};
use crate::error::ApiError;
use crate::rate_limit::{AdmissionController, Clock, InMemoryWindowStore};
use crate::storage::MemStorage;
use crate::worker::{GenerationJob, spawn_workers};

pub type SharedAdmissionController = AdmissionController<InMemoryWindowStore, Arc<dyn Clock>>;

// Knobs for the HTTP side of the app
#[derive(Debug, Clone)]
pub struct StateOptions {
    pub trust_forwarded_for: bool,
    pub admin_token: Option<String>,
    pub workers: usize,
    pub queue_capacity: usize,
}

// app's shared state
pub struct AppState {
    pub admission: SharedAdmissionController,
    pub storage: MemStorage,
    pub job_tx: mpsc::Sender<GenerationJob>,
    pub trust_forwarded_for: bool,
    pub admin_token: Option<String>,
}

impl AppState {
    // Builds the state and starts the generation workers. Needs a tokio runtime.
    pub fn spawn(
        admission: SharedAdmissionController,
        generator: Arc<dyn TextGenerator>,
        options: StateOptions,
    ) -> Arc<Self> {
        let (job_tx, job_rx) = mpsc::channel(options.queue_capacity);
        spawn_workers(job_rx, generator, options.workers);
        Arc::new(Self {
            admission,
            storage: MemStorage::default(),
            job_tx,
            trust_forwarded_for: options.trust_forwarded_for,
            admin_token: options.admin_token,
        })
    }

    // Queues a completion and waits for the worker's answer.
    // The outer error is about the queue, the inner one about the generator.
    pub async fn generate(
        &self,
        request: CompletionRequest,
    ) -> Result<Result<String, CompletionError>, ApiError> {
        let (response_tx, response_rx) = oneshot::channel();
        let job = GenerationJob { request, response_tx };

        self.job_tx.try_send(job).map_err(|e| {
            match e {
                TrySendError::Full(_) => warn!("generation queue is full"),
                TrySendError::Closed(_) => warn!("generation queue is closed"),
            }
            ApiError::Unavailable
        })?;

        response_rx.await.map_err(|_| ApiError::Unavailable)
    }
}
