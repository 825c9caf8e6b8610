use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::completion::{CompletionError, CompletionRequest, TextGenerator};
use crate::metrics::{GENERATION_FAILURES, GENERATION_LATENCY};

// Queued generation job - the prompt plus a one-time channel for the answer
pub struct GenerationJob {
    pub request: CompletionRequest,
    pub response_tx: oneshot::Sender<Result<String, CompletionError>>,
}

// Spawns `workers` tasks that share one queue
pub fn spawn_workers(
    rx: mpsc::Receiver<GenerationJob>,
    generator: Arc<dyn TextGenerator>,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));
    info!(workers, "starting generation workers");
    (0..workers)
        .map(|id| {
            let rx = Arc::clone(&rx);
            let generator = Arc::clone(&generator);
            tokio::spawn(async move { generation_worker(id, rx, generator).await })
        })
        .collect()
}

async fn generation_worker(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<GenerationJob>>>,
    generator: Arc<dyn TextGenerator>,
) {
    loop {
        // lock only while waiting for the next job
        let job = { rx.lock().await.recv().await };
        let Some(job) = job else {
            debug!(worker = id, "queue closed, worker exiting");
            break;
        };

        let start = Instant::now();
        let result = generator.complete(&job.request).await;
        GENERATION_LATENCY.observe(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            GENERATION_FAILURES.inc();
            error!(worker = id, error = %e, "text generation failed");
        }

        // caller may have gone away; nothing to do then
        let _ = job.response_tx.send(result);
    }
}
