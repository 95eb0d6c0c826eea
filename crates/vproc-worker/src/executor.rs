//! Queue consumer loop.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{error, info, warn};

use vproc_queue::{parse_message, MessageQueue, QueueMessage};

use crate::config::WorkerConfig;
use crate::metrics::{self, ErrorKind};
use crate::processor::JobHandler;
use crate::retry::{DeleteExhausted, DeleteRetry, FailureStreak};

/// Receive errors logged in a row before further ones are suppressed.
const LOGGED_RECEIVE_FAILURES: u32 = 5;

/// Counters kept for the lifetime of the consumer loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub received: u64,
    pub processed: u64,
    pub errors: u64,
}

impl WorkerStats {
    fn error(&mut self, kind: ErrorKind) {
        self.errors += 1;
        metrics::record_error(kind);
    }
}

/// Resolves once `true` has been sent on the channel. Pends forever if the
/// sender goes away without signalling.
pub async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Job executor that consumes messages and hands them to a `JobHandler`.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<dyn MessageQueue>,
    handler: Arc<dyn JobHandler>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, queue: Arc<dyn MessageQueue>, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            config,
            queue,
            handler,
        }
    }

    /// Consume until `shutdown` flips to `true`, then return the counters.
    ///
    /// Shutdown is honoured while long-polling, while backing off and between
    /// messages. A message that is being processed always runs to completion
    /// and is deleted before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WorkerStats {
        info!(
            wait_secs = self.config.poll_wait.as_secs(),
            max_batch = self.config.max_batch,
            "Starting job executor"
        );

        let mut stats = WorkerStats::default();
        let mut receive_failures = FailureStreak::new(LOGGED_RECEIVE_FAILURES);
        let mut last_idle_log: Option<Instant> = None;

        'consume: loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                result = self.queue.receive(self.config.poll_wait, self.config.max_batch) => result,
            };

            let messages = match received {
                Ok(messages) => {
                    receive_failures.reset();
                    messages
                }
                Err(e) => {
                    stats.error(ErrorKind::Receive);
                    if receive_failures.fail() {
                        error!("Error receiving messages: {}", e);
                    }

                    tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown) => break,
                        _ = tokio::time::sleep(self.config.error_backoff) => continue,
                    }
                }
            };

            if messages.is_empty() {
                let due = last_idle_log.map_or(true, |t| t.elapsed() >= self.config.idle_log_interval);
                if due {
                    info!("Polling... (no messages)");
                    last_idle_log = Some(Instant::now());
                }
                continue;
            }

            info!("Received {} message(s)", messages.len());
            let total = messages.len();

            for (index, message) in messages.iter().enumerate() {
                if index > 0 && *shutdown.borrow() {
                    warn!(
                        "Shutdown requested, leaving {} message(s) for redelivery",
                        total - index
                    );
                    break 'consume;
                }
                self.handle_message(message, &mut stats).await;
            }
        }

        info!(
            received = stats.received,
            processed = stats.processed,
            errors = stats.errors,
            "Job executor stopped"
        );
        stats
    }

    /// Parse, process, then delete one message.
    async fn handle_message(&self, message: &QueueMessage, stats: &mut WorkerStats) {
        stats.received += 1;
        metrics::record_received();

        match parse_message(&message.body) {
            Ok(envelope) => {
                let started = Instant::now();
                let handler = Arc::clone(&self.handler);
                let job = envelope.video;

                // A panicking handler must not take the loop down or keep the message alive.
                let outcome = tokio::spawn(async move { handler.handle(&job).await }).await;
                let elapsed = started.elapsed().as_secs_f64();

                match outcome {
                    Ok(true) => {
                        stats.processed += 1;
                        metrics::record_processed(elapsed);
                    }
                    Ok(false) => {
                        stats.error(ErrorKind::Job);
                        metrics::record_job_failed(elapsed);
                    }
                    Err(e) => {
                        error!(message_id = %message.message_id, "Job handler aborted: {}", e);
                        stats.error(ErrorKind::Job);
                        metrics::record_job_failed(elapsed);
                    }
                }
            }
            Err(e) => {
                warn!(message_id = %message.message_id, "Malformed message body: {}", e);
                stats.error(ErrorKind::Parse);
            }
        }

        if !self.delete_message(message).await {
            stats.error(ErrorKind::Delete);
        }
    }

    async fn delete_message(&self, message: &QueueMessage) -> bool {
        let queue = &self.queue;
        let receipt = message.receipt_handle.as_str();

        match DeleteRetry::from_config(&self.config).run(|| queue.delete(receipt)).await {
            Ok(()) => true,
            Err(DeleteExhausted { last_error, attempts }) => {
                error!(
                    message_id = %message.message_id,
                    attempts,
                    "Error deleting message: {}",
                    last_error
                );
                false
            }
        }
    }
}

impl std::fmt::Display for WorkerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "received={} processed={} errors={}",
            self.received, self.processed, self.errors
        )
    }
}
