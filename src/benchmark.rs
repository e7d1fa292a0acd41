//! Benchmark orchestration
//!
//! 1. Spawns the detection ingestion task (single writer of the engine)
//! 2. Spawns one source loop per node, all sharing one cancellation token
//! 3. Waits out the window, reporting progress once per second
//! 4. Cancels and joins the source loops, drains ingestion, snapshots
//!
//! Any source failure inside the window aborts the whole run.

use crate::config::BenchmarkConfig;
use crate::detection::{start_detection_ingestion, DetectionEngine, ScoreBoard};
use crate::streamer_core::{run_source, SourceError, UpdateSource};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use yellowstone_grpc_proto::geyser::SubscribeRequest;

#[derive(Debug)]
pub enum BenchmarkError {
    Source(SourceError),
    Task(JoinError),
}

impl std::fmt::Display for BenchmarkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchmarkError::Source(e) => write!(f, "{}", e),
            BenchmarkError::Task(e) => write!(f, "Benchmark task failed: {}", e),
        }
    }
}

impl std::error::Error for BenchmarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BenchmarkError::Source(e) => Some(e),
            BenchmarkError::Task(e) => Some(e),
        }
    }
}

impl From<SourceError> for BenchmarkError {
    fn from(e: SourceError) -> Self {
        BenchmarkError::Source(e)
    }
}

impl From<JoinError> for BenchmarkError {
    fn from(e: JoinError) -> Self {
        BenchmarkError::Task(e)
    }
}

/// Progress sample handed to the caller once per second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Whole seconds left in the window (rounded up)
    pub remaining_secs: u64,
    /// Transactions finalized so far
    pub detected: u64,
}

pub struct Benchmark<S: ?Sized> {
    nodes: Vec<String>,
    window: Duration,
    request: SubscribeRequest,
    updates: Arc<S>,
    channel_buffer: usize,
}

impl<S> Benchmark<S>
where
    S: UpdateSource + ?Sized + 'static,
{
    pub fn new(
        config: &BenchmarkConfig,
        request: SubscribeRequest,
        updates: Arc<S>,
        channel_buffer: usize,
    ) -> Self {
        Self {
            nodes: config.nodes.clone(),
            window: config.window(),
            request,
            updates,
            channel_buffer: channel_buffer.max(1),
        }
    }

    /// Run for the configured window and return the final counters
    pub async fn run<F>(self, mut on_progress: F) -> Result<ScoreBoard, BenchmarkError>
    where
        F: FnMut(Progress),
    {
        let engine = Arc::new(Mutex::new(DetectionEngine::new(self.nodes.iter().cloned())));
        let (tx, rx) = mpsc::channel(self.channel_buffer);
        let ingestion = tokio::spawn(start_detection_ingestion(rx, engine.clone()));

        let cancel = CancellationToken::new();
        let mut sources = JoinSet::new();

        for node in &self.nodes {
            sources.spawn(run_source(
                node.clone(),
                self.updates.clone(),
                self.request.clone(),
                tx.clone(),
                cancel.child_token(),
            ));
        }
        // Ingestion ends once every source loop has dropped its sender
        drop(tx);

        log::info!(
            "⏱️  Racing {} nodes for {}s",
            self.nodes.len(),
            self.window.as_secs()
        );

        let deadline = Instant::now() + self.window;
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                Some(joined) = sources.join_next() => {
                    let Some(error) = failure_in_window(joined) else {
                        continue;
                    };
                    log::error!("❌ {}", error);
                    cancel.cancel();
                    sources.abort_all();
                    return Err(error);
                }
                _ = sleep_until(deadline) => break,
                _ = ticker.tick() => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    on_progress(Progress {
                        remaining_secs: ceil_secs(remaining),
                        detected: total(&engine),
                    });
                }
            }
        }

        log::info!("Window closed, stopping {} source loops", sources.len());
        cancel.cancel();

        while let Some(joined) = sources.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                // Results are complete at this point; late failures are only reported
                Ok(Err(e)) => log::warn!("{} (after window close)", e),
                Err(e) => return Err(BenchmarkError::Task(e)),
            }
        }

        let stats = ingestion.await?;
        log::debug!("Ingestion stats: {:?}", stats);

        let board = engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot();

        Ok(board)
    }
}

/// Error that must abort the run, if a source loop ended inside the window
fn failure_in_window(
    joined: Result<Result<(), SourceError>, JoinError>,
) -> Option<BenchmarkError> {
    match joined {
        Ok(Ok(())) => {
            log::warn!("A source loop stopped before the window closed");
            None
        }
        Ok(Err(e)) => Some(BenchmarkError::Source(e)),
        Err(e) => Some(BenchmarkError::Task(e)),
    }
}

fn total(engine: &Mutex<DetectionEngine>) -> u64 {
    engine.lock().unwrap_or_else(PoisonError::into_inner).total()
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streamer_core::ClientError;

    #[test]
    fn test_ceil_secs() {
        assert_eq!(ceil_secs(Duration::from_secs(3)), 3);
        assert_eq!(ceil_secs(Duration::from_millis(2_001)), 3);
        assert_eq!(ceil_secs(Duration::ZERO), 0);
    }

    #[test]
    fn test_clean_early_exit_does_not_abort() {
        assert!(failure_in_window(Ok(Ok(()))).is_none());

        let failed = failure_in_window(Ok(Err(SourceError {
            address: "http://a".to_string(),
            error: ClientError::StreamClosed,
        })));
        assert!(matches!(failed, Some(BenchmarkError::Source(e)) if e.address == "http://a"));
    }

    #[tokio::test]
    async fn test_panicked_source_aborts() {
        let joined: Result<(), JoinError> =
            tokio::spawn(async { panic!("source loop panicked") }).await;
        assert!(matches!(
            failure_in_window(joined.map(|()| Ok(()))),
            Some(BenchmarkError::Task(_))
        ));
    }
}
