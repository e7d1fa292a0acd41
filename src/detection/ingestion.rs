//! Detection ingestion - single writer applying observations to the engine
//!
//! Source loops never touch the engine directly. They push observations into
//! one bounded channel and this task applies them in arrival order, so the
//! lock is only contended by progress reads and the final snapshot.

use super::engine::{DetectionEngine, Observation, Registration};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Totals reported when ingestion stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub observations: u64,
    pub finalized: u64,
    pub duplicates: u64,
    pub ignored: u64,
}

/// Drain observations from the channel into the engine
///
/// Runs until every sender has been dropped, i.e. until all source loops have
/// stopped, and then returns what it processed.
pub async fn start_detection_ingestion(
    mut rx: mpsc::Receiver<Observation>,
    engine: Arc<Mutex<DetectionEngine>>,
) -> IngestionStats {
    log::info!("🚀 Starting detection ingestion");

    let mut stats = IngestionStats::default();

    while let Some(observation) = rx.recv().await {
        stats.observations += 1;

        let source = observation.source.clone();
        let registration = {
            let mut engine_guard = engine.lock().unwrap_or_else(PoisonError::into_inner);
            engine_guard.register(observation)
        };

        match registration {
            Registration::Pending { .. } => {}
            Registration::Finalized(done) => {
                stats.finalized += 1;
                log::debug!(
                    "🏁 {} first seen by {} (spread {}ms)",
                    done.event,
                    done.winner,
                    done.spread.num_milliseconds()
                );
            }
            Registration::Duplicate => {
                stats.duplicates += 1;
                log::debug!("Duplicate observation from {}", source);
            }
            Registration::Retired => {
                stats.ignored += 1;
                log::debug!("Already finalized transaction reported again by {}", source);
            }
            Registration::UnknownSource => {
                stats.ignored += 1;
                log::warn!("Observation from unknown source {}", source);
            }
        }
    }

    log::info!(
        "Detection ingestion stopped: {} observations, {} finalized, {} duplicates, {} ignored",
        stats.observations,
        stats.finalized,
        stats.duplicates,
        stats.ignored
    );

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ingestion_applies_in_channel_order() {
        let engine = Arc::new(Mutex::new(DetectionEngine::new(["A", "B"])));
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(start_detection_ingestion(rx, engine.clone()));

        tx.send(Observation::new("E1", "B")).await.unwrap();
        tx.send(Observation::new("E1", "A")).await.unwrap();
        tx.send(Observation::new("E1", "A")).await.unwrap();
        tx.send(Observation::new("E2", "A")).await.unwrap();
        tx.send(Observation::new("E2", "A")).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.observations, 5);
        assert_eq!(stats.finalized, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.ignored, 1);

        let board = engine.lock().unwrap().snapshot();
        assert_eq!(board.total, 1);
        assert_eq!(board.wins_for("B"), Some(1));
        assert_eq!(board.pending, 1);
    }

    #[tokio::test]
    async fn test_recurring_finalized_event_is_ignored() {
        let engine = Arc::new(Mutex::new(DetectionEngine::new(["A", "B"])));
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(start_detection_ingestion(rx, engine.clone()));

        tx.send(Observation::new("E1", "A")).await.unwrap();
        tx.send(Observation::new("E1", "B")).await.unwrap();
        tx.send(Observation::new("E1", "B")).await.unwrap();
        tx.send(Observation::new("E1", "A")).await.unwrap();
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.finalized, 1);
        assert_eq!(stats.duplicates, 0);
        assert_eq!(stats.ignored, 2);

        let board = engine.lock().unwrap().snapshot();
        assert_eq!(board.total, 1);
        assert_eq!(board.wins_for("A"), Some(1));
        assert_eq!(board.pending, 0);
    }

    #[tokio::test]
    async fn test_concurrent_producers_finalize_once() {
        let sources = ["A", "B", "C", "D"];
        let engine = Arc::new(Mutex::new(DetectionEngine::new(sources)));
        let (tx, rx) = mpsc::channel(64);

        let handle = tokio::spawn(start_detection_ingestion(rx, engine.clone()));

        for source in sources {
            let tx = tx.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let event = format!("E{}", i);
                    if tx.send(Observation::new(event, source)).await.is_err() {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            });
        }
        drop(tx);

        let stats = handle.await.unwrap();
        assert_eq!(stats.observations, 800);
        assert_eq!(stats.finalized, 200);

        let board = engine.lock().unwrap().snapshot();
        assert_eq!(board.total, 200);
        assert_eq!(board.wins.iter().map(|(_, w)| w).sum::<u64>(), 200);
        assert_eq!(board.pending, 0);
    }
}
