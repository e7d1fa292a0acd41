//! Detection - first-arrival race engine and its ingestion task
//!
//! ```text
//! source loop (per node) ─┐
//! source loop (per node) ─┼─▶ mpsc<Observation> ─▶ start_detection_ingestion
//! source loop (per node) ─┘                              │
//!                                                        ▼
//!                                      Arc<Mutex<DetectionEngine>> ─▶ ScoreBoard
//! ```

pub mod engine;
pub mod ingestion;

pub use engine::{DetectionEngine, EventId, FinalizedEvent, Observation, Registration, ScoreBoard};
pub use ingestion::{start_detection_ingestion, IngestionStats};
