//! Detection Engine - first-arrival race tracking across Geyser sources
//!
//! Every source reports the transactions it sees. The engine keeps one
//! pending entry per signature until all sources have reported it, then
//! credits whichever source was registered first and retires the signature.
//!
//! ## Event lifecycle
//!
//! ```text
//! absent ──observe──▶ pending(1..N-1) ──N-th distinct source──▶ finalized
//! ```
//!
//! "First" is decided purely by registration order. Timestamps are kept for
//! the informational spread metric only.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Content-derived identifier of one transaction (base58 signature)
pub type EventId = String;

/// One source's report of one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub event: EventId,
    pub source: String,
    pub received_at: DateTime<Utc>,
}

impl Observation {
    pub fn new(event: impl Into<EventId>, source: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            source: source.into(),
            received_at: Utc::now(),
        }
    }
}

/// Result of a finalized race
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedEvent {
    pub event: EventId,
    pub winner: String,
    /// Time between the first and the last registered observation
    pub spread: chrono::Duration,
}

/// What happened to an observation handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Recorded; `seen` of `expected` sources have reported the event so far
    Pending { seen: usize, expected: usize },
    /// Recorded and completed the race
    Finalized(FinalizedEvent),
    /// Source already reported this event
    Duplicate,
    /// Event was finalized earlier
    Retired,
    /// Source is not part of this run
    UnknownSource,
}

/// Read-only copy of the race counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBoard {
    /// Wins per source, in configured source order
    pub wins: Vec<(String, u64)>,
    /// Number of finalized events
    pub total: u64,
    /// Events still waiting on at least one source
    pub pending: usize,
    /// Mean first-to-last spread over finalized events, in milliseconds
    pub mean_spread_ms: Option<f64>,
}

impl ScoreBoard {
    pub fn wins_for(&self, source: &str) -> Option<u64> {
        self.wins
            .iter()
            .find(|(name, _)| name == source)
            .map(|(_, wins)| *wins)
    }
}

pub struct DetectionEngine {
    /// Source addresses in configured order
    sources: Vec<String>,
    /// Source address -> index into `wins`
    source_index: HashMap<String, usize>,
    /// Signature -> observations in registration order
    pending: HashMap<EventId, Vec<Observation>>,
    /// Signatures that already finalized
    retired: HashSet<EventId>,
    wins: Vec<u64>,
    total: u64,
    spread_sum_ms: i64,
}

impl DetectionEngine {
    /// Create an engine racing the given sources
    ///
    /// Duplicate addresses collapse into a single source; callers validate
    /// the list before starting a run.
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut source_index = HashMap::new();

        for source in sources {
            let source = source.into();
            if !source_index.contains_key(&source) {
                source_index.insert(source.clone(), ordered.len());
                ordered.push(source);
            }
        }

        Self {
            wins: vec![0; ordered.len()],
            sources: ordered,
            source_index,
            pending: HashMap::new(),
            retired: HashSet::new(),
            total: 0,
            spread_sum_ms: 0,
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Number of finalized events so far
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Number of events seen by some but not all sources
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Register one observation
    ///
    /// The entry finalizes when it holds one observation from every source.
    /// The credited source is always the first one appended to the entry.
    pub fn register(&mut self, observation: Observation) -> Registration {
        if !self.source_index.contains_key(&observation.source) {
            return Registration::UnknownSource;
        }

        if self.retired.contains(&observation.event) {
            return Registration::Retired;
        }

        let event = observation.event.clone();
        let expected = self.sources.len();
        let entry = self.pending.entry(event.clone()).or_default();

        if entry.iter().any(|o| o.source == observation.source) {
            return Registration::Duplicate;
        }

        entry.push(observation);
        let seen = entry.len();

        if seen < expected {
            return Registration::Pending { seen, expected };
        }

        // Entry is complete: credit the first observer and retire the event
        let observations = std::mem::take(entry);
        self.pending.remove(&event);

        let first = &observations[0];
        let last = &observations[observations.len() - 1];
        let spread = last.received_at - first.received_at;
        let winner = first.source.clone();

        if let Some(&idx) = self.source_index.get(&winner) {
            self.wins[idx] += 1;
        }
        self.total += 1;
        self.spread_sum_ms += spread.num_milliseconds().max(0);
        self.retired.insert(event.clone());

        Registration::Finalized(FinalizedEvent {
            event,
            winner,
            spread,
        })
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> ScoreBoard {
        let mean_spread_ms = if self.total > 0 {
            Some(self.spread_sum_ms as f64 / self.total as f64)
        } else {
            None
        };

        ScoreBoard {
            wins: self
                .sources
                .iter()
                .cloned()
                .zip(self.wins.iter().copied())
                .collect(),
            total: self.total,
            pending: self.pending.len(),
            mean_spread_ms,
        }
    }
}
