//! Ranking of nodes by how often they delivered a transaction first

use crate::detection::ScoreBoard;
use serde::Serialize;
use std::fmt;

pub const NO_DETECTIONS_MESSAGE: &str = "No transactions detected, consider increasing the benchmark duration or changing detection address";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeResult {
    pub node: String,
    pub times_first: u64,
    /// Percentage of finalized transactions this node saw first (0-100)
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub total: u64,
    /// Node credited with the most first arrivals
    pub winner: Option<String>,
    /// Set instead of a ranking when nothing was detected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Nodes by descending `times_first`; ties keep configured order.
    /// Empty when nothing was detected.
    pub ranking: Vec<NodeResult>,
    /// Transactions seen by only some nodes when the window closed
    pub unfinalized: usize,
    pub mean_spread_ms: Option<f64>,
}

impl BenchmarkReport {
    pub fn from_scoreboard(board: &ScoreBoard) -> Self {
        let mut ranking: Vec<NodeResult> = board
            .wins
            .iter()
            .map(|(node, wins)| NodeResult {
                node: node.clone(),
                times_first: *wins,
                win_rate: win_rate(*wins, board.total),
            })
            .collect();

        // Stable sort keeps configured order among equal scores
        ranking.sort_by(|a, b| b.times_first.cmp(&a.times_first));

        if board.total == 0 {
            return Self {
                total: 0,
                winner: None,
                message: Some(NO_DETECTIONS_MESSAGE.to_string()),
                ranking: Vec::new(),
                unfinalized: board.pending,
                mean_spread_ms: board.mean_spread_ms,
            };
        }

        Self {
            total: board.total,
            winner: ranking.first().map(|r| r.node.clone()),
            message: None,
            ranking,
            unfinalized: board.pending,
            mean_spread_ms: board.mean_spread_ms,
        }
    }

    pub fn has_detections(&self) -> bool {
        self.total > 0
    }

    /// Ranking entry of the winning node
    pub fn winner(&self) -> Option<&NodeResult> {
        if self.has_detections() {
            self.ranking.first()
        } else {
            None
        }
    }
}

fn win_rate(wins: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (wins as f64 / total as f64) * 100.0
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(winner) = self.winner() else {
            return writeln!(f, "{}", NO_DETECTIONS_MESSAGE);
        };

        writeln!(f, "Detected {} transactions", self.total)?;
        writeln!(f, "The winner is {}", winner.node)?;
        writeln!(f, "Ranking:")?;

        for (i, result) in self.ranking.iter().enumerate() {
            writeln!(
                f,
                "{}) {} detected first {} transactions with a winrate of {:.2}%",
                i + 1,
                result.node,
                result.times_first,
                result.win_rate
            )?;
        }

        if let Some(spread) = self.mean_spread_ms {
            writeln!(f, "Average first-to-last arrival spread: {:.1}ms", spread)?;
        }

        if self.unfinalized > 0 {
            writeln!(
                f,
                "{} transactions were not seen by every node before the window closed",
                self.unfinalized
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(wins: &[(&str, u64)], pending: usize) -> ScoreBoard {
        ScoreBoard {
            wins: wins.iter().map(|(n, w)| (n.to_string(), *w)).collect(),
            total: wins.iter().map(|(_, w)| w).sum(),
            pending,
            mean_spread_ms: None,
        }
    }

    #[test]
    fn test_ranking_order_and_rates() {
        let report = BenchmarkReport::from_scoreboard(&board(
            &[("http://a", 1), ("http://b", 6), ("http://c", 1)],
            0,
        ));

        assert_eq!(report.total, 8);
        assert_eq!(report.winner().unwrap().node, "http://b");

        let nodes: Vec<&str> = report.ranking.iter().map(|r| r.node.as_str()).collect();
        assert_eq!(nodes, vec!["http://b", "http://a", "http://c"]);

        assert_eq!(report.ranking[0].win_rate, 75.0);
        assert_eq!(report.ranking[1].win_rate, 12.5);

        let rate_sum: f64 = report.ranking.iter().map(|r| r.win_rate).sum();
        assert!((rate_sum - 100.0).abs() < 1e-9);
        assert!(report.ranking.iter().all(|r| (0.0..=100.0).contains(&r.win_rate)));
    }

    #[test]
    fn test_render_ranking() {
        let mut scores = board(&[("http://a", 2), ("https://b", 1)], 4);
        scores.mean_spread_ms = Some(12.34);
        let rendered = BenchmarkReport::from_scoreboard(&scores).to_string();

        let expected = "Detected 3 transactions\n\
                        The winner is http://a\n\
                        Ranking:\n\
                        1) http://a detected first 2 transactions with a winrate of 66.67%\n\
                        2) https://b detected first 1 transactions with a winrate of 33.33%\n\
                        Average first-to-last arrival spread: 12.3ms\n\
                        4 transactions were not seen by every node before the window closed\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_no_detections_message() {
        let report = BenchmarkReport::from_scoreboard(&board(&[("http://a", 0), ("http://b", 0)], 3));

        assert!(!report.has_detections());
        assert!(report.winner().is_none());
        assert_eq!(report.to_string(), format!("{}\n", NO_DETECTIONS_MESSAGE));
        assert!(report.ranking.is_empty());
        assert_eq!(report.winner, None);
    }

    #[test]
    fn test_json_without_detections_carries_message() {
        let report = BenchmarkReport::from_scoreboard(&board(&[("http://a", 0), ("http://b", 0)], 2));
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["total"], 0);
        assert_eq!(json["message"], NO_DETECTIONS_MESSAGE);
        assert!(json["winner"].is_null());
        assert_eq!(json["ranking"], serde_json::json!([]));
        assert_eq!(json["unfinalized"], 2);
    }

    #[test]
    fn test_json_names_winner() {
        let report = BenchmarkReport::from_scoreboard(&board(&[("http://a", 1), ("http://b", 3)], 0));
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["total"], 4);
        assert_eq!(json["winner"], "http://b");
        assert!(json.get("message").is_none());
        assert_eq!(json["ranking"][0]["node"], "http://b");
        assert_eq!(json["ranking"][0]["times_first"], 3);
        assert_eq!(json["ranking"][0]["win_rate"], 75.0);
        assert_eq!(json["ranking"][1]["node"], "http://a");
    }
}
