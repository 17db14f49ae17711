//! Latency-compensated buzz arbitration.
//!
//! Each buzz carries the client's wall-clock timestamp and its self-reported
//! round-trip latency. Half the (clamped) latency is subtracted from the
//! timestamp so players on slow links are not structurally beaten to the
//! buzzer, while the clamp keeps an inflated latency report from buying more
//! than a fixed head start.

use indexmap::IndexMap;

use crate::state::session::Buzz;

/// Compensated timestamp for one buzz: reported latency is clamped to
/// `max_compensation_ms`, then half of it is credited back.
pub fn adjusted_timestamp(
    client_timestamp_ms: u64,
    reported_latency_ms: u64,
    max_compensation_ms: u64,
) -> f64 {
    let clamped = reported_latency_ms.min(max_compensation_ms);
    client_timestamp_ms as f64 - clamped as f64 / 2.0
}

/// Pick the winning buzz: smallest adjusted timestamp, and on an exact tie
/// the earliest arrival keeps the win (the scan only replaces on strictly
/// smaller values).
pub fn earliest(buzzes: &IndexMap<String, Buzz>) -> Option<&str> {
    let mut winner: Option<(&str, f64)> = None;
    for (player_id, buzz) in buzzes {
        match winner {
            Some((_, best)) if buzz.adjusted_timestamp_ms >= best => {}
            _ => winner = Some((player_id.as_str(), buzz.adjusted_timestamp_ms)),
        }
    }
    winner.map(|(player_id, _)| player_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_COMPENSATION_MS: u64 = 300;

    fn buzz(client_timestamp_ms: u64, reported_latency_ms: u64) -> Buzz {
        Buzz {
            client_timestamp_ms,
            reported_latency_ms,
            adjusted_timestamp_ms: adjusted_timestamp(
                client_timestamp_ms,
                reported_latency_ms,
                MAX_COMPENSATION_MS,
            ),
        }
    }

    #[test]
    fn compensation_subtracts_half_the_latency() {
        assert_eq!(adjusted_timestamp(1_000, 100, MAX_COMPENSATION_MS), 950.0);
        assert_eq!(adjusted_timestamp(1_000, 0, MAX_COMPENSATION_MS), 1_000.0);
    }

    #[test]
    fn compensation_is_clamped() {
        // A huge latency claim is worth at most 150ms.
        assert_eq!(
            adjusted_timestamp(1_000, 10_000, MAX_COMPENSATION_MS),
            850.0
        );
        assert_eq!(adjusted_timestamp(1_000, 300, MAX_COMPENSATION_MS), 850.0);
    }

    #[test]
    fn earliest_adjusted_timestamp_wins() {
        let mut buzzes = IndexMap::new();
        buzzes.insert("slow-link".to_string(), buzz(120, 80)); // adjusted 80
        buzzes.insert("fast-link".to_string(), buzz(100, 0)); // adjusted 100

        assert_eq!(earliest(&buzzes), Some("slow-link"));
    }

    #[test]
    fn exact_tie_goes_to_first_arrival() {
        let mut buzzes = IndexMap::new();
        buzzes.insert("first".to_string(), buzz(100, 0));
        buzzes.insert("second".to_string(), buzz(100, 0));

        assert_eq!(earliest(&buzzes), Some("first"));
    }

    #[test]
    fn inflated_latency_cannot_beat_honest_buzz() {
        let mut buzzes = IndexMap::new();
        buzzes.insert("honest".to_string(), buzz(100, 40)); // adjusted 80
        buzzes.insert("inflated".to_string(), buzz(240, 10_000)); // adjusted 90

        assert_eq!(earliest(&buzzes), Some("honest"));
    }

    #[test]
    fn empty_map_has_no_winner() {
        let buzzes: IndexMap<String, Buzz> = IndexMap::new();
        assert_eq!(earliest(&buzzes), None);
    }
}
