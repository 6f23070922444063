//! Volatility scoring (spec §4.3). Pure functions over a selection's update
//! history plus the `VolatilityConfig` that resolves the spec's Open Question
//! on thresholds and window default.

use super::types::OddsUpdate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
    Extreme,
}

/// Conservative defaults per spec §9's Open Question: thresholds exposed as
/// configuration rather than hardcoded, with the spec's own numbers as the
/// operator-overridable default.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolatilityConfig {
    pub window_minutes: i64,
    pub medium_threshold: f64,
    pub high_threshold: f64,
    pub extreme_threshold: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        VolatilityConfig {
            window_minutes: 10,
            medium_threshold: 10.0,
            high_threshold: 25.0,
            extreme_threshold: 50.0,
        }
    }
}

impl VolatilityConfig {
    pub fn level_for_score(&self, score: f64) -> VolatilityLevel {
        if score >= self.extreme_threshold {
            VolatilityLevel::Extreme
        } else if score >= self.high_threshold {
            VolatilityLevel::High
        } else if score >= self.medium_threshold {
            VolatilityLevel::Medium
        } else {
            VolatilityLevel::Low
        }
    }
}

/// score = meanChange * (1 + min(frequency, 5)) over updates within
/// `window_minutes` of `now`. Fewer than two updates in the window scores 0.
pub fn score(updates: &[OddsUpdate], now: DateTime<Utc>, window_minutes: i64) -> f64 {
    let window = chrono::Duration::minutes(window_minutes.max(1));
    let cutoff = now - window;
    let in_window: Vec<&OddsUpdate> = updates.iter().filter(|u| u.updated_at >= cutoff).collect();
    if in_window.len() < 2 {
        return 0.0;
    }
    let mean_change: f64 = in_window
        .iter()
        .map(|u| u.percentage_change().abs())
        .sum::<f64>()
        / in_window.len() as f64;
    let frequency = in_window.len() as f64 / window_minutes.max(1) as f64;
    mean_change * (1.0 + frequency.min(5.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odds::types::Source;
    use rust_decimal::Decimal;

    fn update(previous: i64, new: i64, minutes_ago: i64, now: DateTime<Utc>) -> OddsUpdate {
        OddsUpdate {
            previous_odds: Decimal::new(previous, 2),
            new_odds: Decimal::new(new, 2),
            source: Source::Manual,
            reason: None,
            updated_at: now - chrono::Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn fewer_than_two_updates_scores_zero() {
        let now = Utc::now();
        let updates = vec![update(200, 280, 1, now)];
        assert_eq!(score(&updates, now, 30), 0.0);
    }

    #[test]
    fn volatile_swings_score_high() {
        let now = Utc::now();
        let updates = vec![
            update(200, 280, 9, now),
            update(280, 196, 7, now),
            update(196, 274, 5, now),
            update(274, 192, 3, now),
            update(192, 269, 2, now),
            update(269, 188, 1, now),
        ];
        let config = VolatilityConfig::default();
        let s = score(&updates, now, config.window_minutes);
        assert!(s >= config.extreme_threshold, "expected extreme score, got {s}");
        assert_eq!(config.level_for_score(s), VolatilityLevel::Extreme);
    }

    #[test]
    fn stale_updates_outside_window_ignored() {
        let now = Utc::now();
        let updates = vec![update(200, 280, 120, now), update(280, 200, 90, now)];
        assert_eq!(score(&updates, now, 30), 0.0);
    }
}
