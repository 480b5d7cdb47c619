//! Session history summary

use ns_common::api::SessionRecord;
use ns_common::risk::interpret_with_class;
use std::fmt;

/// Sessions considered for the trend
pub const TREND_WINDOW: usize = 5;

/// Score change below which the trend is stable
pub const TREND_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Stable,
    Worsening,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Stable => write!(f, "stable"),
            Trend::Worsening => write!(f, "worsening"),
        }
    }
}

/// Trend over the most recent sessions (given newest first)
///
/// Compares the oldest and newest of the last five; needs at least two.
pub fn trend(sessions: &[SessionRecord]) -> Option<Trend> {
    let window = &sessions[..sessions.len().min(TREND_WINDOW)];
    let (newest, oldest) = match window {
        [newest, .., oldest] => (newest.risk_score, oldest.risk_score),
        _ => return None,
    };

    let delta = newest - oldest;
    Some(if delta <= -TREND_THRESHOLD {
        Trend::Improving
    } else if delta >= TREND_THRESHOLD {
        Trend::Worsening
    } else {
        Trend::Stable
    })
}

/// One history line, e.g. `2025-03-18 09:30  15%  Low Risk`
pub fn format_entry(session: &SessionRecord) -> String {
    let result = interpret_with_class(session.risk_score, session.risk_class());
    format!(
        "{}  {:>4}  {}",
        session.recorded_at.format("%Y-%m-%d %H:%M"),
        result.display_percent(),
        result.risk_class
    )
}
