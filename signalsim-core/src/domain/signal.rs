//! Trading signals — upstream model output, read-only to the engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which way a position points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn is_long(self) -> bool {
        matches!(self, Side::Long)
    }
}

/// One model reading for one asset at one timestamp.
///
/// `prob_positive`/`prob_negative` are the model's class probabilities for
/// an upward/downward move; `high_boundary`/`low_boundary` become the
/// position's profit/loss targets (fractional, e.g. 0.05 = +5%).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: i64,
    pub asset: String,
    pub side: Side,
    pub prob_positive: f64,
    pub prob_negative: f64,
    pub high_boundary: f64,
    pub low_boundary: f64,
    pub life_time_hours: u32,
}

impl Signal {
    /// The probability backing this signal's direction: positive-side for
    /// longs, negative-side for shorts.
    pub fn directional_prob(&self) -> f64 {
        match self.side {
            Side::Long => self.prob_positive,
            Side::Short => self.prob_negative,
        }
    }
}

/// Signal collection indexed by timestamp for O(1) per-tick lookup.
#[derive(Debug, Clone, Default)]
pub struct SignalStream {
    by_time: HashMap<i64, Vec<Signal>>,
    start: Option<i64>,
    end: Option<i64>,
}

impl SignalStream {
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> Self {
        let mut stream = Self::default();
        for signal in signals {
            stream.push(signal);
        }
        stream
    }

    pub fn push(&mut self, signal: Signal) {
        let ts = signal.timestamp;
        self.start = Some(self.start.map_or(ts, |s| s.min(ts)));
        self.end = Some(self.end.map_or(ts, |e| e.max(ts)));
        self.by_time.entry(ts).or_default().push(signal);
    }

    /// All signals whose timestamp equals `timestamp`.
    pub fn at(&self, timestamp: i64) -> &[Signal] {
        self.by_time.get(&timestamp).map_or(&[], Vec::as_slice)
    }

    /// Earliest signal timestamp, `None` when empty.
    pub fn start(&self) -> Option<i64> {
        self.start
    }

    /// Latest signal timestamp, `None` when empty.
    pub fn end(&self) -> Option<i64> {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.by_time.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_time.values().map(Vec::len).sum()
    }
}
