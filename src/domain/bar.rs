//! OHLC candle representation.

use serde::{Deserialize, Serialize};

/// One OHLC candle. `t` is the bar open time in milliseconds since the
/// Unix epoch. Sequences are time-ordered ascending with no duplicate
/// timestamps; bars are immutable once fetched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub t: i64,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
}

/// Extract the close series from a bar sequence.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.c).collect()
}
