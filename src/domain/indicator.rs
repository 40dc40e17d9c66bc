//! RSI (Relative Strength Index) with Wilder smoothing.
//!
//! - Seed averages: simple mean of gains/losses over the first `length`
//!   price differences
//! - Subsequent: avg = (prev_avg * (length-1) + current) / length
//! - RSI = 100 - (100 / (1 + avg_gain / avg_loss)); avg_loss == 0 → 100
//!
//! Output is index-aligned with the input closes. Positions before index
//! `length` are `None` (warm-up); an input shorter than `length + 1` closes
//! produces an all-`None` series rather than an error.

/// Smallest accepted RSI period.
pub const MIN_RSI_LENGTH: i64 = 2;
/// Largest accepted RSI period.
pub const MAX_RSI_LENGTH: i64 = 100;
/// Period used when a rule does not specify one.
pub const DEFAULT_RSI_LENGTH: usize = 14;

/// Clamp a user-supplied period to the supported range.
pub fn clamp_rsi_length(raw: i64) -> usize {
    raw.clamp(MIN_RSI_LENGTH, MAX_RSI_LENGTH) as usize
}

/// Compute the RSI series for `closes`. Single pass, O(n), recomputed
/// wholesale on every call.
pub fn rsi(closes: &[f64], length: usize) -> Vec<Option<f64>> {
    let mut out: Vec<Option<f64>> = vec![None; closes.len()];
    if length == 0 || closes.len() < length + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..=length {
        let diff = closes[i] - closes[i - 1];
        if diff >= 0.0 {
            avg_gain += diff;
        } else {
            avg_loss += -diff;
        }
    }

    avg_gain /= length as f64;
    avg_loss /= length as f64;
    out[length] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in length + 1..closes.len() {
        let diff = closes[i] - closes[i - 1];
        let gain = if diff > 0.0 { diff } else { 0.0 };
        let loss = if diff < 0.0 { -diff } else { 0.0 };

        avg_gain = (avg_gain * (length as f64 - 1.0) + gain) / length as f64;
        avg_loss = (avg_loss * (length as f64 - 1.0) + loss) / length as f64;
        out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
