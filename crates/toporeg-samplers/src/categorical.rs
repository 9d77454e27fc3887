//! Categorical sampling over unnormalized weights.
//!
//! Callers build a flat buffer of log-masses, temper it in place with
//! [`temper_log_weights`], then draw with [`sample_index`]. Working from the
//! maximum log-mass keeps the largest weight at exactly `1.0`, so the buffer
//! never underflows to all zeros unless every entry is structurally `-inf`.

use rand::Rng;

/// Turns log-masses into tempered linear weights, in place.
///
/// Each entry becomes `exp((l - max) * inverse_temperature)`, which is the
/// normalized probability raised to `1/T` up to a common factor.
///
/// # Returns
///
/// The sum of the resulting weights, or `0.0` when every entry is `-inf`
/// (the buffer is then zeroed).
pub fn temper_log_weights(weights: &mut [f64], inverse_temperature: f64) -> f64 {
    let max = weights.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        weights.iter_mut().for_each(|w| *w = 0.0);
        return 0.0;
    }

    let mut total = 0.0;
    for w in weights.iter_mut() {
        *w = ((*w - max) * inverse_temperature).exp();
        total += *w;
    }
    total
}

/// Inverse-CDF draw from linear weights summing to `total`.
///
/// A single uniform draw is scaled by `total` and compared against the
/// running sum. When rounding leaves the threshold above the final running
/// sum, the last bucket with positive weight absorbs it; a zero-weight bucket
/// is never returned.
///
/// Returns `None` when `total` is not a positive finite number.
pub fn sample_index<R: Rng + ?Sized>(weights: &[f64], total: f64, rng: &mut R) -> Option<usize> {
    if !(total > 0.0 && total.is_finite()) {
        return None;
    }

    let threshold = rng.gen::<f64>() * total;
    let mut acc = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        acc += w;
        if threshold < acc {
            return Some(i);
        }
    }
    weights.iter().rposition(|&w| w > 0.0)
}

/// Index of the largest weight; ties go to the lowest index.
pub fn argmax(weights: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &w) in weights.iter().enumerate() {
        if w.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if w <= b => {}
            _ => best = Some((i, w)),
        }
    }
    best.map(|(i, _)| i)
}
