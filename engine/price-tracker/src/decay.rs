//! Exponential price math
//!
//! Growth multiplies by the growth rate once per unit bought; decay divides
//! by the decay rate once per unit sold. Both rates are expected to be
//! strictly positive, typically slightly above 1.
//!
//! Time-based relaxation uses a decay constant `λ = ln 2 / half_life`, so a
//! discrepancy `d` becomes `d · e^(-λt)` after `t` minutes.

use std::f64::consts::LN_2;

/// Decay constant for a half-life in minutes; 0 disables time decay
pub fn decay_constant(half_life_minutes: f64) -> f64 {
    if half_life_minutes > 0.0 {
        LN_2 / half_life_minutes
    } else {
        0.0
    }
}

/// `value · rate^n`
pub fn exponential_growth(value: f64, rate: f64, n: u64) -> f64 {
    value * rate.powf(n as f64)
}

/// `value / rate^n`
pub fn exponential_decay(value: f64, rate: f64, n: u64) -> f64 {
    value / rate.powf(n as f64)
}

/// `[v0, v0·r, v0·r², …]` with `n + 1` entries
pub fn growth_vector(initial: f64, rate: f64, n: usize) -> Vec<f64> {
    let mut vector = Vec::with_capacity(n + 1);
    let mut value = initial;
    vector.push(value);
    for _ in 0..n {
        value *= rate;
        vector.push(value);
    }
    vector
}

/// `[v0, v0/r, v0/r², …]` with `n + 1` entries
pub fn decay_vector(initial: f64, rate: f64, n: usize) -> Vec<f64> {
    let mut vector = Vec::with_capacity(n + 1);
    let mut value = initial;
    vector.push(value);
    for _ in 0..n {
        value /= rate;
        vector.push(value);
    }
    vector
}

/// Discrepancy left after `minutes` of relaxation
pub fn relax(discrepancy: f64, decay_constant: f64, minutes: u64) -> f64 {
    discrepancy * (-decay_constant * minutes as f64).exp()
}
