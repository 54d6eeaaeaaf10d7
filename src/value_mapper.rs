//! Logarithmic mapping between a 0–100 slider and real-world magnitudes.
//!
//! Spend fields span 0 to several lakh; a linear slider would spend most of
//! its travel on amounts nobody enters. The log curve keeps small values
//! finely adjustable and large values coarse.

use crate::catalog::LOUNGE_CHOICES;
use crate::errors::AppError;

pub const SLIDER_MAX: u32 = 100;

fn log_span(max: u64) -> Result<f64, AppError> {
    if max == 0 {
        return Err(AppError::BadRequest(
            "Slider maximum must be greater than zero".to_string(),
        ));
    }
    Ok(((max as f64) + 1.0).log10())
}

/// Slider position (clamped to 0..=100) to a real value in `0..=max`.
pub fn to_display(ui_position: u32, max: u64) -> Result<u64, AppError> {
    let span = log_span(max)?;
    let ui = ui_position.min(SLIDER_MAX) as f64;
    let value = 10f64.powf((ui / 100.0) * span) - 1.0;
    Ok((value.round().max(0.0) as u64).min(max))
}

/// Real value (clamped to `0..=max`) to a slider position in 0..=100.
pub fn to_slider(value: u64, max: u64) -> Result<u32, AppError> {
    let span = log_span(max)?;
    let clamped = value.min(max) as f64;
    let position = ((clamped + 1.0).log10() / span * 100.0).round();
    Ok((position as u32).min(SLIDER_MAX))
}

/// Compact rupee rendering: `₹1.5L`, `₹12K`, `₹950`. Halves round up.
pub fn format_currency(amount: u64) -> String {
    if amount >= 100_000 {
        let tenths = (amount + 5_000) / 10_000;
        format!("₹{}.{}L", tenths / 10, tenths % 10)
    } else if amount >= 1_000 {
        format!("₹{}K", (amount + 500) / 1_000)
    } else {
        format!("₹{}", amount)
    }
}

/// Nearest offered lounge choice; ties go to the smaller choice.
pub fn snap_lounge_visits(visits: u64) -> u64 {
    LOUNGE_CHOICES
        .iter()
        .map(|choice| choice.value)
        .min_by_key(|value| (value.abs_diff(visits), *value))
        .unwrap_or(0)
}
