use serde::Serialize;

use crate::error::{PipelineError, Result};

/// One contiguous interval `[start, end)` in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSlice {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl TimeSlice {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Splits `total` seconds into `count` equal slices.
///
/// Equal share is a deliberate simplification: it ignores sentence length
/// and narration pacing. Content-aware policies go through
/// [`allocate_weighted`].
pub fn allocate(total: f64, count: usize) -> Result<Vec<TimeSlice>> {
    if count == 0 {
        return Err(PipelineError::InvalidInput(
            "slice count must be positive".to_string(),
        ));
    }
    allocate_weighted(total, &vec![1.0; count])
}

/// Splits `total` seconds proportionally to `weights`.
///
/// Boundaries are taken from the running weight sum rather than by adding
/// slice durations, so no error accumulates; the last slice always ends at
/// `total` exactly.
pub fn allocate_weighted(total: f64, weights: &[f64]) -> Result<Vec<TimeSlice>> {
    if !total.is_finite() || total <= 0.0 {
        return Err(PipelineError::InvalidInput(format!(
            "total duration must be positive, got {}",
            total
        )));
    }
    if weights.is_empty() {
        return Err(PipelineError::InvalidInput(
            "slice count must be positive".to_string(),
        ));
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w <= 0.0) {
        return Err(PipelineError::InvalidInput(format!(
            "slice weights must be positive, got {}",
            w
        )));
    }

    let weight_sum: f64 = weights.iter().sum();
    if !weight_sum.is_finite() {
        return Err(PipelineError::InvalidInput(
            "slice weights overflow".to_string(),
        ));
    }
    let last = weights.len() - 1;
    let mut slices = Vec::with_capacity(weights.len());
    let mut cumulative = 0.0_f64;
    let mut start = 0.0_f64;
    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        let end = if index == last {
            total
        } else {
            total * (cumulative / weight_sum)
        };
        if end <= start {
            return Err(PipelineError::InvalidInput(format!(
                "{} seconds is too short to split into {} slices",
                total,
                weights.len()
            )));
        }
        slices.push(TimeSlice { index, start, end });
        start = end;
    }
    Ok(slices)
}
