//! Heart-rate imputation over one sensor's time-ordered series

use vitals_core::LeadingGapPolicy;

/// Number of preceding readings averaged to fill a gap.
pub const IMPUTATION_WINDOW: usize = 3;

/// Fill the gaps of a time-ordered series.
///
/// A missing value at position `i` becomes the mean of the observed values
/// among positions `i-3..i`. Filled values never feed later windows. When
/// that window holds no observation the policy decides: `Drop` leaves the
/// gap (`None`), `BackFill` takes the next observed value.
pub fn impute_series(observed: &[Option<f64>], policy: LeadingGapPolicy) -> Vec<Option<f64>> {
    observed
        .iter()
        .enumerate()
        .map(|(i, value)| {
            value
                .or_else(|| trailing_mean(&observed[i.saturating_sub(IMPUTATION_WINDOW)..i]))
                .or_else(|| match policy {
                    LeadingGapPolicy::Drop => None,
                    LeadingGapPolicy::BackFill => observed[i + 1..].iter().find_map(|v| *v),
                })
        })
        .collect()
}

fn trailing_mean(window: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = window
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
