use crate::PricingError;
use dooh_core::FilmDuration;
use std::collections::BTreeSet;
use tracing::warn;

/// Merge catalog durations with an optional custom one.
///
/// Zero-second entries are dropped; the result is deduplicated and sorted
/// ascending. An empty result is an error rather than an implicit 0s film.
pub fn resolve_durations(
    film_durations: &BTreeSet<FilmDuration>,
    custom_duration: Option<FilmDuration>,
) -> Result<Vec<FilmDuration>, PricingError> {
    let resolved: BTreeSet<FilmDuration> = film_durations
        .iter()
        .copied()
        .chain(custom_duration)
        .filter(|d| d.secs() > 0)
        .collect();
    if resolved.is_empty() {
        warn!("proposal has no usable film duration");
        return Err(PricingError::InvalidDuration);
    }
    Ok(resolved.into_iter().collect())
}
