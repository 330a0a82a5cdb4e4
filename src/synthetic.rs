use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::CumulativeIndex;

// daily step bounds; always > -1 so the walk stays positive
const STEP_LOW: f64 = -0.015;
const STEP_HIGH: f64 = 0.0155;

/// Seeded geometric random walk over the weekdays from `start` to `end`.
/// The first weekday sits at 1.0; at least one point is always produced.
pub fn random_walk(start: NaiveDate, end: NaiveDate, seed: u64) -> CumulativeIndex {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut steps = Vec::new();
    let mut date = start;
    while date <= end {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            let r = if steps.is_empty() {
                0.0
            } else {
                rng.gen_range(STEP_LOW..STEP_HIGH)
            };
            steps.push((date, r));
        }
        date += Duration::days(1);
    }
    if steps.is_empty() {
        steps.push((start, 0.0));
    }
    CumulativeIndex::compound(steps)
}
