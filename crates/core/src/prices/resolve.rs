use crate::prices::series::PriceObservation;
use chrono::NaiveDate;

/// A forward match further than this past its target is treated as no match.
pub const FORWARD_TOLERANCE_DAYS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Greatest date <= target.
    OnOrBefore,
    /// Least date >= target, within [`FORWARD_TOLERANCE_DAYS`].
    OnOrAfter,
}

/// Finds the price observation nearest to `target` in the given direction.
///
/// `series` must be sorted by date descending (see [`crate::prices::PriceSeries`]). When a date
/// appears more than once, the first one in sort order is returned.
pub fn resolve(
    series: &[PriceObservation],
    target: NaiveDate,
    direction: Direction,
) -> Option<&PriceObservation> {
    match direction {
        Direction::OnOrBefore => {
            let idx = series.partition_point(|o| o.date > target);
            series.get(idx)
        }
        Direction::OnOrAfter => {
            // Everything before `end` is >= target; the last of them is the nearest.
            let end = series.partition_point(|o| o.date >= target);
            let nearest = series.get(end.checked_sub(1)?)?;
            if (nearest.date - target).num_days() > FORWARD_TOLERANCE_DAYS {
                return None;
            }
            let first_of_date = series.partition_point(|o| o.date > nearest.date);
            series.get(first_of_date)
        }
    }
}
