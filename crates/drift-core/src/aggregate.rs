use crate::types::{DependencyResult, Summary};
use time::OffsetDateTime;

/// Sum drift and pulse over all dependencies, stamped with the current time.
pub fn aggregate(results: &[DependencyResult]) -> Summary {
    aggregate_at(results, OffsetDateTime::now_utc())
}

/// Same as [`aggregate`] with an explicit timestamp. Absent values count as 0.
pub fn aggregate_at(results: &[DependencyResult], date: OffsetDateTime) -> Summary {
    let (drift, pulse) = results.iter().fold((0.0, 0.0), |(drift, pulse), dep| {
        (
            drift + dep.drift().unwrap_or(0.0),
            pulse + dep.pulse().unwrap_or(0.0),
        )
    });
    Summary { drift, pulse, date }
}
