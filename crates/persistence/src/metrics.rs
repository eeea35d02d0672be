//! Database metrics collection.

use metrics::{gauge, histogram};
use sqlx::PgPool;
use std::time::Instant;

/// Record database query duration.
pub fn record_query_duration(query_name: &'static str, outcome: &'static str, duration_secs: f64) {
    histogram!(
        "database_query_duration_seconds",
        "query" => query_name,
        "outcome" => outcome
    )
    .record(duration_secs);
}

/// Record database connection pool metrics.
///
/// Called whenever the metrics endpoint is scraped.
pub fn record_pool_metrics(pool: &PgPool) {
    let size = pool.size() as usize;
    let idle = pool.num_idle();
    let active = size.saturating_sub(idle);

    gauge!("database_connections_active").set(active as f64);
    gauge!("database_connections_idle").set(idle as f64);
    gauge!("database_connections_total").set(size as f64);
}

/// Times one query and records it under its name and outcome.
///
/// ```ignore
/// let timer = QueryTimer::new("find_request_by_id");
/// let result = sqlx::query_as::<_, EmergencyRequestEntity>(...).fetch_optional(&pool).await;
/// timer.finish(&result);
/// ```
pub struct QueryTimer {
    query_name: &'static str,
    start: Instant,
}

impl QueryTimer {
    pub fn new(query_name: &'static str) -> Self {
        Self {
            query_name,
            start: Instant::now(),
        }
    }

    pub fn outcome<T, E>(result: &Result<T, E>) -> &'static str {
        if result.is_ok() {
            "ok"
        } else {
            "error"
        }
    }

    /// Records the elapsed time, labelled by whether `result` succeeded.
    pub fn finish<T, E>(self, result: &Result<T, E>) {
        let duration = self.start.elapsed().as_secs_f64();
        record_query_duration(self.query_name, Self::outcome(result), duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_timer_keeps_name() {
        let timer = QueryTimer::new("find_request_by_id");
        assert_eq!(timer.query_name, "find_request_by_id");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(QueryTimer::outcome::<(), ()>(&Ok(())), "ok");
        assert_eq!(QueryTimer::outcome::<(), ()>(&Err(())), "error");
    }

    #[test]
    fn test_finish_without_recorder_is_harmless() {
        let timer = QueryTimer::new("noop");
        timer.finish::<(), ()>(&Ok(()));
    }
}
