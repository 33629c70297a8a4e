//! Metrics for observability
//!
//! Thin helpers over the `metrics` macros so call sites stay one-liners and
//! metric names live in a single place. All metrics are prefixed with
//! `redis_fleet_`.

/// Counter helpers
pub mod counters {
    /// An instance was registered.
    pub fn instance_registered() {
        metrics::counter!("redis_fleet_instances_registered_total").increment(1);
    }

    /// An instance was removed from the registry.
    pub fn instance_removed() {
        metrics::counter!("redis_fleet_instances_removed_total").increment(1);
    }

    /// An add was rejected because the name was already taken.
    pub fn duplicate_name() {
        metrics::counter!("redis_fleet_duplicate_name_total").increment(1);
    }

    /// A config value could not be coerced and degraded to a zero value.
    pub fn translation_warning(key: &str) {
        metrics::counter!(
            "redis_fleet_translation_warnings_total",
            "key" => key.to_string()
        )
        .increment(1);
    }

    /// Closing an instance during removal or shutdown failed.
    pub fn close_error() {
        metrics::counter!("redis_fleet_close_errors_total").increment(1);
    }
}

/// Gauge helpers
pub mod gauges {
    /// Number of live instances currently held by registries.
    pub fn instances(delta: i64) {
        if delta >= 0 {
            metrics::gauge!("redis_fleet_instances").increment(delta as f64);
        } else {
            metrics::gauge!("redis_fleet_instances").decrement((-delta) as f64);
        }
    }
}
