//! Configuration translation
//!
//! This module handles:
//! * Tolerant coercion of raw string values (integers, booleans, durations)
//! * Resolution of flat option maps into [`InstanceOptions`]
//! * Topology selection and pool-size scaling

mod coerce;
mod resolve;

pub use resolve::{
    InstanceOptions, OptionMap, Timeout, Topology, DEFAULT_DIAL_TIMEOUT, DEFAULT_MAX_RETRIES,
    DEFAULT_MAX_RETRY_BACKOFF, DEFAULT_MIN_RETRY_BACKOFF, DEFAULT_PORT, DEFAULT_READ_TIMEOUT,
    DEFAULT_WRITE_TIMEOUT,
};
