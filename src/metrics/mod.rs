//! Metrics and observability module
//!
//! Counters and gauges for routing activity, exposed through the `metrics`
//! facade so any exporter the host installs picks them up.
//!
//! Key metrics exposed:
//! - Advertisements, requests and handoffs sent
//! - Handoff outcomes (completed, timed out)
//! - Deliveries confirmed and messages received
//! - Queue depth, expiries and rejected admissions

pub mod recorder;

pub use recorder::{init_metrics, set_queue_depth};
