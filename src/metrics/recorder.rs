//! Metrics recorder for spray-and-wait routing
//!
//! Records routing activity through the `metrics` facade. Without an
//! installed recorder every call is a no-op.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use std::sync::atomic::{AtomicBool, Ordering};

static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize metric descriptions (call once at startup)
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return; // Already initialized
    }

    describe_counter!(
        "spraywait_adverts_sent_total",
        "Advertisements broadcast by the scheduler"
    );
    describe_counter!(
        "spraywait_requests_sent_total",
        "Unicast requests sent in answer to advertisements"
    );
    describe_counter!(
        "spraywait_handoffs_started_total",
        "Reliable handoffs initiated"
    );
    describe_counter!(
        "spraywait_handoffs_completed_total",
        "Reliable handoffs acknowledged by the relay"
    );
    describe_counter!(
        "spraywait_handoffs_timed_out_total",
        "Reliable handoffs that exhausted their retransmissions"
    );
    describe_counter!(
        "spraywait_copies_granted_total",
        "Handoffs received that granted copies to this node"
    );
    describe_counter!(
        "spraywait_deliveries_confirmed_total",
        "Entries removed because the destination confirmed receipt"
    );
    describe_counter!(
        "spraywait_messages_received_total",
        "Messages delivered to this node as destination"
    );
    describe_counter!(
        "spraywait_entries_expired_total",
        "Queue entries removed by their expiry timer"
    );
    describe_counter!(
        "spraywait_admissions_rejected_total",
        "Entries refused because the queue was full"
    );
    describe_counter!(
        "spraywait_frames_ignored_total",
        "Inbound frames dropped without a state change"
    );

    describe_counter!(
        "spraywait_events_dropped_total",
        "Routing events dropped because the subscriber was not reading"
    );

    describe_gauge!("spraywait_queue_depth", "Current number of queued entries");
}

// ============== Scheduler ==============

pub fn record_advert_sent() {
    counter!("spraywait_adverts_sent_total").increment(1);
}

// ============== Routing ==============

pub fn record_request_sent() {
    counter!("spraywait_requests_sent_total").increment(1);
}

pub fn record_handoff_started() {
    counter!("spraywait_handoffs_started_total").increment(1);
}

pub fn record_handoff_completed() {
    counter!("spraywait_handoffs_completed_total").increment(1);
}

pub fn record_handoff_timed_out() {
    counter!("spraywait_handoffs_timed_out_total").increment(1);
}

pub fn record_copies_granted() {
    counter!("spraywait_copies_granted_total").increment(1);
}

pub fn record_delivery_confirmed() {
    counter!("spraywait_deliveries_confirmed_total").increment(1);
}

pub fn record_message_received() {
    counter!("spraywait_messages_received_total").increment(1);
}

/// Record a dropped inbound frame with the reason it was dropped
pub fn record_frame_ignored(reason: &'static str) {
    counter!("spraywait_frames_ignored_total", "reason" => reason).increment(1);
}

// ============== Queue ==============

pub fn record_entries_expired(count: usize) {
    counter!("spraywait_entries_expired_total").increment(count as u64);
}

pub fn record_admission_rejected() {
    counter!("spraywait_admissions_rejected_total").increment(1);
}

// ============== Node ==============

pub fn record_event_dropped() {
    counter!("spraywait_events_dropped_total").increment(1);
}

pub fn set_queue_depth(depth: usize) {
    gauge!("spraywait_queue_depth").set(depth as f64);
}
