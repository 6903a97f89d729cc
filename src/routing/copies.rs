//! Copy accounting: budget halving and lifetime policies

use std::fmt;
use std::time::Duration;

/// ⌈n/2⌉. Both halves of an odd budget round up, so a split of `n` may
/// hand out `n + 1` copies in total.
pub fn ceiling_halve(n: u16) -> u16 {
    n / 2 + n % 2
}

/// How long a queued entry lives once it holds copies
pub trait LifetimePolicy: fmt::Debug + Send + Sync {
    /// `queue_len` is the store occupancy at the time of the update
    fn lifetime_for(&self, copies: u16, queue_len: usize) -> Duration;
}

/// Constant lifetime regardless of the copy budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedLifetime {
    pub lifetime: Duration,
}

impl FixedLifetime {
    pub fn new(lifetime: Duration) -> Self {
        Self { lifetime }
    }
}

impl LifetimePolicy for FixedLifetime {
    fn lifetime_for(&self, _copies: u16, _queue_len: usize) -> Duration {
        self.lifetime
    }
}

/// Lifetime proportional to the number of halvings left and the time one
/// advertisement cycle takes:
/// `2 * log2(copies) * (queue_len * packet_delay + queue_delay)`.
///
/// Never shorter than `floor`; a budget of 0 or 1 has no halvings left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaledLifetime {
    pub packet_delay: Duration,
    pub queue_delay: Duration,
    pub floor: Duration,
}

impl LifetimePolicy for ScaledLifetime {
    fn lifetime_for(&self, copies: u16, queue_len: usize) -> Duration {
        if copies <= 1 {
            return self.floor;
        }
        let cycle = self.packet_delay * queue_len as u32 + self.queue_delay;
        let halvings = 2.0 * f64::from(copies).log2();
        cycle.mul_f64(halvings).max(self.floor)
    }
}
