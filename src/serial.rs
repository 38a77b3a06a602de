//! Protocol serials
//!
//! Every extension protocol of the compositor (alien pings, alien configure
//! handshakes, ...) draws its serials from one shared [`SerialGenerator`] so
//! that serials are globally monotonic across extensions.

use std::sync::atomic::{AtomicU32, Ordering};

/// A serial whose ordering takes the wrap-around of the counter into account.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Serial(u32);

impl Serial {
    /// Raw wire value
    pub fn value(self) -> u32 {
        self.0
    }

    /// True if `self` was generated after `other`, or is `other`.
    pub fn is_no_older_than(self, other: Serial) -> bool {
        other <= self
    }
}

impl PartialOrd for Serial {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        let distance = self.0.abs_diff(other.0);
        if distance < u32::MAX / 2 {
            self.0.partial_cmp(&other.0)
        } else {
            // wrapped, invert
            other.0.partial_cmp(&self.0)
        }
    }
}

impl From<u32> for Serial {
    fn from(value: u32) -> Self {
        Serial(value)
    }
}

impl From<Serial> for u32 {
    fn from(serial: Serial) -> u32 {
        serial.0
    }
}

/// Issues increasing 32-bit serials. Zero is never handed out.
#[derive(Debug)]
pub struct SerialGenerator {
    next: AtomicU32,
}

impl Default for SerialGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Generator whose first serial is `first` (0 is bumped to 1).
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    /// Retrieve the next serial
    pub fn next_serial(&self) -> Serial {
        let _ = self
            .next
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::SeqCst);
        Serial(self.next.fetch_add(1, Ordering::AcqRel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_start_at_one() {
        let serials = SerialGenerator::new();
        assert_eq!(serials.next_serial().value(), 1);
        assert_eq!(serials.next_serial().value(), 2);
    }

    #[test]
    fn consecutive_serials_are_ordered() {
        let serials = SerialGenerator::new();
        let first = serials.next_serial();
        for _ in 0..100 {
            let _ = serials.next_serial();
        }
        let later = serials.next_serial();
        assert!(first < later);
        assert!(later.is_no_older_than(first));
        assert!(!first.is_no_older_than(later));
    }

    #[test]
    fn wrap_around_skips_zero_and_keeps_order() {
        let serials = SerialGenerator::starting_at(u32::MAX);
        let last = serials.next_serial();
        let wrapped = serials.next_serial();
        assert_eq!(last.value(), u32::MAX);
        assert_eq!(wrapped.value(), 1);
        assert!(last < wrapped);
    }
}
