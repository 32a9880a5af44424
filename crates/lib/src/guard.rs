//! Single-slot request guard.
//!
//! Each panel allows at most one outstanding request. `begin` hands out a ticket tagged with
//! the current generation; `finish` accepts the completion only if that ticket is still the
//! latest one. `invalidate` bumps the generation so anything in flight is discarded when it lands.

/// Proof that a request was started; returned to `RequestGuard::finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub struct RequestGuard {
    generation: u64,
    in_flight: bool,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Claim the slot. Returns None when a request is already outstanding (blocked, not queued).
    pub fn begin(&mut self) -> Option<Ticket> {
        if self.in_flight {
            return None;
        }
        self.generation = self.generation.wrapping_add(1);
        self.in_flight = true;
        Some(Ticket {
            generation: self.generation,
        })
    }

    /// Release the slot for `ticket`. Returns false for a stale or already-finished ticket; the caller must drop that result.
    pub fn finish(&mut self, ticket: Ticket) -> bool {
        if !self.in_flight || ticket.generation != self.generation {
            return false;
        }
        self.in_flight = false;
        true
    }

    /// Forget the outstanding request (if any) and free the slot.
    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_begin_is_blocked_while_busy() {
        let mut guard = RequestGuard::new();
        let t = guard.begin().unwrap();
        assert!(guard.is_busy());
        assert!(guard.begin().is_none());
        assert!(guard.finish(t));
        assert!(!guard.is_busy());
        assert!(guard.begin().is_some());
    }

    #[test]
    fn stale_ticket_is_rejected_after_invalidate() {
        let mut guard = RequestGuard::new();
        let old = guard.begin().unwrap();
        guard.invalidate();
        let new = guard.begin().unwrap();
        assert!(!guard.finish(old));
        assert!(guard.is_busy());
        assert!(guard.finish(new));
    }

    #[test]
    fn finishing_twice_is_rejected_once_slot_moves_on() {
        let mut guard = RequestGuard::new();
        let t = guard.begin().unwrap();
        assert!(guard.finish(t));
        assert!(!guard.finish(t));
        let _next = guard.begin().unwrap();
        assert!(!guard.finish(t));
    }
}
