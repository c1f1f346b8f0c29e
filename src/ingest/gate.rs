use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Cooldown after a drop batch that includes add commands and a list refresh.
///
/// Some platforms deliver the `drop` phase of a single physical drop twice;
/// the second copy can land shortly after the first batch settles.
pub const DROP_COOLDOWN: Duration = Duration::from_millis(300);

/// Shortest cooldown that still absorbs the duplicate `drop` on its own.
pub const MIN_DROP_COOLDOWN: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct GateState {
    in_flight: bool,
    settled_at: Option<Instant>,
}

/// Re-entrancy latch for drop ingestion.
///
/// Closed while a batch is in flight and for `cooldown` after it settles.
#[derive(Debug)]
pub struct DropGate {
    cooldown: Duration,
    state: Mutex<GateState>,
}

impl DropGate {
    pub fn new(cooldown: Duration) -> Self {
        DropGate {
            cooldown: cooldown.max(MIN_DROP_COOLDOWN),
            state: Mutex::new(GateState::default()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Take the latch if it is open. The returned permit reopens it (after
    /// the cooldown) when dropped.
    pub fn try_acquire(&self) -> Option<DropPermit<'_>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.in_flight {
            return None;
        }
        if let Some(settled) = state.settled_at {
            if settled.elapsed() < self.cooldown {
                return None;
            }
        }
        state.in_flight = true;
        Some(DropPermit { gate: self })
    }

    pub fn is_open(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        !state.in_flight
            && state
                .settled_at
                .map(|t| t.elapsed() >= self.cooldown)
                .unwrap_or(true)
    }

    fn settle(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.in_flight = false;
        state.settled_at = Some(Instant::now());
    }
}

impl Default for DropGate {
    fn default() -> Self {
        DropGate::new(DROP_COOLDOWN)
    }
}

#[must_use = "the gate reopens as soon as the permit is dropped"]
pub struct DropPermit<'a> {
    gate: &'a DropGate,
}

impl Drop for DropPermit<'_> {
    fn drop(&mut self) {
        self.gate.settle();
    }
}
