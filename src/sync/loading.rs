/// Token identifying one request within a domain. Only the latest one counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Idle,
    Loading,
    Success,
    Failure,
}

/// What to do with a response once it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The response answers the latest request; `LoadPhase` is `Success` or `Failure`.
    Current(LoadPhase),
    /// Superseded or torn down. Discard it.
    Stale,
}

/// Single-flight loading state for one concurrency domain.
///
/// `Idle -> Loading -> {Success, Failure} -> Idle`. The terminal phase is kept
/// in `last_outcome` while the domain itself returns to `Idle`. Domains never
/// share state; the engine holds one per data stream.
#[derive(Debug)]
pub struct LoadDomain {
    name: &'static str,
    phase: LoadPhase,
    last_outcome: Option<LoadPhase>,
    generation: u64,
    in_flight: Option<Generation>,
    closed: bool,
}

impl LoadDomain {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            phase: LoadPhase::Idle,
            last_outcome: None,
            generation: 0,
            in_flight: None,
            closed: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn last_outcome(&self) -> Option<LoadPhase> {
        self.last_outcome
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn current(&self) -> Generation {
        Generation(self.generation)
    }

    /// Claims the domain for a new request. `None` while another request is
    /// still outstanding: the new one is dropped, not queued.
    pub fn try_begin(&mut self) -> Option<Generation> {
        if self.closed {
            return None;
        }
        if let Some(outstanding) = self.in_flight {
            log::debug!(
                "[{}] dropping request, generation {} still in flight",
                self.name,
                outstanding.0
            );
            return None;
        }

        self.generation += 1;
        let generation = Generation(self.generation);
        self.in_flight = Some(generation);
        self.phase = LoadPhase::Loading;
        Some(generation)
    }

    /// Records the arrival of the response for `generation` and returns the
    /// domain to `Idle`.
    pub fn settle(&mut self, generation: Generation, succeeded: bool) -> Settlement {
        if self.in_flight == Some(generation) {
            self.in_flight = None;
            self.phase = LoadPhase::Idle;
        }

        if self.closed || generation != self.current() {
            log::debug!("[{}] discarding stale generation {}", self.name, generation.0);
            return Settlement::Stale;
        }

        let outcome = if succeeded {
            LoadPhase::Success
        } else {
            LoadPhase::Failure
        };
        self.last_outcome = Some(outcome);
        Settlement::Current(outcome)
    }

    /// Makes whatever is in flight stale. The slot stays occupied until that
    /// response settles, so single-flight still holds.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    /// Teardown. Nothing can begin afterwards and nothing settles as current.
    pub fn close(&mut self) {
        self.invalidate();
        self.closed = true;
    }
}
