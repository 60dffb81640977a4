//! Readiness handshake between the orchestrator and its workers.
//!
//! Every worker holds a [`GateTicket`]. Once its endpoint is up it calls
//! [`GateTicket::arrive_and_wait`] and blocks. The orchestrator waits in
//! [`StartGate::wait_ready`] until all tickets have either arrived or been
//! dropped unused (a worker that failed or panicked during setup), then opens
//! or aborts the gate for everyone at once.
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Open,
    Aborted,
}

#[derive(Debug)]
struct GateState {
    arrived: usize,
    withdrawn: usize,
    phase: Phase,
}

/// Outcome of [`StartGate::wait_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub arrived: usize,
    pub withdrawn: usize,
}

impl Readiness {
    pub fn all_arrived(&self) -> bool {
        self.withdrawn == 0
    }
}

#[derive(Debug)]
pub struct StartGate {
    parties: usize,
    state: Mutex<GateState>,
    changed: Condvar,
}

impl StartGate {
    pub fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(GateState {
                arrived: 0,
                withdrawn: 0,
                phase: Phase::Waiting,
            }),
            changed: Condvar::new(),
        }
    }

    /// A gate that lets anyone through, for running a worker on its own.
    pub fn opened() -> Self {
        let gate = Self::new(0);
        gate.open();
        gate
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    pub fn ticket(&self) -> GateTicket<'_> {
        GateTicket {
            gate: self,
            used: false,
        }
    }

    /// Blocks until every party has arrived or withdrawn.
    pub fn wait_ready(&self) -> Readiness {
        let mut state = self.lock();
        while state.arrived + state.withdrawn < self.parties {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Readiness {
            arrived: state.arrived,
            withdrawn: state.withdrawn,
        }
    }

    /// Like [`wait_ready`](Self::wait_ready) but gives up after `timeout`,
    /// returning `None`.
    pub fn wait_ready_timeout(&self, timeout: Duration) -> Option<Readiness> {
        let state = self.lock();
        let (state, result) = self
            .changed
            .wait_timeout_while(state, timeout, |s| {
                s.arrived + s.withdrawn < self.parties
            })
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() {
            return None;
        }
        Some(Readiness {
            arrived: state.arrived,
            withdrawn: state.withdrawn,
        })
    }

    /// Releases every waiting party into the run.
    pub fn open(&self) {
        self.set_phase(Phase::Open);
    }

    /// Releases every waiting party with the instruction not to run.
    pub fn abort(&self) {
        self.set_phase(Phase::Aborted);
    }

    pub fn is_open(&self) -> bool {
        self.lock().phase == Phase::Open
    }

    fn set_phase(&self, phase: Phase) {
        let mut state = self.lock();
        if state.phase == Phase::Waiting {
            state.phase = phase;
        }
        drop(state);
        self.changed.notify_all();
    }

    fn arrive_and_wait(&self) -> bool {
        let mut state = self.lock();
        state.arrived += 1;
        self.changed.notify_all();
        while state.phase == Phase::Waiting {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.phase == Phase::Open
    }

    fn withdraw(&self) {
        self.lock().withdrawn += 1;
        self.changed.notify_all();
    }
}

/// One party's claim on a [`StartGate`]. Dropping it without arriving counts
/// as a withdrawal.
#[derive(Debug)]
pub struct GateTicket<'a> {
    gate: &'a StartGate,
    used: bool,
}

impl GateTicket<'_> {
    /// Announces readiness and blocks until the gate is opened or aborted.
    /// Returns `true` when the run should go ahead.
    pub fn arrive_and_wait(mut self) -> bool {
        self.used = true;
        self.gate.arrive_and_wait()
    }
}

impl Drop for GateTicket<'_> {
    fn drop(&mut self) {
        if !self.used {
            self.gate.withdraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_opened_gate_passes_through() {
        let gate = StartGate::opened();
        assert!(gate.is_open());
        assert!(gate.ticket().arrive_and_wait());
    }

    #[test]
    fn test_open_releases_all_parties() {
        let gate = Arc::new(StartGate::new(3));
        let parties: Vec<_> = (0..3)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.ticket().arrive_and_wait())
            })
            .collect();

        let readiness = gate.wait_ready();
        assert_eq!(readiness.arrived, 3);
        assert!(readiness.all_arrived());
        gate.open();

        for party in parties {
            assert!(party.join().unwrap());
        }
    }

    #[test]
    fn test_dropped_ticket_withdraws() {
        let gate = Arc::new(StartGate::new(2));
        let waiting = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.ticket().arrive_and_wait())
        };
        drop(gate.ticket());

        let readiness = gate.wait_ready();
        assert_eq!(readiness.arrived, 1);
        assert_eq!(readiness.withdrawn, 1);
        assert!(!readiness.all_arrived());

        gate.abort();
        assert!(!waiting.join().unwrap());
    }

    #[test]
    fn test_panicking_party_withdraws() {
        let gate = Arc::new(StartGate::new(1));
        let party = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let _ticket = gate.ticket();
                panic!("setup failed");
            })
        };
        assert!(party.join().is_err());
        assert_eq!(gate.wait_ready().withdrawn, 1);
    }

    #[test]
    fn test_wait_ready_timeout() {
        let gate = StartGate::new(1);
        assert_eq!(gate.wait_ready_timeout(Duration::from_millis(20)), None);
    }

    #[test]
    fn test_first_decision_sticks() {
        let gate = StartGate::new(0);
        gate.abort();
        gate.open();
        assert!(!gate.is_open());
    }
}
