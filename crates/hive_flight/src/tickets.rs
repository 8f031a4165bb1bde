//! Single-use ticket registry linking planning calls to retrieval calls.
//!
//! Tickets are `{party}_{counter}` strings with a process-wide monotonic
//! counter. An entry lives from planning until the first retrieval that names
//! it. Tickets that are never retrieved stay resident for the life of the
//! process; for a test fixture that leak is accepted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counter plus pending commands, guarded together.
#[derive(Debug, Default)]
struct RegistryState {
    last_counter: u64,
    pending: HashMap<String, String>,
}

/// Process-wide map from ticket to pending command.
#[derive(Debug)]
pub struct TicketRegistry {
    party_tag: String,
    state: Mutex<RegistryState>,
}

impl TicketRegistry {
    pub fn new(party_tag: impl Into<String>) -> Self {
        Self {
            party_tag: party_tag.into(),
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Stores `command` under a fresh ticket and returns the ticket.
    pub fn issue(&self, command: impl Into<String>) -> String {
        let command = command.into();
        let mut state = self.lock_state();
        state.last_counter += 1;
        let ticket = format!("{}_{}", self.party_tag, state.last_counter);
        state.pending.insert(ticket.clone(), command);
        ticket
    }

    /// Removes and returns the command stored under `ticket`.
    ///
    /// Returns `None` for unknown or already-consumed tickets.
    pub fn resolve_and_consume(&self, ticket: &str) -> Option<String> {
        self.lock_state().pending.remove(ticket)
    }

    /// Number of issued tickets not yet consumed.
    pub fn pending(&self) -> usize {
        self.lock_state().pending.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        // Critical sections never panic midway, so a poisoned guard still
        // holds consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
