//! Session state: the active bank and program
//!
//! An explicit value owned by the translator and passed by reference into
//! matching and dispatch, never a process-wide global. Only the
//! dispatcher mutates it; its lifetime is the process lifetime.

/// Mutable session state read by the matcher and written by the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Currently active bank; rows with `bank == 0` match in every bank
    pub active_bank: u8,
    /// Program selected by the last program_change action, if any
    pub active_program: Option<u8>,
}

impl SessionState {
    pub fn new(initial_bank: u8) -> Self {
        Self {
            active_bank: initial_bank,
            active_program: None,
        }
    }
}
