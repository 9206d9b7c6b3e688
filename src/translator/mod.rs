//! Translation engine - the stateful pipeline from device events to
//! translated output messages
//!
//! Per incoming event the pipeline is a synchronous call chain:
//! normalize -> match against the table under the active bank -> dispatch
//! (range scaling, bank/program side effects, memory updates) -> encode ->
//! sink. There are no suspension points inside; callers must feed events
//! from a single consumer so bank switches stay atomic with respect to
//! subsequent events.

mod dispatch;
mod encode;
mod matcher;
mod normalize;


pub use encode::CanonicalOutput;
pub use normalize::{normalize, CanonicalEvent};

use crate::mapping::MappingRecord;
use crate::midi::MidiMessage;
use crate::state::SessionState;
use tracing::info;

/// Where encoded wire messages go.
///
/// The engine calls `send` once per emitted message, in order; the port
/// layer fans each message out to every open output port.
pub trait MessageSink {
    fn send(&mut self, message: &MidiMessage);
}

/// The translation engine.
///
/// Owns the mapping table (a contiguous arena whose rows carry the only
/// mutable field, `memory`), the session state, and the output sink.
pub struct Translator<S: MessageSink> {
    pub(crate) table: Vec<MappingRecord>,
    pub(crate) state: SessionState,
    pub(crate) sink: S,
}

impl<S: MessageSink> Translator<S> {
    pub fn new(table: Vec<MappingRecord>, initial_bank: u8, sink: S) -> Self {
        Self {
            table,
            state: SessionState::new(initial_bank),
            sink,
        }
    }

    /// Translate one incoming wire message.
    ///
    /// The port layer has already dropped system-common and realtime
    /// traffic; everything arriving here is a channel-voice message.
    pub fn handle_message(&mut self, message: &MidiMessage) {
        let event = normalize(message);
        self.handle_event(&event);
    }

    /// Translate one canonical event: match, then dispatch each matched
    /// row in table order, fully flushing each row's output before the
    /// next. An event with no matches is consumed silently.
    pub fn handle_event(&mut self, event: &CanonicalEvent) {
        let matches = matcher::match_indices(&self.table, &self.state, event);

        for idx in matches {
            self.log_translation(idx, event);
            self.dispatch_record(idx, event);
        }
    }

    /// Current session state (read-only; only the dispatcher mutates it)
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The mapping table, including per-row memory
    pub fn table(&self) -> &[MappingRecord] {
        &self.table
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn log_translation(&self, idx: usize, event: &CanonicalEvent) {
        let record = &self.table[idx];
        info!(
            "[{}] {} | {} => {} | {} | {}",
            self.state.active_bank,
            record.input_device,
            record.description,
            record.output_device,
            record.output_description,
            event.level.unwrap_or(0),
        );
    }
}
