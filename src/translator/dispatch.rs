//! Action dispatch and the bank/program state machine
//!
//! Interprets each matched row's output kind, updates session state and
//! row memory, and pushes encoded messages to the sink. Everything here
//! runs synchronously: bank and program fan-out completes before the
//! dispatching call returns, so callers never observe a half-applied
//! switch.

use super::encode::{self, CanonicalOutput};
use super::normalize::CanonicalEvent;
use super::{MessageSink, Translator};
use crate::mapping::{EventKind, OutputControl, OutputKind};
use tracing::{debug, warn};

impl<S: MessageSink> Translator<S> {
    pub(crate) fn dispatch_record(&mut self, idx: usize, event: &CanonicalEvent) {
        match self.table[idx].output {
            OutputKind::Standard(kind) => self.emit_standard(idx, kind, event),
            OutputKind::BankChange => self.apply_bank_change(idx),
            OutputKind::ProgramChange => self.apply_program_change(idx),
        }
    }

    /// Ordinary translated output: remember the level, scale it into the
    /// row's range, emit one message.
    fn emit_standard(&mut self, idx: usize, kind: EventKind, event: &CanonicalEvent) {
        let record = &mut self.table[idx];

        // Config error local to this row; skip before touching memory so
        // the previous remembered value survives.
        let Some(o_channel) = record.o_channel else {
            warn!(
                "mapping '{}' has no output channel, skipping",
                record.description
            );
            return;
        };

        let level = event.level.unwrap_or(0);
        record.memory = level;

        let scaled = match record.range {
            Some(range) => range.scale(level),
            None => level,
        };

        let output = CanonicalOutput {
            kind,
            channel: o_channel.saturating_sub(1),
            control: record.o_control,
            level: scaled,
        };
        self.send_output(&output);
    }

    fn apply_bank_change(&mut self, idx: usize) {
        match self.table[idx].bank_target() {
            Some(requested) => self.change_bank(requested, false),
            // Unreachable for rows the loader accepted, but a dispatch
            // must never panic over one bad row.
            None => warn!(
                "bank_change row '{}' has no usable bank number, skipping",
                self.table[idx].description
            ),
        }
    }

    /// Switch the active bank and reset the controller surface.
    ///
    /// A request for a bank no row can switch to is a no-op. Otherwise,
    /// in order: bank indicators for every other bank go dark (the
    /// initial bank-set additionally lights the new bank's indicator),
    /// then every row belonging to the new bank replays its remembered
    /// level so physical controls resume where they left off.
    pub(crate) fn change_bank(&mut self, requested: u8, initial: bool) {
        if !self
            .table
            .iter()
            .any(|record| record.bank_target() == Some(requested))
        {
            warn!("ignoring change to unknown bank {requested}");
            return;
        }

        self.state.active_bank = requested;
        debug!("active bank is now {requested}");

        let mut outputs = Vec::new();

        for record in &self.table {
            let Some(target) = record.bank_target() else {
                continue;
            };
            let Some(control) = record.control else {
                continue;
            };
            let channel = record.channel.saturating_sub(1);

            if target != requested {
                outputs.push(CanonicalOutput {
                    kind: EventKind::NoteOff,
                    channel,
                    control: Some(OutputControl::Simple(control)),
                    level: 0,
                });
            } else if initial {
                outputs.push(CanonicalOutput {
                    kind: EventKind::NoteOn,
                    channel,
                    control: Some(OutputControl::Simple(control)),
                    level: 127,
                });
            }
        }

        for record in &self.table {
            if record.bank != requested {
                continue;
            }
            let Some(control) = record.control else {
                continue;
            };
            outputs.push(CanonicalOutput {
                kind: EventKind::ControlChange,
                channel: record.channel.saturating_sub(1),
                control: Some(OutputControl::Simple(control)),
                level: record.memory,
            });
        }

        for output in &outputs {
            self.send_output(output);
        }
    }

    /// Program selector: every program row's indicator goes dark except
    /// the chosen one, which lights up and emits the underlying Program
    /// Change message.
    fn apply_program_change(&mut self, idx: usize) {
        let Some(target) = self.table[idx].program_target() else {
            warn!(
                "program_change row '{}' has no usable program number, skipping",
                self.table[idx].description
            );
            return;
        };

        let mut outputs = Vec::new();

        for (i, record) in self.table.iter().enumerate() {
            if record.output != OutputKind::ProgramChange {
                continue;
            }
            let Some(control) = record.control else {
                continue;
            };
            let channel = record.channel.saturating_sub(1);

            if i != idx {
                outputs.push(CanonicalOutput {
                    kind: EventKind::NoteOff,
                    channel,
                    control: Some(OutputControl::Simple(control)),
                    level: 0,
                });
            } else {
                outputs.push(CanonicalOutput {
                    kind: EventKind::NoteOn,
                    channel,
                    control: Some(OutputControl::Simple(control)),
                    level: 127,
                });
                outputs.push(CanonicalOutput {
                    kind: EventKind::ProgramChange,
                    channel: record.o_channel.unwrap_or(record.channel).saturating_sub(1),
                    control: Some(OutputControl::Simple(target)),
                    level: 0,
                });
            }
        }

        self.state.active_program = Some(target);

        for output in &outputs {
            self.send_output(output);
        }
    }

    /// Reset the controller to a known bank at startup: light the bank's
    /// indicator, make it the active bank, and replay the bank's
    /// remembered values. A bank no row switches to is a no-op.
    pub fn set_initial_bank(&mut self, bank: u8) {
        self.change_bank(bank, true);
    }

    pub(crate) fn send_output(&mut self, output: &CanonicalOutput) {
        for message in encode::encode(output) {
            self.sink.send(&message);
        }
    }
}
