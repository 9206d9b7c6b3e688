//! Matching canonical events against the mapping table
//!
//! Returns row indices rather than references so the dispatcher can
//! mutate row memory while walking the matches.

use super::normalize::CanonicalEvent;
use crate::mapping::MappingRecord;
use crate::state::SessionState;

/// Indices of all rows matching `event` under the active bank, in table
/// order. Bank-change handling relies on this order being preserved.
///
/// A row matches iff its kind, channel and control all equal the event's
/// and it belongs to bank 0 (every bank) or the active bank. An empty
/// result is not an error; the event is simply dropped.
pub(crate) fn match_indices(
    table: &[MappingRecord],
    state: &SessionState,
    event: &CanonicalEvent,
) -> Vec<usize> {
    table
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            record.kind == event.kind
                && Some(record.channel) == event.channel
                && record.control == event.control
                && (record.bank == 0 || record.bank == state.active_bank)
        })
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{EventKind, OutputControl, OutputKind};

    fn record(kind: EventKind, bank: u8, channel: u8, control: Option<u8>) -> MappingRecord {
        MappingRecord {
            input_device: String::new(),
            description: String::new(),
            kind,
            bank,
            channel,
            control,
            output_device: String::new(),
            output_description: String::new(),
            output: OutputKind::Standard(EventKind::ControlChange),
            o_channel: Some(1),
            o_control: Some(OutputControl::Simple(0)),
            range: None,
            memory: 0,
        }
    }

    fn cc_event(channel: u8, control: u8) -> CanonicalEvent {
        CanonicalEvent {
            kind: EventKind::ControlChange,
            channel: Some(channel),
            control: Some(control),
            level: Some(64),
        }
    }

    #[test]
    fn test_matches_kind_channel_control() {
        let table = vec![
            record(EventKind::ControlChange, 0, 1, Some(7)),
            record(EventKind::NoteOn, 0, 1, Some(7)),
            record(EventKind::ControlChange, 0, 2, Some(7)),
            record(EventKind::ControlChange, 0, 1, Some(8)),
        ];
        let state = SessionState::new(1);

        assert_eq!(match_indices(&table, &state, &cc_event(1, 7)), vec![0]);
    }

    #[test]
    fn test_bank_gating() {
        let table = vec![
            record(EventKind::ControlChange, 1, 1, Some(7)),
            record(EventKind::ControlChange, 2, 1, Some(7)),
            record(EventKind::ControlChange, 0, 1, Some(7)),
        ];

        let bank1 = SessionState::new(1);
        assert_eq!(match_indices(&table, &bank1, &cc_event(1, 7)), vec![0, 2]);

        let bank2 = SessionState::new(2);
        assert_eq!(match_indices(&table, &bank2, &cc_event(1, 7)), vec![1, 2]);
    }

    #[test]
    fn test_fan_out_preserves_table_order() {
        let table = vec![
            record(EventKind::ControlChange, 0, 1, Some(7)),
            record(EventKind::ControlChange, 1, 1, Some(7)),
            record(EventKind::ControlChange, 0, 1, Some(7)),
        ];
        let state = SessionState::new(1);

        assert_eq!(match_indices(&table, &state, &cc_event(1, 7)), vec![0, 1, 2]);
    }

    #[test]
    fn test_channel_wide_kinds_match_on_none_control() {
        let table = vec![record(EventKind::Aftertouch, 0, 3, None)];
        let state = SessionState::new(1);

        let event = CanonicalEvent {
            kind: EventKind::Aftertouch,
            channel: Some(3),
            control: None,
            level: Some(40),
        };
        assert_eq!(match_indices(&table, &state, &event), vec![0]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let table = vec![record(EventKind::ControlChange, 0, 1, Some(7))];
        let state = SessionState::new(1);

        assert!(match_indices(&table, &state, &cc_event(4, 7)).is_empty());
    }
}
