//! Event normalization
//!
//! Converts a wire message into the canonical form the matcher and
//! dispatcher work with, decoupling the engine from per-type field names.

use crate::mapping::EventKind;
use crate::midi::MidiMessage;

/// Canonical form of an incoming device event.
///
/// `channel` is 1-based to match the mapping table; `control` and `level`
/// are `None` when the message kind has no such field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalEvent {
    pub kind: EventKind,
    pub channel: Option<u8>,
    pub control: Option<u8>,
    pub level: Option<i32>,
}

/// Normalize a channel-voice message.
///
/// Per-kind field mapping: notes and polytouch put the note number in
/// `control`; control_change puts the controller there; program_change
/// puts the program there and has no level; aftertouch and pitchwheel are
/// channel-wide (`control` is None). Pitch bend is centered: the 14-bit
/// wire value becomes a signed offset from 8192.
pub fn normalize(message: &MidiMessage) -> CanonicalEvent {
    let channel = Some(message.channel() + 1);

    match *message {
        MidiMessage::NoteOn { note, velocity, .. } => CanonicalEvent {
            kind: EventKind::NoteOn,
            channel,
            control: Some(note),
            level: Some(velocity as i32),
        },
        MidiMessage::NoteOff { note, velocity, .. } => CanonicalEvent {
            kind: EventKind::NoteOff,
            channel,
            control: Some(note),
            level: Some(velocity as i32),
        },
        MidiMessage::PolyPressure { note, pressure, .. } => CanonicalEvent {
            kind: EventKind::PolyTouch,
            channel,
            control: Some(note),
            level: Some(pressure as i32),
        },
        MidiMessage::ControlChange { cc, value, .. } => CanonicalEvent {
            kind: EventKind::ControlChange,
            channel,
            control: Some(cc),
            level: Some(value as i32),
        },
        MidiMessage::ProgramChange { program, .. } => CanonicalEvent {
            kind: EventKind::ProgramChange,
            channel,
            control: Some(program),
            level: None,
        },
        MidiMessage::ChannelPressure { pressure, .. } => CanonicalEvent {
            kind: EventKind::Aftertouch,
            channel,
            control: None,
            level: Some(pressure as i32),
        },
        MidiMessage::PitchBend { value, .. } => CanonicalEvent {
            kind: EventKind::PitchWheel,
            channel,
            control: None,
            level: Some(value as i32 - 8192),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_uses_note_and_velocity() {
        let event = normalize(&MidiMessage::NoteOn {
            channel: 0,
            note: 101,
            velocity: 127,
        });

        assert_eq!(event.kind, EventKind::NoteOn);
        assert_eq!(event.channel, Some(1));
        assert_eq!(event.control, Some(101));
        assert_eq!(event.level, Some(127));
    }

    #[test]
    fn test_channel_is_one_based() {
        let event = normalize(&MidiMessage::ControlChange {
            channel: 5,
            cc: 64,
            value: 64,
        });

        assert_eq!(event.channel, Some(6));
    }

    #[test]
    fn test_program_change_has_no_level() {
        let event = normalize(&MidiMessage::ProgramChange {
            channel: 0,
            program: 64,
        });

        assert_eq!(event.kind, EventKind::ProgramChange);
        assert_eq!(event.control, Some(64));
        assert_eq!(event.level, None);
    }

    #[test]
    fn test_aftertouch_is_channel_wide() {
        let event = normalize(&MidiMessage::ChannelPressure {
            channel: 2,
            pressure: 64,
        });

        assert_eq!(event.kind, EventKind::Aftertouch);
        assert_eq!(event.control, None);
        assert_eq!(event.level, Some(64));
    }

    #[test]
    fn test_pitch_bend_is_centered() {
        let center = normalize(&MidiMessage::PitchBend {
            channel: 0,
            value: 8192,
        });
        assert_eq!(center.level, Some(0));

        let low = normalize(&MidiMessage::PitchBend {
            channel: 0,
            value: 0,
        });
        assert_eq!(low.level, Some(-8192));

        let high = normalize(&MidiMessage::PitchBend {
            channel: 0,
            value: 16383,
        });
        assert_eq!(high.level, Some(8191));
    }
}
