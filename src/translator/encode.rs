//! Output encoding
//!
//! Turns a canonical output into protocol-correct wire messages. An NRPN
//! control address expands into the standard 4-message Control Change
//! sequence; everything else is a single message.

use crate::mapping::{EventKind, OutputControl};
use crate::midi::MidiMessage;
use tracing::debug;

/// NRPN parameter number MSB controller
const NRPN_PARAM_MSB: u8 = 99;
/// NRPN parameter number LSB controller
const NRPN_PARAM_LSB: u8 = 98;
/// Data entry MSB controller
const NRPN_DATA_ENTRY: u8 = 6;
/// Data entry LSB controller
const NRPN_DATA_LSB: u8 = 38;

/// Canonical form of an output produced by one matched row.
///
/// `channel` is the 0-based wire channel; `control` may still be an NRPN
/// pair awaiting expansion. `level` is the range-scaled value and may sit
/// outside 0-127 (ranges are not clamped); it is brought back to the
/// 7-bit wire domain only here, at the byte boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalOutput {
    pub kind: EventKind,
    pub channel: u8,
    pub control: Option<OutputControl>,
    pub level: i32,
}

/// Encode a canonical output into zero or more wire messages.
///
/// Outputs that cannot be encoded (a kind that needs a control number but
/// has none, or a kind with no wire form) are dropped: a mis-mapped row
/// must never halt the translation session.
pub(crate) fn encode(output: &CanonicalOutput) -> Vec<MidiMessage> {
    if let Some(OutputControl::Nrpn { msb, lsb }) = output.control {
        return encode_nrpn(output.channel, msb, lsb, output.level);
    }

    let control = match output.control {
        Some(OutputControl::Simple(control)) => Some(control),
        _ => None,
    };
    let channel = output.channel;
    let level = clamp7(output.level);

    let message = match (output.kind, control) {
        (EventKind::ControlChange, Some(cc)) => Some(MidiMessage::ControlChange {
            channel,
            cc,
            value: level,
        }),
        (EventKind::NoteOn, Some(note)) => Some(MidiMessage::NoteOn {
            channel,
            note,
            velocity: level,
        }),
        // Note Off always goes out with zero velocity; the level is the
        // release velocity nothing downstream cares about.
        (EventKind::NoteOff, Some(note)) => Some(MidiMessage::NoteOff {
            channel,
            note,
            velocity: 0,
        }),
        (EventKind::ProgramChange, Some(program)) => {
            Some(MidiMessage::ProgramChange { channel, program })
        }
        (EventKind::Aftertouch, _) => Some(MidiMessage::ChannelPressure {
            channel,
            pressure: level,
        }),
        (EventKind::PitchWheel, _) => Some(MidiMessage::PitchBend {
            channel,
            value: (output.level + 8192).clamp(0, 16383) as u16,
        }),
        _ => None,
    };

    match message {
        Some(message) => vec![message],
        None => {
            debug!(
                "dropping unencodable output: {:?} control {:?}",
                output.kind, output.control
            );
            Vec::new()
        }
    }
}

/// Expand an NRPN pair into the 4-message sequence:
///
///   CC 99 = parameter MSB
///   CC 98 = parameter LSB
///   CC  6 = data level
///   CC 38 = 0
///
/// all on the output's channel, in exactly that order.
fn encode_nrpn(channel: u8, msb: u8, lsb: u8, level: i32) -> Vec<MidiMessage> {
    vec![
        MidiMessage::ControlChange {
            channel,
            cc: NRPN_PARAM_MSB,
            value: msb,
        },
        MidiMessage::ControlChange {
            channel,
            cc: NRPN_PARAM_LSB,
            value: lsb,
        },
        MidiMessage::ControlChange {
            channel,
            cc: NRPN_DATA_ENTRY,
            value: clamp7(level),
        },
        MidiMessage::ControlChange {
            channel,
            cc: NRPN_DATA_LSB,
            value: 0,
        },
    ]
}

fn clamp7(level: i32) -> u8 {
    level.clamp(0, 127) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nrpn_sequence_order_and_values() {
        let output = CanonicalOutput {
            kind: EventKind::ControlChange,
            channel: 3,
            control: Some(OutputControl::Nrpn { msb: 12, lsb: 34 }),
            level: 77,
        };

        let messages = encode(&output);
        assert_eq!(messages.len(), 4);

        let expected = [(99u8, 12u8), (98, 34), (6, 77), (38, 0)];
        for (message, (cc, value)) in messages.iter().zip(expected) {
            assert_eq!(
                *message,
                MidiMessage::ControlChange {
                    channel: 3,
                    cc,
                    value,
                }
            );
        }
    }

    #[test]
    fn test_note_off_ignores_level() {
        let output = CanonicalOutput {
            kind: EventKind::NoteOff,
            channel: 0,
            control: Some(OutputControl::Simple(60)),
            level: 99,
        };

        assert_eq!(
            encode(&output),
            vec![MidiMessage::NoteOff {
                channel: 0,
                note: 60,
                velocity: 0,
            }]
        );
    }

    #[test]
    fn test_note_on_velocity_is_level() {
        let output = CanonicalOutput {
            kind: EventKind::NoteOn,
            channel: 1,
            control: Some(OutputControl::Simple(12)),
            level: 101,
        };

        assert_eq!(
            encode(&output),
            vec![MidiMessage::NoteOn {
                channel: 1,
                note: 12,
                velocity: 101,
            }]
        );
    }

    #[test]
    fn test_channel_wide_outputs_need_no_control() {
        let aftertouch = CanonicalOutput {
            kind: EventKind::Aftertouch,
            channel: 2,
            control: None,
            level: 64,
        };
        assert_eq!(
            encode(&aftertouch),
            vec![MidiMessage::ChannelPressure {
                channel: 2,
                pressure: 64,
            }]
        );

        let pitch = CanonicalOutput {
            kind: EventKind::PitchWheel,
            channel: 2,
            control: None,
            level: 0,
        };
        assert_eq!(
            encode(&pitch),
            vec![MidiMessage::PitchBend {
                channel: 2,
                value: 8192,
            }]
        );
    }

    #[test]
    fn test_missing_control_is_dropped() {
        let output = CanonicalOutput {
            kind: EventKind::ControlChange,
            channel: 0,
            control: None,
            level: 64,
        };

        assert!(encode(&output).is_empty());
    }

    #[test]
    fn test_out_of_range_level_is_clamped_at_wire() {
        let output = CanonicalOutput {
            kind: EventKind::ControlChange,
            channel: 0,
            control: Some(OutputControl::Simple(7)),
            level: 200,
        };

        assert_eq!(
            encode(&output),
            vec![MidiMessage::ControlChange {
                channel: 0,
                cc: 7,
                value: 127,
            }]
        );
    }
}
