//! Wire-level MIDI message types
//!
//! Parsing and encoding for the channel-voice messages the translator
//! routes. System-common and realtime traffic is recognized only so the
//! port layer can drop it before it reaches the engine.

use std::fmt;

/// Channel-voice MIDI messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Polyphonic Key Pressure: channel (0-15), note (0-127), pressure (0-127)
    PolyPressure { channel: u8, note: u8, pressure: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Channel Pressure: channel (0-15), pressure (0-127)
    ChannelPressure { channel: u8, pressure: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit, 8192 = center)
    PitchBend { channel: u8, value: u16 },
}

impl MidiMessage {
    /// Parse a channel-voice message from raw bytes.
    ///
    /// Returns `None` for system-common and realtime status bytes (0xF0+),
    /// running-status data, and truncated messages. A Note On with velocity
    /// zero is kept as Note On: the mapping table distinguishes the two
    /// kinds and some surfaces release buttons that way.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let status = data[0];

        // Running status would need state we don't keep; skip.
        if status < 0x80 || status >= 0xF0 {
            return None;
        }

        let message_type = status & 0xF0;
        let channel = status & 0x0F;

        match message_type {
            0x80 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::NoteOff {
                    channel,
                    note: data[1] & 0x7F,
                    velocity: data[2] & 0x7F,
                })
            }
            0x90 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::NoteOn {
                    channel,
                    note: data[1] & 0x7F,
                    velocity: data[2] & 0x7F,
                })
            }
            0xA0 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::PolyPressure {
                    channel,
                    note: data[1] & 0x7F,
                    pressure: data[2] & 0x7F,
                })
            }
            0xB0 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::ControlChange {
                    channel,
                    cc: data[1] & 0x7F,
                    value: data[2] & 0x7F,
                })
            }
            0xC0 => {
                if data.len() < 2 {
                    return None;
                }
                Some(MidiMessage::ProgramChange {
                    channel,
                    program: data[1] & 0x7F,
                })
            }
            0xD0 => {
                if data.len() < 2 {
                    return None;
                }
                Some(MidiMessage::ChannelPressure {
                    channel,
                    pressure: data[1] & 0x7F,
                })
            }
            0xE0 => {
                if data.len() < 3 {
                    return None;
                }
                let lsb = (data[1] & 0x7F) as u16;
                let msb = (data[2] & 0x7F) as u16;
                Some(MidiMessage::PitchBend {
                    channel,
                    value: (msb << 7) | lsb,
                })
            }
            _ => None,
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => {
                vec![0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => {
                vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::PolyPressure {
                channel,
                note,
                pressure,
            } => {
                vec![0xA0 | (channel & 0x0F), note & 0x7F, pressure & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | (channel & 0x0F), program & 0x7F]
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                vec![0xD0 | (channel & 0x0F), pressure & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                let lsb = (value & 0x7F) as u8;
                let msb = ((value >> 7) & 0x7F) as u8;
                vec![0xE0 | (channel & 0x0F), lsb, msb]
            }
        }
    }

    /// Wire channel (0-15)
    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => channel,
        }
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::PolyPressure {
                channel,
                note,
                pressure,
            } => {
                write!(
                    f,
                    "PolyPressure ch:{} n:{} p:{}",
                    channel + 1,
                    note,
                    pressure
                )
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel + 1, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                write!(f, "ChannelPressure ch:{} p:{}", channel + 1, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, value)
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_parsing() {
        let data = vec![0x90, 60, 100]; // Note On, ch 1, Middle C, velocity 100
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(
            msg,
            MidiMessage::NoteOn {
                channel: 0,
                note: 60,
                velocity: 100,
            }
        );
    }

    #[test]
    fn test_note_on_velocity_zero_stays_note_on() {
        let data = vec![0x90, 60, 0];
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(
            msg,
            MidiMessage::NoteOn {
                channel: 0,
                note: 60,
                velocity: 0,
            }
        );
    }

    #[test]
    fn test_control_change() {
        let data = vec![0xB2, 7, 100]; // CC ch 3, volume, value 100
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(
            msg,
            MidiMessage::ControlChange {
                channel: 2,
                cc: 7,
                value: 100,
            }
        );
    }

    #[test]
    fn test_pitch_bend_center() {
        let data = vec![0xE0, 0x00, 0x40]; // Pitch Bend ch 1, center (8192)
        let msg = MidiMessage::parse(&data).unwrap();

        assert_eq!(
            msg,
            MidiMessage::PitchBend {
                channel: 0,
                value: 8192,
            }
        );
    }

    #[test]
    fn test_system_and_realtime_are_dropped() {
        for status in [0xF0u8, 0xF1, 0xF2, 0xF3, 0xF6, 0xF8, 0xFA, 0xFB, 0xFC, 0xFE, 0xFF] {
            assert_eq!(MidiMessage::parse(&[status, 0, 0]), None);
        }
    }

    #[test]
    fn test_encode_note_off() {
        let msg = MidiMessage::NoteOff {
            channel: 1,
            note: 12,
            velocity: 0,
        };

        assert_eq!(msg.encode(), vec![0x81, 12, 0]);
    }

    #[test]
    fn test_encode_program_change_is_two_bytes() {
        let msg = MidiMessage::ProgramChange {
            channel: 0,
            program: 42,
        };

        assert_eq!(msg.encode(), vec![0xC0, 42]);
    }
}
