//! MIDI port discovery and connections
//!
//! Bridges the OS MIDI layer to the engine: input callbacks parse raw
//! bytes and feed channel-voice messages into one queue; `MultiSink`
//! fans every engine output to all open output ports.

use anyhow::{Context, Result};
use colored::Colorize;
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::midi::{format_hex, MidiMessage};
use crate::translator::MessageSink;

const CLIENT_NAME: &str = "bankmap";

/// An empty pattern list matches every port.
fn matches_any(name: &str, patterns: &[String]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    let name = name.to_lowercase();
    patterns
        .iter()
        .any(|pattern| name.contains(&pattern.to_lowercase()))
}

/// Open every input port matching one of `patterns` and feed parsed
/// messages into `tx`.
///
/// The parse step drops system-common and realtime traffic, so only
/// channel-voice messages ever reach the engine queue. The returned
/// connections must be kept alive for the callbacks to keep firing.
pub fn open_inputs(
    patterns: &[String],
    tx: mpsc::Sender<MidiMessage>,
) -> Result<Vec<MidiInputConnection<()>>> {
    let probe = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input client")?;

    let mut matched = Vec::new();
    for port in probe.ports() {
        if let Ok(name) = probe.port_name(&port) {
            if matches_any(&name, patterns) {
                matched.push(name);
            }
        }
    }

    for pattern in patterns {
        if !matched
            .iter()
            .any(|name| name.to_lowercase().contains(&pattern.to_lowercase()))
        {
            warn!("No input port matches '{pattern}'");
        }
    }

    let mut connections = Vec::new();
    for name in matched {
        let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input client")?;
        let Some(port) = midi_in
            .ports()
            .into_iter()
            .find(|port| midi_in.port_name(port).ok().as_deref() == Some(name.as_str()))
        else {
            warn!("Input port '{name}' disappeared before connecting");
            continue;
        };

        let tx = tx.clone();
        let port_label = name.clone();
        let conn = midi_in.connect(
            &port,
            CLIENT_NAME,
            move |_timestamp, data, _| {
                if let Some(message) = MidiMessage::parse(data) {
                    debug!("{port_label} <- {message}");
                    if tx.try_send(message).is_err() {
                        warn!("Dropping event from '{port_label}': engine queue full");
                    }
                }
            },
            (),
        )
        .map_err(|e| anyhow::anyhow!("{e}"))?;

        info!("Listening on input port '{name}'");
        connections.push(conn);
    }

    if connections.is_empty() {
        if patterns.is_empty() {
            anyhow::bail!("No input ports available");
        }
        anyhow::bail!("No input ports matched: {}", patterns.join(", "));
    }

    Ok(connections)
}

/// Output fan-out: one engine message goes to every open output port.
pub struct MultiSink {
    outputs: Vec<(String, MidiOutputConnection)>,
}

impl MultiSink {
    /// Open every output port matching one of `patterns`.
    pub fn open(patterns: &[String]) -> Result<Self> {
        let probe = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output client")?;

        let mut matched = Vec::new();
        for port in probe.ports() {
            if let Ok(name) = probe.port_name(&port) {
                if matches_any(&name, patterns) {
                    matched.push(name);
                }
            }
        }

        for pattern in patterns {
            if !matched
                .iter()
                .any(|name| name.to_lowercase().contains(&pattern.to_lowercase()))
            {
                warn!("No output port matches '{pattern}'");
            }
        }

        let mut outputs = Vec::new();
        for name in matched {
            let midi_out =
                MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output client")?;
            let Some(port) = midi_out
                .ports()
                .into_iter()
                .find(|port| midi_out.port_name(port).ok().as_deref() == Some(name.as_str()))
            else {
                warn!("Output port '{name}' disappeared before connecting");
                continue;
            };

            let conn = midi_out
                .connect(&port, CLIENT_NAME)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            info!("Sending to output port '{name}'");
            outputs.push((name, conn));
        }

        if outputs.is_empty() {
            if patterns.is_empty() {
                anyhow::bail!("No output ports available");
            }
            anyhow::bail!("No output ports matched: {}", patterns.join(", "));
        }

        Ok(Self { outputs })
    }
}

impl MessageSink for MultiSink {
    fn send(&mut self, message: &MidiMessage) {
        let bytes = message.encode();
        for (name, conn) in &mut self.outputs {
            match conn.send(&bytes) {
                Ok(()) => debug!("{name} -> {message} [{}]", format_hex(&bytes)),
                // A dead port loses its messages but the session goes on.
                Err(e) => warn!("Failed to send to '{name}': {e}"),
            }
        }
    }
}

/// List all ports in a formatted way
pub fn list_ports() -> Result<()> {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input client")?;
    println!("\n{}", "Input Ports:".bold());
    let inputs = midi_in.ports();
    if inputs.is_empty() {
        println!("  {}", "No input ports found".dimmed());
    }
    for port in &inputs {
        if let Ok(name) = midi_in.port_name(port) {
            println!("  {name}");
        }
    }

    let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output client")?;
    println!("\n{}", "Output Ports:".bold());
    let outputs = midi_out.ports();
    if outputs.is_empty() {
        println!("  {}", "No output ports found".dimmed());
    }
    for port in &outputs {
        if let Ok(name) = midi_out.port_name(port) {
            println!("  {name}");
        }
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_any_is_case_insensitive_substring() {
        let patterns = vec!["nanokontrol".to_string(), "UM-ONE".to_string()];

        assert!(matches_any("nanoKONTROL2 28:0", &patterns));
        assert!(matches_any("um-one MIDI 1", &patterns));
        assert!(!matches_any("Midi Through Port-0", &patterns));
    }

    #[test]
    fn test_empty_pattern_list_matches_everything() {
        assert!(matches_any("anything", &[]));
    }
}
