//! bankmap - bank-switched MIDI translation between control surfaces
//! and sound devices
//!
//! Remaps channel-voice messages from input devices into messages for
//! output devices according to a CSV mapping table, with multi-bank
//! operation, per-row value memory replayed on bank switches, output
//! range rescaling, and NRPN encoding.

pub mod config;
pub mod mapping;
pub mod midi;
pub mod ports;
pub mod state;
pub mod translator;
