//! Mapping table records and CSV import
//!
//! One `MappingRecord` is one row of the table: an input trigger, the bank
//! it belongs to, and the output action it produces. String-encoded fields
//! (NRPN pairs like `"12:34"`, ranges like `"0-100"`) are parsed once at
//! load time into value objects; the engine never re-parses them per event.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while parsing a mapping row
#[derive(Debug, Error)]
pub enum MappingParseError {
    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("invalid {field} '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid NRPN control '{0}' (expected MSB:LSB)")]
    InvalidNrpn(String),

    #[error("bank_change target '{0}' is not a valid bank number (bank 0 is reserved)")]
    InvalidBankTarget(String),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
}

/// Input event kinds a mapping row can trigger on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NoteOn,
    NoteOff,
    PolyTouch,
    ControlChange,
    ProgramChange,
    Aftertouch,
    PitchWheel,
}

impl EventKind {
    /// Parse the CSV spelling of a message type
    pub fn parse(s: &str) -> Result<Self, MappingParseError> {
        match s {
            "note_on" => Ok(EventKind::NoteOn),
            "note_off" => Ok(EventKind::NoteOff),
            "polytouch" => Ok(EventKind::PolyTouch),
            "control_change" => Ok(EventKind::ControlChange),
            "program_change" => Ok(EventKind::ProgramChange),
            "aftertouch" => Ok(EventKind::Aftertouch),
            "pitchwheel" => Ok(EventKind::PitchWheel),
            other => Err(MappingParseError::UnknownType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NoteOn => "note_on",
            EventKind::NoteOff => "note_off",
            EventKind::PolyTouch => "polytouch",
            EventKind::ControlChange => "control_change",
            EventKind::ProgramChange => "program_change",
            EventKind::Aftertouch => "aftertouch",
            EventKind::PitchWheel => "pitchwheel",
        }
    }
}

/// What a matched row emits
///
/// `program_change` in the `o-type` column is the mapper action (indicator
/// handling plus the underlying Program Change message), not a plain
/// passthrough, so it gets its own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Ordinary MIDI output of the given kind
    Standard(EventKind),
    /// Switch the active bank to the row's target
    BankChange,
    /// Program selector: indicator LEDs plus a Program Change message
    ProgramChange,
}

impl OutputKind {
    pub fn parse(s: &str) -> Result<Self, MappingParseError> {
        match s {
            "bank_change" => Ok(OutputKind::BankChange),
            "program_change" => Ok(OutputKind::ProgramChange),
            other => EventKind::parse(other).map(OutputKind::Standard),
        }
    }
}

/// Output control address: a plain 7-bit number or an NRPN pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputControl {
    Simple(u8),
    Nrpn { msb: u8, lsb: u8 },
}

impl OutputControl {
    /// Parse an `o-control` cell. Empty cells mean "no control field"
    /// (channel-wide outputs); `"MSB:LSB"` is the NRPN form.
    pub fn parse(s: &str) -> Result<Option<Self>, MappingParseError> {
        if s.is_empty() {
            return Ok(None);
        }

        if s.contains(':') {
            let parts: Vec<&str> = s.split(':').collect();
            if parts.len() != 2 {
                return Err(MappingParseError::InvalidNrpn(s.to_string()));
            }
            let msb = parts[0]
                .parse::<u8>()
                .map_err(|_| MappingParseError::InvalidNrpn(s.to_string()))?;
            let lsb = parts[1]
                .parse::<u8>()
                .map_err(|_| MappingParseError::InvalidNrpn(s.to_string()))?;
            return Ok(Some(OutputControl::Nrpn { msb, lsb }));
        }

        let control = s.parse::<u8>().map_err(|_| MappingParseError::InvalidNumber {
            field: "o-control",
            value: s.to_string(),
        })?;
        Ok(Some(OutputControl::Simple(control)))
    }
}

/// Output value range, rescaling a 0-127 level into `low..=high`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub low: i32,
    pub high: i32,
}

impl Range {
    /// Parse a `"low-high"` spec. Anything that is not exactly two
    /// integers around a single `-` yields `None` (identity mapping);
    /// a malformed range is not an error.
    pub fn parse(spec: &str) -> Option<Self> {
        let parts: Vec<&str> = spec.split('-').collect();
        if parts.len() != 2 {
            return None;
        }
        let low = parts[0].trim().parse::<i32>().ok()?;
        let high = parts[1].trim().parse::<i32>().ok()?;
        Some(Range { low, high })
    }

    /// Rescale a 0-127 level into this range.
    ///
    /// `scale(0) == low` and `scale(127) == high`. The result is floored
    /// and deliberately not clamped: a range like `"0-200"` produces
    /// values above 127, and keeping them is the documented contract.
    pub fn scale(&self, level: i32) -> i32 {
        (level as f64 * (self.high - self.low) as f64 / 127.0 + self.low as f64).floor() as i32
    }
}

/// One row of the mapping table
///
/// `memory` is the only mutable field: the last level routed through this
/// row, replayed when its bank becomes active again. Only the dispatcher
/// writes it.
#[derive(Debug, Clone)]
pub struct MappingRecord {
    pub input_device: String,
    pub description: String,
    pub kind: EventKind,
    /// 0 means "active in every bank"
    pub bank: u8,
    /// 1-based input channel
    pub channel: u8,
    /// Input control/note number; None for channel-wide kinds
    pub control: Option<u8>,
    pub output_device: String,
    pub output_description: String,
    pub output: OutputKind,
    /// 1-based output channel; None when the row never emits one
    pub o_channel: Option<u8>,
    pub o_control: Option<OutputControl>,
    pub range: Option<Range>,
    /// Last level routed through this row
    pub memory: i32,
}

impl MappingRecord {
    /// Bank number this row switches to, when it is a bank_change row
    pub fn bank_target(&self) -> Option<u8> {
        match (self.output, self.o_control) {
            (OutputKind::BankChange, Some(OutputControl::Simple(bank))) => Some(bank),
            _ => None,
        }
    }

    /// Program number this row selects, when it is a program_change row
    pub fn program_target(&self) -> Option<u8> {
        match (self.output, self.o_control) {
            (OutputKind::ProgramChange, Some(OutputControl::Simple(program))) => Some(program),
            _ => None,
        }
    }
}

/// Load every `*.csv` file in a directory into one ordered table.
///
/// Files are read in name order so the table order (and therefore match
/// order) is deterministic across platforms.
pub fn load_mappings(dir: &Path) -> Result<Vec<MappingRecord>> {
    let mut csv_files: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read mappings directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .collect();
    csv_files.sort();

    let mut table = Vec::new();
    for path in &csv_files {
        let before = table.len();
        load_csv_file(path, &mut table)
            .with_context(|| format!("Failed to load mapping file: {}", path.display()))?;
        info!(
            "Loaded {} mapping rows from {}",
            table.len() - before,
            path.display()
        );
    }

    Ok(table)
}

/// Read one CSV mapping file, appending parsed rows to `table`.
///
/// The header row is normalized (lowercased, spaces stripped) and every
/// column after the one whose name contains `output` is prefixed `o-`,
/// so input and output columns with the same label stay distinct.
fn load_csv_file(path: &Path, table: &mut Vec<MappingRecord>) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut records = reader.records();

    let header = match records.next() {
        Some(record) => record?,
        None => return Ok(()),
    };
    let columns = normalize_header(&header);

    for (line, record) in records.enumerate() {
        let record = record?;
        match parse_row(&columns, &record) {
            Ok(row) => table.push(row),
            Err(e) => {
                // Skip just this row; a bad line must not take the
                // rest of the table down with it.
                warn!(
                    "{}: skipping row {}: {}",
                    path.display(),
                    line + 2,
                    e
                );
            }
        }
    }

    Ok(())
}

/// Normalize header names and build a column lookup
fn normalize_header(header: &csv::StringRecord) -> HashMap<String, usize> {
    let mut columns = HashMap::new();
    let mut in_output_section = false;

    for (idx, raw) in header.iter().enumerate() {
        let mut name = raw.to_lowercase().replace(' ', "");
        if in_output_section {
            name = format!("o-{name}");
        }
        if name.contains("output") {
            in_output_section = true;
        }
        columns.insert(name, idx);
    }

    columns
}

fn parse_row(
    columns: &HashMap<String, usize>,
    record: &csv::StringRecord,
) -> Result<MappingRecord, MappingParseError> {
    let cell = |name: &'static str| -> &str {
        columns
            .get(name)
            .and_then(|&idx| record.get(idx))
            .map(str::trim)
            .unwrap_or("")
    };
    let required = |name: &'static str| -> Result<&str, MappingParseError> {
        let value = cell(name);
        if value.is_empty() {
            Err(MappingParseError::MissingColumn(name))
        } else {
            Ok(value)
        }
    };
    let number = |field: &'static str, value: &str| -> Result<u8, MappingParseError> {
        value.parse::<u8>().map_err(|_| MappingParseError::InvalidNumber {
            field,
            value: value.to_string(),
        })
    };

    let kind = EventKind::parse(required("type")?)?;
    let output = OutputKind::parse(required("o-type")?)?;

    let bank = match cell("bank") {
        "" => 0,
        value => number("bank", value)?,
    };
    let channel = number("channel", required("channel")?)?;
    let control = match cell("control") {
        "" => None,
        value => Some(number("control", value)?),
    };
    let o_channel = match cell("o-channel") {
        "" => None,
        value => Some(number("o-channel", value)?),
    };
    let o_control = OutputControl::parse(cell("o-control"))?;

    // Bank 0 means "every bank", so no row may switch to it.
    if output == OutputKind::BankChange {
        match o_control {
            Some(OutputControl::Simple(bank)) if bank > 0 => {}
            _ => {
                return Err(MappingParseError::InvalidBankTarget(
                    cell("o-control").to_string(),
                ));
            }
        }
    }

    let range = match cell("o-range") {
        "" => None,
        spec => {
            let parsed = Range::parse(spec);
            if parsed.is_none() {
                debug!("ignoring malformed range spec '{spec}'");
            }
            parsed
        }
    };

    Ok(MappingRecord {
        input_device: cell("inputdevice").to_string(),
        description: cell("description").to_string(),
        kind,
        bank,
        channel,
        control,
        output_device: cell("outputdevice").to_string(),
        output_description: cell("o-description").to_string(),
        output,
        o_channel,
        o_control,
        range,
        memory: 0,
    })
}
