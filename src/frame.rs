//! Classification and parsing of lines received from the gateway.
//!
//! The gateway reports three kinds of unsolicited output besides command responses:
//!
//! - OpenTherm frames, e.g. `B40190A00`: a direction letter followed by
//!   four hex-encoded bytes (message type, Data-ID and two data bytes).
//! - Error codes, e.g. `NG`, reported when the gateway rejects input.
//! - Summary lines, printed instead of frames while summary reporting is enabled.
//!
//! Use [`classify`] to determine the kind of a received line.

use crate::summary::SummaryRecord;
use core::{
    fmt::{Display, Formatter},
    str::FromStr,
};
use strum::{EnumString, FromRepr};

/// Source or destination of an OpenTherm frame, as seen by the gateway.
///
/// The discriminant is the ASCII letter prefixing the frame.
#[derive(FromRepr, strum::Display, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug)]
#[repr(u8)]
pub enum Direction {
    /// Sent by the gateway to the boiler (`R`).
    #[strum(serialize = "Gateway to boiler")]
    ToBoiler = b'R',
    /// Received from the boiler (`B`).
    #[strum(serialize = "From boiler")]
    FromBoiler = b'B',
    /// Received from the thermostat (`T`).
    #[strum(serialize = "From thermostat")]
    FromThermostat = b'T',
    /// Sent by the gateway to the thermostat (`A`).
    #[strum(serialize = "Gateway to thermostat")]
    ToThermostat = b'A',
}

impl Direction {
    /// Returns the letter identifying the direction on the wire.
    #[must_use]
    pub const fn letter(self) -> char {
        self as u8 as char
    }
}

/// OpenTherm message type, encoded in bits 4 to 6 of the first frame byte.
#[derive(strum::Display, PartialEq, Eq, Copy, Clone, Debug)]
pub enum MessageType {
    /// Master requests a value.
    #[strum(serialize = "Read-Data")]
    ReadData,
    /// Master writes a value.
    #[strum(serialize = "Write-Data")]
    WriteData,
    /// Master signals invalid data.
    #[strum(serialize = "Invalid-Data")]
    InvalidData,
    /// Reserved message type.
    #[strum(serialize = "Reserved")]
    Reserved,
    /// Slave acknowledges a read.
    #[strum(serialize = "Read-Ack")]
    ReadAck,
    /// Slave acknowledges a write.
    #[strum(serialize = "Write-Ack")]
    WriteAck,
    /// Slave reports invalid data.
    #[strum(serialize = "Data-Invalid")]
    DataInvalid,
    /// Slave does not know the Data-ID.
    #[strum(serialize = "Unknown-DataId")]
    UnknownDataId,
}

impl MessageType {
    /// Extracts the message type from the first frame byte.
    ///
    /// The parity bit (bit 7) and the spare bits (bits 0 to 3) are ignored.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match (byte >> 4) & 0x07 {
            0 => Self::ReadData,
            1 => Self::WriteData,
            2 => Self::InvalidData,
            3 => Self::Reserved,
            4 => Self::ReadAck,
            5 => Self::WriteAck,
            6 => Self::DataInvalid,
            _ => Self::UnknownDataId,
        }
    }
}

/// Error code reported by the gateway.
#[derive(EnumString, strum::Display, PartialEq, Eq, Copy, Clone, Debug)]
pub enum ErrorCode {
    /// `NG`: the command code is unknown.
    #[strum(serialize = "NG")]
    NoGood,
    /// `SE`: the command has a syntax error.
    #[strum(serialize = "SE")]
    SyntaxError,
    /// `BV`: the command value is invalid.
    #[strum(serialize = "BV")]
    BadValue,
    /// `OR`: the command value is out of range.
    #[strum(serialize = "OR")]
    OutOfRange,
    /// `NS`: no space left to store the setting.
    #[strum(serialize = "NS")]
    NoSpace,
    /// `NF`: the item to remove was not found.
    #[strum(serialize = "NF")]
    NotFound,
    /// `OE`: the serial receive buffer overflowed.
    #[strum(serialize = "OE")]
    OverrunError,
}

impl ErrorCode {
    /// Returns a human-readable description of the error code.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::NoGood => "No Good",
            Self::SyntaxError => "Syntax Error",
            Self::BadValue => "Bad Value",
            Self::OutOfRange => "Out of Range",
            Self::NoSpace => "No Space",
            Self::NotFound => "Not Found",
            Self::OverrunError => "Overrun Error",
        }
    }
}

/// Reason a received line could not be interpreted.
///
/// This enum is marked `#[non_exhaustive]` to allow for future variants.
#[non_exhaustive]
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Malformed {
    /// A command response is too short to carry a code and a payload.
    ShortResponse,
    /// A summary line has the wrong number of fields.
    FieldCount(usize),
    /// A frame does not have exactly 9 characters.
    Length(usize),
    /// A frame starts with an unknown direction letter.
    Direction(char),
    /// A frame contains characters that are not hex digits.
    Hex,
    /// A line exceeds the maximum line length.
    TooLong,
}

impl Display for Malformed {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::ShortResponse => write!(f, "response too short"),
            Self::FieldCount(count) => write!(
                f,
                "wrong number of summary fields: expected {}, got {count}",
                crate::summary::FIELDS.len()
            ),
            Self::Length(len) => write!(f, "wrong frame length: expected 9, got {len}"),
            Self::Direction(c) => write!(f, "unknown direction '{c}'"),
            Self::Hex => write!(f, "invalid hex digits"),
            Self::TooLong => write!(f, "line too long"),
        }
    }
}

impl core::error::Error for Malformed {}

/// An OpenTherm frame as reported by the gateway, e.g. `T80000200`.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Frame {
    /// Frame direction.
    pub direction: Direction,
    /// Raw message type byte, including the parity bit.
    pub msg_type: u8,
    /// OpenTherm Data-ID.
    pub data_id: u8,
    /// First (high) data byte.
    pub byte1: u8,
    /// Second (low) data byte.
    pub byte2: u8,
}

impl Frame {
    /// Constructs a new frame.
    #[must_use]
    pub const fn new(direction: Direction, msg_type: u8, data_id: u8, byte1: u8, byte2: u8) -> Self {
        Self {
            direction,
            msg_type,
            data_id,
            byte1,
            byte2,
        }
    }

    /// Returns the decoded message type.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        MessageType::from_byte(self.msg_type)
    }

    /// Returns both data bytes as an unsigned 16-bit value.
    #[must_use]
    pub const fn value(&self) -> u16 {
        u16::from_be_bytes([self.byte1, self.byte2])
    }

    /// Returns both data bytes interpreted as a signed 8.8 fixed-point number.
    #[must_use]
    pub fn fixed_point(&self) -> f64 {
        f64::from(i16::from_be_bytes([self.byte1, self.byte2])) / 256.0
    }
}

impl FromStr for Frame {
    type Err = Malformed;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();

        if bytes.len() != 9 {
            return Err(Malformed::Length(bytes.len()));
        }

        let direction = Direction::from_repr(bytes[0])
            .ok_or_else(|| Malformed::Direction(s.chars().next().unwrap_or_default()))?;
        let mut fields = bytes[1..]
            .chunks_exact(2)
            .map(|pair| decode_hex_byte(pair[0], pair[1]));
        let mut next = || fields.next().flatten().ok_or(Malformed::Hex);

        Ok(Self::new(direction, next()?, next()?, next()?, next()?))
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        write!(
            f,
            "{}{:02X}{:02X}{:02X}{:02X}",
            self.direction.letter(),
            self.msg_type,
            self.data_id,
            self.byte1,
            self.byte2
        )
    }
}

fn decode_hex_byte(high: u8, low: u8) -> Option<u8> {
    fn nibble(c: u8) -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    }

    Some((nibble(high)? << 4) | nibble(low)?)
}

/// Kind of a line received from the gateway.
#[derive(PartialEq, Clone, Debug)]
pub enum Line<'a> {
    /// Response to a command, e.g. `TT: 19.50` or `PR: M=G`.
    Reply {
        /// Two-letter command code.
        code: &'a str,
        /// Everything following the `": "` separator.
        payload: &'a str,
    },
    /// Summary report line.
    Summary(SummaryRecord),
    /// OpenTherm frame.
    Frame(Frame),
    /// Error code reported by the gateway.
    Error(ErrorCode),
    /// Line that could not be interpreted.
    Malformed(Malformed),
}

/// Classifies a line received from the gateway.
///
/// Any line containing `": "` is a command response. Otherwise, while summary
/// reporting is enabled, every line is expected to be a summary line.
/// Remaining lines are either two-letter error codes or 9-character frames.
#[must_use]
pub fn classify(line: &str, summary_mode: bool) -> Line<'_> {
    if line.contains(": ") {
        return match (line.get(..2), line.get(4..)) {
            (Some(code), Some(payload)) => Line::Reply { code, payload },
            _ => Line::Malformed(Malformed::ShortResponse),
        };
    }

    if summary_mode {
        return match SummaryRecord::parse(line) {
            Ok(record) => Line::Summary(record),
            Err(err) => Line::Malformed(err),
        };
    }

    if let (2, Ok(code)) = (line.len(), line.parse()) {
        return Line::Error(code);
    }

    match line.parse() {
        Ok(frame) => Line::Frame(frame),
        Err(err) => Line::Malformed(err),
    }
}
