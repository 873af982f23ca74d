//! Gateway configuration commands.
//!
//! Every command the gateway accepts is a two-letter code followed by `=` and a value,
//! e.g. `TT=19.5`. The [`Command`] enumeration lists all supported codes,
//! each paired with a [`Rule`] that decides which values are accepted
//! before anything is written to the gateway.
//!
//! Use [`lookup`] to resolve a code and [`Command::validate`] to check a value:
//!
//! ```
//! use otgw::command::{self, Command};
//!
//! let cmd = command::lookup("SC").unwrap();
//!
//! assert_eq!(cmd, Command::SetClock);
//! assert!(cmd.validate("23:59/4"));
//! assert!(!cmd.validate("24:00/1"));
//! ```

use alloc::string::String;
use core::fmt::{Display, Formatter};
use strum::{EnumString, IntoStaticStr, VariantNames};

const REPORT_ITEMS: &[&str] = &[
    "A", "B", "C", "G", "I", "L", "M", "O", "P", "R", "S", "T", "V", "W",
];
const LED_FUNCTIONS: &[&str] = &["R", "X", "T", "B", "O", "F", "H", "W", "C", "E", "M", "P"];
const GPIO_FUNCTIONS: &[&str] = &["0", "1", "2", "3", "4", "5", "6", "7"];
const COUNTERS: &[&str] = &["HBS", "HBH", "HPS", "HPH", "WBS", "WBH", "WPS", "WPH"];
const VOLTAGE_LEVELS: &[&str] = &["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
const STATES: &[&str] = &["0", "1"];

/// Reason a command was rejected before being written to the gateway.
///
/// This enum is marked `#[non_exhaustive]` to allow for future variants.
#[non_exhaustive]
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum CommandError {
    /// The session is not connected to the gateway.
    NotConnected,
    /// The command is shorter than `CC=v`.
    TooShort(String),
    /// The command contains a line break.
    LineBreak(String),
    /// The third character of the command is not `=`.
    MissingSeparator(String),
    /// The two-letter code is not a known command.
    UnknownCommand(String),
    /// The value is not accepted by the command.
    InvalidValue {
        /// Two-letter command code.
        code: &'static str,
        /// Rejected value.
        value: String,
    },
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::TooShort(cmd) => write!(f, "command '{cmd}' is too short"),
            Self::LineBreak(cmd) => write!(f, "command {cmd:?} contains a line break"),
            Self::MissingSeparator(cmd) => write!(f, "command '{cmd}' lacks '=' separator"),
            Self::UnknownCommand(code) => write!(f, "unknown command '{code}'"),
            Self::InvalidValue { code, value } => {
                write!(f, "invalid value '{value}' for command '{code}'")
            }
        }
    }
}

impl core::error::Error for CommandError {}

/// Value validation rule of a [`Command`].
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Rule {
    /// Integer or fractional number, e.g. `19.5`, `-3`, `+20`.
    Number,
    /// Number without a fractional part, e.g. `117` or `16.0`.
    Integer,
    /// Time of day and weekday, `H:MM/D` or `HH:MM/D`.
    TimeOfDay,
    /// Exactly two uppercase hexadecimal digits.
    Hex,
    /// One of a fixed set of tokens.
    OneOf(&'static [&'static str]),
    /// Any value, interpreted by the gateway itself.
    Any,
}

impl Rule {
    /// Returns whether the rule accepts the given value.
    #[must_use]
    pub fn check(self, value: &str) -> bool {
        match self {
            Self::Number => is_number(value),
            Self::Integer => is_integer(value),
            Self::TimeOfDay => is_time_of_day(value),
            Self::Hex => {
                value.len() == 2
                    && value
                        .bytes()
                        .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
            }
            Self::OneOf(tokens) => tokens.contains(&value),
            Self::Any => true,
        }
    }
}

/// Gateway configuration command.
///
/// Displays as (and parses from) its two-letter code.
#[derive(
    EnumString, IntoStaticStr, VariantNames, strum::Display, PartialEq, Eq, Copy, Clone, Debug,
)]
pub enum Command {
    /// Temporarily override the thermostat setpoint (`TT`).
    #[strum(serialize = "TT")]
    TemporaryTemperature,
    /// Constantly override the thermostat setpoint (`TC`).
    #[strum(serialize = "TC")]
    ConstantTemperature,
    /// Outside temperature reported to the thermostat (`OT`).
    #[strum(serialize = "OT")]
    OutsideTemperature,
    /// Set the thermostat clock (`SC`).
    #[strum(serialize = "SC")]
    SetClock,
    /// Domestic hot water enable option (`HW`).
    #[strum(serialize = "HW")]
    HotWater,
    /// Print a report item (`PR`).
    #[strum(serialize = "PR")]
    PrintReport,
    /// Toggle summary reporting (`PS`).
    #[strum(serialize = "PS")]
    PrintSummary,
    /// Gateway or monitor mode, or reset (`GW`).
    #[strum(serialize = "GW")]
    GatewayMode,
    /// LED A function (`LA`).
    #[strum(serialize = "LA")]
    LedA,
    /// LED B function (`LB`).
    #[strum(serialize = "LB")]
    LedB,
    /// LED C function (`LC`).
    #[strum(serialize = "LC")]
    LedC,
    /// LED D function (`LD`).
    #[strum(serialize = "LD")]
    LedD,
    /// LED E function (`LE`).
    #[strum(serialize = "LE")]
    LedE,
    /// LED F function (`LF`).
    #[strum(serialize = "LF")]
    LedF,
    /// GPIO A function (`GA`).
    #[strum(serialize = "GA")]
    GpioA,
    /// GPIO B function (`GB`).
    #[strum(serialize = "GB")]
    GpioB,
    /// Setback temperature (`SB`).
    #[strum(serialize = "SB")]
    SetbackTemperature,
    /// Add an alternative Data-ID (`AA`).
    #[strum(serialize = "AA")]
    AddAlternative,
    /// Delete an alternative Data-ID (`DA`).
    #[strum(serialize = "DA")]
    DeleteAlternative,
    /// Mark a Data-ID as unsupported by the boiler (`UI`).
    #[strum(serialize = "UI")]
    UnknownId,
    /// Resume forwarding a Data-ID to the boiler (`KI`).
    #[strum(serialize = "KI")]
    KnownId,
    /// One-time priority message (`PM`).
    #[strum(serialize = "PM")]
    PriorityMessage,
    /// Configure a response sent to the thermostat (`SR`).
    #[strum(serialize = "SR")]
    SetResponse,
    /// Clear a configured response (`CR`).
    #[strum(serialize = "CR")]
    ClearResponse,
    /// Maximum central heating setpoint (`SH`).
    #[strum(serialize = "SH")]
    SetpointHeating,
    /// Domestic hot water setpoint (`SW`).
    #[strum(serialize = "SW")]
    SetpointWater,
    /// Maximum relative modulation override (`MM`).
    #[strum(serialize = "MM")]
    MaxModulation,
    /// Control setpoint override (`CS`).
    #[strum(serialize = "CS")]
    ControlSetpoint,
    /// Central heating enable bit (`CH`).
    #[strum(serialize = "CH")]
    CentralHeating,
    /// Ventilation setpoint override (`VS`).
    #[strum(serialize = "VS")]
    VentilationSetpoint,
    /// Reset a boiler counter (`RS`).
    #[strum(serialize = "RS")]
    ResetCounter,
    /// Ignore signal transitions (`IT`).
    #[strum(serialize = "IT")]
    IgnoreTransitions,
    /// Override bits in the high byte (`OH`).
    #[strum(serialize = "OH")]
    OverrideHighByte,
    /// Force thermostat model (`FT`).
    #[strum(serialize = "FT")]
    ForceThermostat,
    /// Comparator reference voltage (`VR`).
    #[strum(serialize = "VR")]
    VoltageReference,
    /// Debug pointer file register (`DP`).
    #[strum(serialize = "DP")]
    DebugPointer,
}

impl Command {
    /// Returns the two-letter code of the command.
    #[must_use]
    pub fn code(self) -> &'static str {
        self.into()
    }

    /// Returns the rule used to validate values of the command.
    #[must_use]
    pub const fn rule(self) -> Rule {
        match self {
            Self::TemporaryTemperature
            | Self::ConstantTemperature
            | Self::OutsideTemperature
            | Self::SetbackTemperature
            | Self::SetpointHeating
            | Self::SetpointWater
            | Self::ControlSetpoint => Rule::Number,
            Self::AddAlternative
            | Self::DeleteAlternative
            | Self::UnknownId
            | Self::KnownId
            | Self::PriorityMessage
            | Self::ClearResponse
            | Self::VentilationSetpoint => Rule::Integer,
            Self::SetClock => Rule::TimeOfDay,
            Self::DebugPointer => Rule::Hex,
            Self::HotWater | Self::SetResponse | Self::MaxModulation => Rule::Any,
            Self::PrintReport => Rule::OneOf(REPORT_ITEMS),
            Self::PrintSummary
            | Self::CentralHeating
            | Self::IgnoreTransitions
            | Self::OverrideHighByte => Rule::OneOf(STATES),
            Self::GatewayMode => Rule::OneOf(&["0", "1", "R"]),
            Self::LedA | Self::LedB | Self::LedC | Self::LedD | Self::LedE | Self::LedF => {
                Rule::OneOf(LED_FUNCTIONS)
            }
            Self::GpioA | Self::GpioB => Rule::OneOf(GPIO_FUNCTIONS),
            Self::ResetCounter => Rule::OneOf(COUNTERS),
            Self::ForceThermostat => Rule::OneOf(&["C", "I"]),
            Self::VoltageReference => Rule::OneOf(VOLTAGE_LEVELS),
        }
    }

    /// Returns whether the command accepts the given value.
    #[must_use]
    pub fn validate(self, value: &str) -> bool {
        self.rule().check(value)
    }
}

/// Looks up a command by its two-letter code.
///
/// Codes are case-sensitive, as on the gateway.
#[must_use]
pub fn lookup(code: &str) -> Option<Command> {
    code.parse().ok()
}

/// Splits a raw `CC=value` command into its command and value.
///
/// The value is checked against the command's [`Rule`].
/// Commands containing CR or LF are rejected regardless of the rule,
/// as they would be split into several lines on the wire.
pub fn parse(raw: &str) -> Result<(Command, &str), CommandError> {
    if raw.contains(['\r', '\n']) {
        return Err(CommandError::LineBreak(raw.into()));
    }

    if raw.chars().count() < 4 {
        return Err(CommandError::TooShort(raw.into()));
    }

    let (Some(code), Some("="), Some(value)) = (raw.get(..2), raw.get(2..3), raw.get(3..)) else {
        return Err(CommandError::MissingSeparator(raw.into()));
    };
    let cmd = lookup(code).ok_or_else(|| CommandError::UnknownCommand(code.into()))?;

    if cmd.validate(value) {
        Ok((cmd, value))
    } else {
        Err(CommandError::InvalidValue {
            code: cmd.code(),
            value: value.into(),
        })
    }
}

fn is_number(value: &str) -> bool {
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);

    !unsigned.is_empty()
        && unsigned.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && unsigned.parse::<f64>().is_ok()
}

fn is_integer(value: &str) -> bool {
    is_number(value)
        && value
            .split_once('.')
            .is_none_or(|(_, frac)| frac.bytes().all(|b| b == b'0'))
}

fn is_time_of_day(value: &str) -> bool {
    let Some((time, day)) = value.split_once('/') else {
        return false;
    };
    let Some((hours, minutes)) = time.split_once(':') else {
        return false;
    };

    matches!(hours.len(), 1 | 2)
        && minutes.len() == 2
        && parse_digits(hours).is_some_and(|h| h <= 23)
        && parse_digits(minutes).is_some_and(|m| m <= 59)
        && parse_digits(day).is_some_and(|d| (1..=7).contains(&d))
}

/// Parses a short, unsigned decimal number without sign or whitespace.
fn parse_digits(s: &str) -> Option<u8> {
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}
