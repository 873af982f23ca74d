//! Decoding of OpenTherm frames into labeled values.
//!
//! Every Data-ID known to the gateway is listed in a static table, together with
//! the label used to store its value and the shape of its payload.

use crate::frame::{Frame, MessageType};
use alloc::{borrow::Cow, collections::BTreeMap, format};
use bitflags_derive::{FlagsDebug, FlagsDisplay};

/// Layout of the two data bytes of a frame.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Shape {
    /// Master and slave status flags.
    Status,
    /// Signed 8.8 fixed-point number.
    FixedPoint,
    /// Single value in the first byte.
    Byte,
    /// Index in the first byte, value in the second byte.
    Indexed,
    /// Boiler capacity and minimum modulation level.
    Capacity,
    /// Product type and version.
    Product,
}

/// Entry of the Data-ID table.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct DataId {
    /// Numeric Data-ID.
    pub id: u8,
    /// Label under which decoded values are stored.
    pub label: &'static str,
    /// Payload layout.
    pub shape: Shape,
}

impl DataId {
    const fn new(id: u8, label: &'static str, shape: Shape) -> Self {
        Self { id, label, shape }
    }
}

static DATA_IDS: [DataId; 51] = [
    DataId::new(0x00, "Status", Shape::Status),
    DataId::new(0x01, "ControlSetpoint", Shape::FixedPoint),
    DataId::new(0x02, "MasterMemberId", Shape::Byte),
    DataId::new(0x03, "SlaveMemberId", Shape::Byte),
    DataId::new(0x05, "FaultCode", Shape::Byte),
    DataId::new(0x07, "CoolingControlSignal", Shape::FixedPoint),
    DataId::new(0x08, "CH2ControlSetpoint", Shape::FixedPoint),
    DataId::new(0x09, "RemoteOverrideRoomSetpoint", Shape::FixedPoint),
    DataId::new(0x0a, "TSPNumber", Shape::Byte),
    DataId::new(0x0b, "TSPIndexAndTSPValue", Shape::Indexed),
    DataId::new(0x0c, "FHBSize", Shape::Byte),
    DataId::new(0x0d, "FHBIndexAndFHBValue", Shape::Indexed),
    DataId::new(0x0e, "MaxRelativeModulationLevel", Shape::FixedPoint),
    DataId::new(0x0f, "BoilerCapacityAndModulationLimits", Shape::Capacity),
    DataId::new(0x10, "RoomSetpoint", Shape::FixedPoint),
    DataId::new(0x11, "RelativeModulationLevel", Shape::FixedPoint),
    DataId::new(0x12, "CH-WaterPressure", Shape::FixedPoint),
    DataId::new(0x13, "DHWFlowRate", Shape::FixedPoint),
    DataId::new(0x14, "Daytime", Shape::FixedPoint),
    DataId::new(0x15, "Date", Shape::FixedPoint),
    DataId::new(0x16, "Year", Shape::FixedPoint),
    DataId::new(0x17, "CH2CurrentSetpoint", Shape::FixedPoint),
    DataId::new(0x18, "CurrentTemperature", Shape::FixedPoint),
    DataId::new(0x19, "BoilerWaterTemperature", Shape::FixedPoint),
    DataId::new(0x1a, "DHWTemperature", Shape::FixedPoint),
    DataId::new(0x1b, "OutsideTemperature", Shape::FixedPoint),
    DataId::new(0x1c, "ReturnWaterTemperature", Shape::FixedPoint),
    DataId::new(0x1d, "SolarStorageTemperature", Shape::FixedPoint),
    DataId::new(0x1e, "SolarCollectorTemperature", Shape::FixedPoint),
    DataId::new(0x1f, "CH2FlowTemperature", Shape::FixedPoint),
    DataId::new(0x20, "DHW2Temperature", Shape::FixedPoint),
    DataId::new(0x21, "BoilerExhaustTemperature", Shape::FixedPoint),
    // Labels below are kept as reported by existing installations, typos included
    DataId::new(0x30, "DHWBounadries", Shape::FixedPoint),
    DataId::new(0x31, "CHBoundaries", Shape::FixedPoint),
    DataId::new(0x32, "OTCBoundaries", Shape::FixedPoint),
    DataId::new(0x38, "DHWSetpoint", Shape::FixedPoint),
    DataId::new(0x39, "MaxCHWaterSetpoint", Shape::FixedPoint),
    DataId::new(0x3a, "MaxCHWaterSetpoint", Shape::FixedPoint),
    DataId::new(0x3b, "OTCHeatCurveRatio", Shape::FixedPoint),
    DataId::new(0x74, "StartsBurner", Shape::FixedPoint),
    DataId::new(0x75, "StartsCHPump", Shape::FixedPoint),
    DataId::new(0x76, "StartsHDWPump", Shape::FixedPoint),
    DataId::new(0x77, "StartsBurnerDHW", Shape::FixedPoint),
    DataId::new(0x78, "StartsBurnerDHW", Shape::FixedPoint),
    DataId::new(0x79, "HoursCHPump", Shape::FixedPoint),
    DataId::new(0x7a, "HoursCHPump", Shape::FixedPoint),
    DataId::new(0x7b, "HoursPumpDHW", Shape::FixedPoint),
    DataId::new(0x7c, "MasterOpenThermVersion", Shape::FixedPoint),
    DataId::new(0x7d, "SlaveOpenThermVersion", Shape::FixedPoint),
    DataId::new(0x7e, "MasterProductTypeAndVersion", Shape::Product),
    DataId::new(0x7f, "SlaveProductTypeAndVersion", Shape::Product),
];

/// Looks up a Data-ID in the table of known IDs.
#[must_use]
pub fn lookup(id: u8) -> Option<&'static DataId> {
    DATA_IDS.iter().find(|entry| entry.id == id)
}

bitflags::bitflags! {
    /// Master status flags, reported in the first data byte of Data-ID 0.
    #[derive(FlagsDisplay, FlagsDebug, PartialEq, Eq, Copy, Clone)]
    pub struct MasterStatus: u8 {
        /// Central heating is enabled.
        const CentralHeatingEnable = 0x01;
        /// Domestic hot water is enabled.
        const DomesticHotWaterEnable = 0x02;
        /// Cooling is enabled.
        const CoolingEnable = 0x04;
        /// Outside temperature compensation is active.
        const OtcActive = 0x08;
        /// Second central heating circuit is enabled.
        const Ch2Enable = 0x10;
        /// Summer mode is active.
        const SummerMode = 0x20;
        /// Reserved.
        const Reserved6 = 0x40;
        /// Reserved.
        const Reserved7 = 0x80;
    }
}

bitflags::bitflags! {
    /// Slave status flags, reported in the second data byte of Data-ID 0.
    #[derive(FlagsDisplay, FlagsDebug, PartialEq, Eq, Copy, Clone)]
    pub struct SlaveStatus: u8 {
        /// Fault indication.
        const Fault = 0x01;
        /// Central heating is active.
        const CentralHeatingActive = 0x02;
        /// Domestic hot water is active.
        const DomesticHotWaterActive = 0x04;
        /// Flame is on.
        const Flame = 0x08;
        /// Cooling is active.
        const CoolingActive = 0x10;
        /// Second central heating circuit is active.
        const Ch2Active = 0x20;
        /// Diagnostic event.
        const Diagnostics = 0x40;
        /// Reserved.
        const Reserved7 = 0x80;
    }
}

struct StatusFlag {
    name: &'static str,
    master: bool,
    mask: u8,
    labels: (&'static str, &'static str),
}

impl StatusFlag {
    const fn slave(name: &'static str, mask: u8, on: &'static str, off: &'static str) -> Self {
        Self {
            name,
            master: false,
            mask,
            labels: (on, off),
        }
    }

    const fn master(name: &'static str, mask: u8, on: &'static str, off: &'static str) -> Self {
        Self {
            name,
            master: true,
            mask,
            labels: (on, off),
        }
    }
}

// Slave flags come first so that the master's CH2-Enable replaces the slave's.
static STATUS_FLAGS: [StatusFlag; 16] = [
    StatusFlag::slave("FaultIndication", 0x01, "Fault", "No fault"),
    StatusFlag::slave("CentralHeatingMode", 0x02, "Active", "Not active"),
    StatusFlag::slave("DomesticHotWaterMode", 0x04, "Active", "Not active"),
    StatusFlag::slave("FlameStatus", 0x08, "Flame on", "Flame off"),
    StatusFlag::slave("CoolingStatus", 0x10, "Active", "Not active"),
    StatusFlag::slave("CH2-Enable", 0x20, "Enabled", "Disabled"),
    StatusFlag::slave("DiagnosticsIndication", 0x40, "Diagnostic event", "No diagnostics"),
    StatusFlag::slave("Unknown1", 0x80, "Set", "Not set"),
    StatusFlag::master("CentralHeatingEnable", 0x01, "Enabled", "Disabled"),
    StatusFlag::master("DomesticHotwaterEnable", 0x02, "Enabled", "Disabled"),
    StatusFlag::master("CoolingEnable", 0x04, "Enabled", "Disabled"),
    StatusFlag::master("OTC-Active", 0x08, "Active", "Not active"),
    StatusFlag::master("CH2-Enable", 0x10, "Enabled", "Disabled"),
    StatusFlag::master("SummerWinterMode", 0x20, "Summer", "Winter"),
    StatusFlag::master("Unknown2", 0x40, "Set", "Not set"),
    StatusFlag::master("Unknown3", 0x80, "Set", "Not set"),
];

/// Decoded status of Data-ID 0.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct Status {
    /// Master status flags (first data byte).
    pub master: MasterStatus,
    /// Slave status flags (second data byte).
    pub slave: SlaveStatus,
}

impl Status {
    /// Constructs the status from both data bytes.
    #[must_use]
    pub const fn from_bytes(byte1: u8, byte2: u8) -> Self {
        Self {
            master: MasterStatus::from_bits_retain(byte1),
            slave: SlaveStatus::from_bits_retain(byte2),
        }
    }

    fn entries(&self) -> impl Iterator<Item = (&StatusFlag, bool)> {
        STATUS_FLAGS.iter().map(|flag| {
            let bits = if flag.master {
                self.master.bits()
            } else {
                self.slave.bits()
            };

            (flag, bits & flag.mask != 0)
        })
    }

    /// Returns the named status flags.
    ///
    /// The name `CH2-Enable` is shared by both bytes and reflects the master flag.
    #[must_use]
    pub fn flags(&self) -> BTreeMap<&'static str, bool> {
        self.entries().map(|(flag, set)| (flag.name, set)).collect()
    }

    /// Returns a human-readable label for each named status flag.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<&'static str, &'static str> {
        self.entries()
            .map(|(flag, set)| {
                let (on, off) = flag.labels;
                (flag.name, if set { on } else { off })
            })
            .collect()
    }
}

/// Decoded payload of a frame.
#[derive(PartialEq, Clone, Debug)]
pub enum Value {
    /// Status flags.
    Status(Status),
    /// Fixed-point number.
    Number(f64),
    /// Single byte value.
    Byte(u8),
    /// Indexed value of a transparent slave parameter or fault history buffer.
    Indexed {
        /// Entry index.
        index: u8,
        /// Entry value.
        value: u8,
    },
    /// Boiler capacity and modulation limits.
    Capacity {
        /// Maximum boiler capacity in kW.
        capacity: u8,
        /// Minimum modulation level in percent.
        modulation_limit: u8,
    },
    /// Product type and version.
    Product {
        /// Product type.
        product_type: u8,
        /// Product version.
        version: u8,
    },
    /// Payload of an unknown Data-ID.
    Raw {
        /// First data byte.
        byte1: u8,
        /// Second data byte.
        byte2: u8,
        /// Both bytes interpreted as fixed-point number.
        fixed_point: f64,
    },
}

/// A decoded OpenTherm message.
#[derive(PartialEq, Clone, Debug)]
pub struct Message {
    /// Frame the message was decoded from.
    pub frame: Frame,
    /// Label of the Data-ID, or `UNKNOWN-ID-xx` for unknown IDs.
    pub label: Cow<'static, str>,
    /// Decoded payload.
    pub value: Value,
}

impl Message {
    /// Returns the message type of the underlying frame.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.frame.message_type()
    }
}

/// Decodes a frame according to the Data-ID table.
#[must_use]
pub fn decode(frame: Frame) -> Message {
    let Frame { byte1, byte2, .. } = frame;
    let Some(entry) = lookup(frame.data_id) else {
        return Message {
            frame,
            label: Cow::Owned(format!("UNKNOWN-ID-{:02X}", frame.data_id)),
            value: Value::Raw {
                byte1,
                byte2,
                fixed_point: frame.fixed_point(),
            },
        };
    };
    let value = match entry.shape {
        Shape::Status => Value::Status(Status::from_bytes(byte1, byte2)),
        Shape::FixedPoint => Value::Number(frame.fixed_point()),
        Shape::Byte => Value::Byte(byte1),
        Shape::Indexed => Value::Indexed {
            index: byte1,
            value: byte2,
        },
        Shape::Capacity => Value::Capacity {
            capacity: byte1,
            modulation_limit: byte2,
        },
        Shape::Product => Value::Product {
            product_type: byte1,
            version: byte2,
        },
    };

    Message {
        frame,
        label: Cow::Borrowed(entry.label),
        value,
    }
}
