//! Line coding and modem control line types

use crate::error::SerialError;

/// Stop bit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopBits {
    /// One stop bit
    One,
    /// One and a half stop bits
    OnePointFive,
    /// Two stop bits
    Two,
}

impl StopBits {
    /// The wire code used in the 7-byte line coding record
    pub fn code(self) -> u8 {
        match self {
            StopBits::One => 0,
            StopBits::OnePointFive => 1,
            StopBits::Two => 2,
        }
    }
}

/// Parity configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Parity {
    /// No parity bit
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
    /// Parity bit always one
    Mark,
    /// Parity bit always zero
    Space,
}

impl Parity {
    /// The wire code used in the 7-byte line coding record
    pub fn code(self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
            Parity::Mark => 3,
            Parity::Space => 4,
        }
    }
}

/// The serial framing of a port: baud rate, data bits, stop bits, parity
///
/// Cached by ports so that reconfiguring with identical values issues no
/// transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineCoding {
    /// Baud rate in bits per second
    pub baud_rate: u32,
    /// Data bits per character, 5 through 8
    pub data_bits: u8,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Parity
    pub parity: Parity,
}

impl LineCoding {
    /// Reject values the chip cannot express before any transfer is
    /// attempted
    pub fn validate(&self) -> Result<(), SerialError> {
        if self.baud_rate == 0 {
            return Err(SerialError::InvalidBaudRate(self.baud_rate));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(SerialError::InvalidDataBits(self.data_bits));
        }
        Ok(())
    }

    /// The 7-byte record carried by the "set line coding" request:
    /// baud rate as little-endian u32, stop bit code, parity code, data
    /// bits
    pub fn encode(&self) -> [u8; 7] {
        let baud = self.baud_rate.to_le_bytes();
        [
            baud[0],
            baud[1],
            baud[2],
            baud[3],
            self.stop_bits.code(),
            self.parity.code(),
            self.data_bits,
        ]
    }
}

/// The modem control lines a port drives: DTR and RTS
///
/// The in-memory value is the single source of truth for reads; it is
/// only committed after the hardware accepted the matching control
/// transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlLines(u8);

impl ControlLines {
    /// Data Terminal Ready
    pub const DTR: u8 = 0x01;
    /// Request To Send
    pub const RTS: u8 = 0x02;

    /// Whether the given line bit is set
    pub fn contains(self, line: u8) -> bool {
        self.0 & line == line
    }

    /// This value with the given line bit set or cleared
    pub fn with(self, line: u8, active: bool) -> Self {
        if active {
            Self(self.0 | line)
        } else {
            Self(self.0 & !line)
        }
    }

    /// The raw bit mask sent in the control transfer's value field
    pub fn bits(self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_line_coding() {
        let coding = LineCoding {
            baud_rate: 115_200,
            data_bits: 8,
            stop_bits: StopBits::One,
            parity: Parity::None,
        };
        assert_eq!(coding.encode(), [0x00, 0xc2, 0x01, 0x00, 0, 0, 8]);

        let coding = LineCoding {
            baud_rate: 9600,
            data_bits: 7,
            stop_bits: StopBits::Two,
            parity: Parity::Even,
        };
        assert_eq!(coding.encode(), [0x80, 0x25, 0x00, 0x00, 2, 2, 7]);
    }

    #[test]
    fn validate_rejects_bad_input() {
        let coding = LineCoding {
            baud_rate: 0,
            data_bits: 8,
            stop_bits: StopBits::One,
            parity: Parity::None,
        };
        assert!(matches!(
            coding.validate(),
            Err(SerialError::InvalidBaudRate(0))
        ));

        let coding = LineCoding {
            baud_rate: 9600,
            data_bits: 9,
            stop_bits: StopBits::One,
            parity: Parity::None,
        };
        assert!(matches!(
            coding.validate(),
            Err(SerialError::InvalidDataBits(9))
        ));
    }

    #[test]
    fn control_line_bits() {
        let lines = ControlLines::default()
            .with(ControlLines::DTR, true)
            .with(ControlLines::RTS, true);
        assert_eq!(lines.bits(), 0x03);
        assert!(lines.contains(ControlLines::DTR));

        let lines = lines.with(ControlLines::DTR, false);
        assert_eq!(lines.bits(), 0x02);
        assert!(!lines.contains(ControlLines::DTR));
        assert!(lines.contains(ControlLines::RTS));
    }
}
