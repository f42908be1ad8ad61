//! X11 connection-setup packet inspection.
//!
//! Only the fields needed to locate the authorization data are read:
//!
//! ```text
//! 0      byte-order marker ('l' = 0x6c little-endian, 'B' = 0x42 big-endian)
//! 1      unused
//! 2..6   protocol major/minor version
//! 6..8   length n of authorization-protocol-name
//! 8..10  length d of authorization-protocol-data
//! 10..12 unused
//! 12..   name (n bytes, padded to 4), data (d bytes, padded to 4)
//! ```

use std::ops::Range;

use super::cookie::X11Cookie;

pub const BYTE_ORDER_LSB_FIRST: u8 = 0x6c;
pub const BYTE_ORDER_MSB_FIRST: u8 = 0x42;

/// Size of the fixed part of the setup request.
pub const SETUP_HEADER_LEN: usize = 12;

const LENGTH_FIELDS_END: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// Why a frame could not be read as a setup packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Malformed {
    /// Too short to hold the two length fields.
    TooShort { len: usize },
    /// First byte is neither `0x6c` nor `0x42`.
    UnknownByteOrder(u8),
    /// The auth data runs past the end of the frame.
    Truncated { needed: usize, len: usize },
}

/// Fixed header of a setup packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SetupHeader {
    pub byte_order: ByteOrder,
    pub auth_name_len: usize,
    pub auth_data_len: usize,
}

impl SetupHeader {
    pub fn parse(frame: &[u8]) -> Result<Self, Malformed> {
        if frame.len() < LENGTH_FIELDS_END {
            return Err(Malformed::TooShort { len: frame.len() });
        }
        let byte_order = match frame[0] {
            BYTE_ORDER_LSB_FIRST => ByteOrder::LittleEndian,
            BYTE_ORDER_MSB_FIRST => ByteOrder::BigEndian,
            other => return Err(Malformed::UnknownByteOrder(other)),
        };
        let read_u16 = |at: usize| {
            let pair = [frame[at], frame[at + 1]];
            match byte_order {
                ByteOrder::LittleEndian => u16::from_le_bytes(pair),
                ByteOrder::BigEndian => u16::from_be_bytes(pair),
            }
        };
        Ok(Self {
            byte_order,
            auth_name_len: read_u16(6) as usize,
            auth_data_len: read_u16(8) as usize,
        })
    }

    /// Offset of the authorization data: the name is padded to 4 bytes.
    pub fn auth_data_offset(&self) -> usize {
        SETUP_HEADER_LEN + self.auth_name_len + pad4(self.auth_name_len)
    }

    pub fn auth_data_range(&self) -> Range<usize> {
        let start = self.auth_data_offset();
        start..start + self.auth_data_len
    }
}

/// Bytes needed to pad `n` up to a multiple of four.
pub fn pad4(n: usize) -> usize {
    n.wrapping_neg() & 3
}

/// Locate the authorization data inside a setup packet.
pub fn auth_data_range(frame: &[u8]) -> Result<Range<usize>, Malformed> {
    let header = SetupHeader::parse(frame)?;
    let range = header.auth_data_range();
    if frame.len() < range.end {
        return Err(Malformed::Truncated {
            needed: range.end,
            len: frame.len(),
        });
    }
    Ok(range)
}

/// Outcome of the one-time cookie gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// The presented cookie matched; forward the (possibly rewritten) frame.
    Accept { substituted: bool },
    /// The gate could not run; forward the frame untouched.
    Bypass(BypassReason),
    /// Cookie mismatch; close the channel and forward nothing.
    Reject,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BypassReason {
    /// The session never generated a fake cookie.
    NoCookie,
    Malformed(Malformed),
}

/// Validate the first frame of a forwarding channel against the fake cookie.
///
/// On acceptance, when `local_cookie` is given and has the same length as the
/// presented auth data, the auth data is overwritten in place with it.
pub fn inspect_first_frame(frame: &mut [u8], fake: Option<&X11Cookie>, local_cookie: Option<&[u8]>) -> GateDecision {
    let Some(fake) = fake else {
        return GateDecision::Bypass(BypassReason::NoCookie);
    };
    let range = match auth_data_range(frame) {
        Ok(range) => range,
        Err(malformed) => return GateDecision::Bypass(BypassReason::Malformed(malformed)),
    };
    if !fake.matches(&frame[range.clone()]) {
        return GateDecision::Reject;
    }
    let substituted = match local_cookie {
        Some(real) if real.len() == range.len() => {
            frame[range].copy_from_slice(real);
            true
        }
        _ => false,
    };
    GateDecision::Accept { substituted }
}

#[cfg(test)]
#[path = "setup_tests.rs"]
mod tests;
