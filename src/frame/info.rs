//! Info bits layered on the type byte.
//!
//! The type byte is split into two orthogonal parts: the base kind and a set
//! of info bits such as [`FrameInfo::CROSS_BOARD`]. Responses must carry the
//! info bits of the request that triggered them even though their base kind
//! differs, so the helpers here operate on the two parts independently.

use std::{fmt, ops::BitOr};

use super::FrameKind;
use crate::codec::FrameError;

/// Set of info bits carried in a type byte.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FrameInfo(u8);

impl FrameInfo {
    /// Frame is addressed to, or raised by, the badge's cross board.
    pub const CROSS_BOARD: Self = Self(0x10);
    /// Every info bit the protocol defines.
    pub const ALL: Self = Self(0x10);

    const NAMES: [(Self, &'static str); 1] = [(Self::CROSS_BOARD, "CROSS_BOARD")];

    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self { Self(0) }

    /// Extract the info bits of a raw type byte.
    #[must_use]
    pub const fn from_type_byte(byte: u8) -> Self { Self(byte & Self::ALL.0) }

    /// Raw bit representation.
    #[must_use]
    pub const fn bits(self) -> u8 { self.0 }

    #[must_use]
    pub const fn is_empty(self) -> bool { self.0 == 0 }

    /// Whether every bit of `other` is set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool { self.0 & other.0 == other.0 }

    #[must_use]
    pub const fn union(self, other: Self) -> Self { Self(self.0 | other.0) }

    #[must_use]
    pub const fn difference(self, other: Self) -> Self { Self(self.0 & !other.0) }

    /// Names of the bits that are set.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(bit, _)| self.contains(*bit))
            .map(|(_, name)| name)
    }
}

impl BitOr for FrameInfo {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self { self.union(rhs) }
}

impl fmt::Debug for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Set `info` on a raw type byte.
#[must_use]
pub const fn add_info(type_byte: u8, info: FrameInfo) -> u8 { type_byte | info.0 }

/// Clear `info` from a raw type byte.
#[must_use]
pub const fn remove_info(type_byte: u8, info: FrameInfo) -> u8 { type_byte & !info.0 }

/// Whether every bit of `info` is set on a raw type byte.
#[must_use]
pub const fn has_info(type_byte: u8, info: FrameInfo) -> bool {
    FrameInfo::from_type_byte(type_byte).contains(info)
}

/// Combine the info bits of `from` with the base kind of `to`.
///
/// Info bits already present on `to` are replaced.
///
/// # Examples
///
/// ```
/// use station_link::frame::transfer_info;
///
/// // Cross-board PushTx request answered by a plain PushTx response.
/// assert_eq!(transfer_info(0x14, 0x84), 0x94);
/// ```
#[must_use]
pub const fn transfer_info(from: u8, to: u8) -> u8 {
    remove_info(to, FrameInfo::ALL) | FrameInfo::from_type_byte(from).0
}

/// A fully decoded type byte: base kind plus info bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PacketType {
    kind: FrameKind,
    info: FrameInfo,
}

impl PacketType {
    #[must_use]
    pub const fn new(kind: FrameKind, info: FrameInfo) -> Self { Self { kind, info } }

    #[must_use]
    pub const fn kind(self) -> FrameKind { self.kind }

    #[must_use]
    pub const fn info(self) -> FrameInfo { self.info }

    /// Encoded type byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 { add_info(self.kind.as_byte(), self.info) }

    #[must_use]
    pub const fn with_info(self, info: FrameInfo) -> Self {
        Self {
            kind: self.kind,
            info: self.info.union(info),
        }
    }

    #[must_use]
    pub const fn without_info(self, info: FrameInfo) -> Self {
        Self {
            kind: self.kind,
            info: self.info.difference(info),
        }
    }

    #[must_use]
    pub const fn has_info(self, info: FrameInfo) -> bool { self.info.contains(info) }

    /// Packet type of `kind` carrying this type's info bits.
    #[must_use]
    pub const fn transfer_onto(self, kind: FrameKind) -> Self {
        Self {
            kind,
            info: self.info,
        }
    }
}

impl From<FrameKind> for PacketType {
    fn from(kind: FrameKind) -> Self { Self::new(kind, FrameInfo::empty()) }
}

impl TryFrom<u8> for PacketType {
    type Error = FrameError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let kind = FrameKind::from_byte(remove_info(byte, FrameInfo::ALL))
            .ok_or(FrameError::UnknownType(byte))?;
        Ok(Self::new(kind, FrameInfo::from_type_byte(byte)))
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.info.is_empty() {
            return f.write_str(self.kind.name());
        }
        write!(f, "{} (", self.kind.name())?;
        for (i, name) in self.info.names().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
        }
        f.write_str(")")
    }
}
