//! LE-specific types.

use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU16;

use crate::util::name_of;

/// Bluetooth device address ([Vol 6] Part B, Section 1.3).
#[allow(clippy::exhaustive_enums)]
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum::Display)]
pub enum Addr {
    Public(RawAddr),
    Random(RawAddr),
}

impl Addr {
    /// Constructs a peer address from type and raw components. Returns
    /// [`None`] for an unknown address type.
    #[inline]
    #[must_use]
    pub const fn peer(typ: u8, raw: RawAddr) -> Option<Self> {
        // [Vol 4] Part E, Sections 7.7.65.1 and 7.7.65.10
        match typ {
            // Public Device Address or Public Identity Address
            0x00 | 0x02 => Some(Self::Public(raw)),
            // Random Device Address or Random (Static) Identity Address
            0x01 | 0x03 => Some(Self::Random(raw)),
            _ => None,
        }
    }

    /// Returns the raw 48-bit address.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> RawAddr {
        match self {
            Self::Public(addr) | Self::Random(addr) => addr,
        }
    }
}

impl Default for Addr {
    #[inline]
    fn default() -> Self {
        Self::Public(RawAddr::default())
    }
}

/// 48-bit untyped device address stored in little-endian byte order.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct RawAddr([u8; 6]);

impl RawAddr {
    /// Wraps a little-endian address.
    #[inline(always)]
    #[must_use]
    pub const fn new(v: [u8; 6]) -> Self {
        Self(v)
    }
}

impl From<[u8; 6]> for RawAddr {
    #[inline]
    fn from(v: [u8; 6]) -> Self {
        Self(v)
    }
}

impl AsRef<[u8]> for RawAddr {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Debug for RawAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // [Vol 3] Part C, Section 3.2.1.3
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[5], self.0[4], self.0[3], self.0[2], self.0[1], self.0[0]
        )
    }
}

impl Display for RawAddr {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Connection handle ([Vol 4] Part E, Section 5.4.2).
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct ConnHandle(NonZeroU16);

impl ConnHandle {
    /// Maximum valid connection handle.
    const MAX: u16 = 0xEFF;

    /// Wraps a raw connection handle. Returns `None` if the handle is invalid.
    #[inline]
    #[must_use]
    pub const fn new(v: u16) -> Option<Self> {
        if v > Self::MAX {
            return None;
        }
        // SAFETY: v <= 0xEFF, so !v is never 0
        Some(Self(unsafe { NonZeroU16::new_unchecked(!v) }))
    }
}

impl From<ConnHandle> for u16 {
    #[inline]
    fn from(cn: ConnHandle) -> Self {
        !cn.0.get()
    }
}

impl Debug for ConnHandle {
    #[allow(clippy::use_self)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#05X})", name_of!(ConnHandle), u16::from(*self))
    }
}

impl Display for ConnHandle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Transmission power level in dBm.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct TxPower(i8);

impl TxPower {
    /// Unknown or no preference power level
    /// ([Vol 4] Part E, Sections 7.5.4 and 7.8.53).
    pub const NONE: Self = Self(0x7F);

    /// Creates a power level of `v` dBm.
    #[inline]
    #[must_use]
    pub const fn new(v: i8) -> Self {
        Self(v)
    }
}

impl Default for TxPower {
    #[inline]
    fn default() -> Self {
        Self::NONE
    }
}

impl From<TxPower> for i8 {
    #[inline]
    fn from(p: TxPower) -> Self {
        p.0
    }
}
