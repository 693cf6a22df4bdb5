use std::fmt::{Debug, Display, Formatter};

use smallvec::SmallVec;
use structbuf::Unpack;

/// Byte order tag carried by a [`Uuid`]. Long UUIDs are stored in this order;
/// short UUIDs only record it.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ByteOrder {
    /// Most significant byte first.
    Msb,
    /// Least significant byte first.
    #[default]
    Lsb,
}

/// Width of a [`Uuid`] value.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
pub enum UuidKind {
    #[strum(serialize = "16-bit")]
    Short,
    #[strum(serialize = "128-bit")]
    Long,
}

/// 16- or 128-bit UUID ([Vol 3] Part B, Section 2.5.1) tagged with the byte
/// order of its stored value.
///
/// Two UUIDs are equal only when their kind, byte order, and stored value all
/// match. The default UUID is the short value `0`, which is not valid.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct Uuid {
    val: Value,
    order: ByteOrder,
}

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
enum Value {
    Short(u16),
    Long([u8; 16]),
}

impl Default for Value {
    #[inline]
    fn default() -> Self {
        Self::Short(0)
    }
}

impl Uuid {
    /// Base UUID of the control request service. Characteristics and services
    /// registered without a UUID derive theirs from this value.
    pub const CONTROL_SERVICE: Self = Self::from_bytes([
        0xfc, 0x36, 0x6f, 0x54, 0x30, 0x80, 0xf4, 0x94, 0xa8, 0x48, 0x4e, 0x5c, 0x01, 0x00, 0xa9,
        0x6f,
    ]);

    /// Creates a 16-bit UUID.
    #[inline]
    #[must_use]
    pub const fn from_u16(v: u16) -> Self {
        Self {
            val: Value::Short(v),
            order: ByteOrder::Lsb,
        }
    }

    /// Creates a 128-bit UUID from bytes in least-significant-first order.
    #[inline]
    #[must_use]
    pub const fn from_bytes(v: [u8; 16]) -> Self {
        Self::from_bytes_with_order(v, ByteOrder::Lsb)
    }

    /// Creates a 128-bit UUID from bytes stored in the specified order.
    #[inline]
    #[must_use]
    pub const fn from_bytes_with_order(v: [u8; 16], order: ByteOrder) -> Self {
        Self {
            val: Value::Long(v),
            order,
        }
    }

    /// Creates a 128-bit UUID by embedding a 16-bit value into `base`. In
    /// LSB order the value occupies bytes 12 (low) and 13 (high); in MSB order
    /// the two bytes are swapped.
    #[must_use]
    pub const fn with_base(base: [u8; 16], v: u16, order: ByteOrder) -> Self {
        let mut b = base;
        let [lo, hi] = v.to_le_bytes();
        let (b12, b13) = match order {
            ByteOrder::Lsb => (lo, hi),
            ByteOrder::Msb => (hi, lo),
        };
        b[12] = b12;
        b[13] = b13;
        Self::from_bytes_with_order(b, order)
    }

    /// Creates a 128-bit UUID by embedding `v` into this UUID's value, or
    /// returns [`None`] if this is a 16-bit UUID.
    #[inline]
    #[must_use]
    pub const fn derive(self, v: u16) -> Option<Self> {
        match self.val {
            Value::Long(base) => Some(Self::with_base(base, v, self.order)),
            Value::Short(_) => None,
        }
    }

    /// Returns a copy of this UUID with its byte order tag replaced. The
    /// stored value is not reordered.
    #[inline]
    #[must_use]
    pub const fn with_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Returns whether the UUID is valid. A 16-bit UUID is valid when it is
    /// non-zero, and a 128-bit UUID when any of its bytes is non-zero.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self.val {
            Value::Short(v) => v != 0,
            Value::Long(ref b) => b.iter().any(|&b| b != 0),
        }
    }

    /// Returns the UUID width.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> UuidKind {
        match self.val {
            Value::Short(_) => UuidKind::Short,
            Value::Long(_) => UuidKind::Long,
        }
    }

    /// Returns the byte order tag.
    #[inline(always)]
    #[must_use]
    pub const fn order(&self) -> ByteOrder {
        self.order
    }

    /// Returns the 16-bit value of a short UUID.
    #[inline]
    #[must_use]
    pub const fn as_u16(&self) -> Option<u16> {
        match self.val {
            Value::Short(v) => Some(v),
            Value::Long(_) => None,
        }
    }

    /// Returns the stored bytes of a long UUID in its tagged byte order.
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> Option<&[u8; 16]> {
        match self.val {
            Value::Short(_) => None,
            Value::Long(ref b) => Some(b),
        }
    }

    /// Returns the over-the-air encoding, which is always little-endian.
    #[must_use]
    pub fn to_le_bytes(&self) -> SmallVec<[u8; 16]> {
        match self.val {
            Value::Short(v) => SmallVec::from_slice(&v.to_le_bytes()),
            Value::Long(mut b) => {
                if self.order == ByteOrder::Msb {
                    b.reverse();
                }
                SmallVec::from_buf(b)
            }
        }
    }

    /// Returns the bytes of a long UUID in most-significant-first order.
    fn msb_bytes(&self) -> Option<[u8; 16]> {
        let Value::Long(mut b) = self.val else { return None };
        if self.order == ByteOrder::Lsb {
            b.reverse();
        }
        Some(b)
    }
}

impl From<u16> for Uuid {
    #[inline]
    fn from(v: u16) -> Self {
        Self::from_u16(v)
    }
}

impl From<[u8; 16]> for Uuid {
    #[inline]
    fn from(v: [u8; 16]) -> Self {
        Self::from_bytes(v)
    }
}

impl From<&str> for Uuid {
    /// Parses the canonical text form, filling the 128-bit value from the most
    /// significant byte down. Each hex digit starts a byte and consumes the
    /// following character as its low nibble. A missing or non-hex low
    /// nibble is taken as zero. Other characters, such as dashes, are
    /// skipped. Parsing stops after 16 bytes and missing bytes stay zero.
    fn from(s: &str) -> Self {
        let mut b = [0_u8; 16];
        let mut dst = b.iter_mut().rev();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            let Some(hi) = c.to_digit(16) else { continue };
            let lo = chars.next().and_then(|c| c.to_digit(16)).unwrap_or(0);
            let Some(d) = dst.next() else { break };
            #[allow(clippy::cast_possible_truncation)]
            let v = (hi << 4 | lo) as u8;
            *d = v;
        }
        Self::from_bytes(b)
    }
}

impl From<&String> for Uuid {
    #[inline]
    fn from(s: &String) -> Self {
        Self::from(s.as_str())
    }
}

impl TryFrom<&[u8]> for Uuid {
    type Error = ();

    /// Decodes a little-endian over-the-air UUID.
    #[inline]
    fn try_from(v: &[u8]) -> Result<Self, Self::Error> {
        match v.len() {
            2 => Ok(Self::from_u16(v.unpack().u16())),
            16 => Ok(Self::from_bytes(v.unpack().u128().to_le_bytes())),
            _ => Err(()),
        }
    }
}

impl Debug for Uuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)?;
        if self.order == ByteOrder::Msb {
            f.write_str(" (MSB)")?;
        }
        Ok(())
    }
}

impl Display for Uuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let Some(b) = self.msb_bytes() else {
            return write!(f, "{:#06X}", self.as_u16().unwrap_or_default());
        };
        for (i, v) in b.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{v:02X}")?;
        }
        Ok(())
    }
}
