use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU16;

use crate::util::name_of;

/// Attribute handle ([Vol 3] Part F, Section 3.2.2).
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct Handle(NonZeroU16);

impl Handle {
    /// Wraps a raw handle. Returns `None` if the handle is invalid.
    #[inline]
    #[must_use]
    pub const fn new(h: u16) -> Option<Self> {
        match NonZeroU16::new(h) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }
}

impl Debug for Handle {
    #[allow(clippy::use_self)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#06X})", name_of!(Handle), self.0.get())
    }
}

impl Display for Handle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl From<Handle> for u16 {
    #[inline]
    fn from(h: Handle) -> Self {
        h.0.get()
    }
}

/// Inclusive range of attribute handles occupied by a service.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[must_use]
pub struct HandleRange {
    start: Handle,
    end: Handle,
}

impl HandleRange {
    /// Creates a new handle range `start..=end`. The bounds are swapped if
    /// `end < start`.
    #[inline]
    pub fn new(start: Handle, end: Handle) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Returns the starting handle.
    #[inline(always)]
    #[must_use]
    pub const fn start(self) -> Handle {
        self.start
    }

    /// Returns the ending handle.
    #[inline(always)]
    #[must_use]
    pub const fn end(self) -> Handle {
        self.end
    }

    /// Returns whether `h` is in the range.
    #[inline]
    #[must_use]
    pub fn contains(self, h: Handle) -> bool {
        self.start <= h && h <= self.end
    }
}

/// Attribute handles of a characteristic and its descriptors as assigned by
/// the radio, or as discovered on a peer.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct CharHandles {
    /// Characteristic declaration.
    pub decl: Option<Handle>,
    /// Characteristic value.
    pub value: Option<Handle>,
    /// Characteristic User Description descriptor.
    pub user_desc: Option<Handle>,
    /// Client Characteristic Configuration descriptor.
    pub cccd: Option<Handle>,
    /// Server Characteristic Configuration descriptor.
    pub sccd: Option<Handle>,
}

impl CharHandles {
    /// Returns an iterator over all assigned handles.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Handle> {
        [self.decl, self.value, self.user_desc, self.cccd, self.sccd]
            .into_iter()
            .flatten()
    }

    /// Returns whether `h` belongs to this characteristic.
    #[inline]
    #[must_use]
    pub fn contains(&self, h: Handle) -> bool {
        self.iter().any(|v| v == h)
    }

    /// Returns the highest assigned handle.
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<Handle> {
        self.iter().max()
    }
}
