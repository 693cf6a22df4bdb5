use bitflags::bitflags;

/// Maximum characteristic value length. Longer values are truncated.
pub const MAX_VALUE_LEN: usize = 244;

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct CharProps: u8 {
        /// Permits broadcasts of the characteristic value using the Server
        /// Characteristic Configuration descriptor.
        const BROADCAST = 0x01;
        /// Permits reads of the characteristic value.
        const READ = 0x02;
        /// Permits writes of the characteristic value without response.
        const WRITE_WITHOUT_RESPONSE = 0x04;
        /// Permits writes of the characteristic value with response.
        const WRITE = 0x08;
        /// Permits notifications of the characteristic value without
        /// acknowledgment. The Client Characteristic Configuration descriptor
        /// exists.
        const NOTIFY = 0x10;
        /// Permits indications of the characteristic value with
        /// acknowledgment. The Client Characteristic Configuration descriptor
        /// exists.
        const INDICATE = 0x20;
        /// Permits signed writes to the characteristic value.
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        /// Additional properties are defined in the Characteristic Extended
        /// Properties descriptor.
        const EXTENDED_PROPERTIES = 0x80;
    }
}

impl CharProps {
    /// Returns whether the characteristic has a Client Characteristic
    /// Configuration descriptor.
    #[inline]
    #[must_use]
    pub const fn has_cccd(self) -> bool {
        self.intersects(Self::NOTIFY.union(Self::INDICATE))
    }
}

bitflags! {
    /// Client Characteristic Configuration descriptor value
    /// ([Vol 3] Part G, Section 3.3.3.3).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct Cccd: u8 {
        /// The characteristic value shall be notified.
        const NOTIFY = 1 << 0;
        /// The characteristic value shall be indicated.
        const INDICATE = 1 << 1;
    }
}
