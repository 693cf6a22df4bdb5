use bitflags::bitflags;

bitflags! {
    /// Advertising data flags (\[CSS\] Part A, Section 1.3).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct AdvFlag: u8 {
        /// LE Limited Discoverable Mode.
        const LE_LIMITED = 1 << 0;
        /// LE General Discoverable Mode.
        const LE_GENERAL = 1 << 1;
        /// BR/EDR Not Supported.
        const NO_BREDR = 1 << 2;
        /// Simultaneous LE and BR/EDR to Same Device Capable (Controller).
        const LE_BREDR_CONTROLLER = 1 << 3;
        /// Simultaneous LE and BR/EDR to Same Device Capable (Host).
        const LE_BREDR_HOST = 1 << 4;
    }
}

impl AdvFlag {
    /// Flags placed in the default advertising payload: general discoverable
    /// and LE-only.
    pub const GENERAL_LE_ONLY: Self = Self::LE_GENERAL.union(Self::NO_BREDR);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn general_le_only() {
        assert_eq!(AdvFlag::GENERAL_LE_ONLY.bits(), 0x06);
    }
}
