//! Bluetooth assigned numbers used by the advertising data codec.

#![warn(missing_debug_implementations)]
#![warn(non_ascii_idents)]
#![warn(single_use_lifetimes)]
#![warn(unused_extern_crates)]
#![warn(unused_import_braces)]
#![warn(unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(clippy::cargo)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::empty_structs_with_brackets)]
#![warn(clippy::exit)]
#![warn(clippy::get_unwrap)]
#![warn(clippy::print_stdout)]
#![warn(clippy::str_to_string)]
#![warn(clippy::todo)]
#![warn(clippy::unseparated_literal_suffix)]

use std::fmt::{Debug, Display, Formatter};

/// Advertising and scan response data types
/// ([Assigned Numbers] Section 2.3, \[CSS\] Part A, Section 1).
///
/// Only the types that the codec builds or inspects are listed. The codec
/// itself accepts any raw `u8` type.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
)]
#[cfg_attr(test, derive(enum_iterator::Sequence))]
#[non_exhaustive]
#[repr(u8)]
pub enum AdType {
    Flags = 0x01,
    IncompleteServiceClass16 = 0x02,
    CompleteServiceClass16 = 0x03,
    IncompleteServiceClass32 = 0x04,
    CompleteServiceClass32 = 0x05,
    IncompleteServiceClass128 = 0x06,
    CompleteServiceClass128 = 0x07,
    ShortLocalName = 0x08,
    CompleteLocalName = 0x09,
    TxPower = 0x0A,
    PeripheralConnectionIntervalRange = 0x12,
    ServiceData16 = 0x16,
    Appearance = 0x19,
    AdvInterval = 0x1A,
    ManufacturerData = 0xFF,
}

impl AdType {
    /// Returns whether the type may appear in scan response data. Flags are
    /// only allowed in the advertising payload ([Vol 3] Part C, Section 11).
    #[inline]
    #[must_use]
    pub const fn allowed_in_scan_response(self) -> bool {
        !matches!(self, Self::Flags)
    }
}

/// Company identifier ([Assigned Numbers] Section 7.1).
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct CompanyId(pub u16);

impl CompanyId {
    /// Particle Industries, Inc.
    pub const PARTICLE: Self = Self(0x0662);

    /// Returns the raw company ID.
    #[inline(always)]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl Debug for CompanyId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CompanyId")
            .field(&format_args!("{:#06X}", self.0))
            .finish()
    }
}

impl Display for CompanyId {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

impl From<CompanyId> for u16 {
    #[inline(always)]
    fn from(id: CompanyId) -> Self {
        id.raw()
    }
}

impl From<u16> for CompanyId {
    #[inline(always)]
    fn from(v: u16) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_type_round_trip() {
        for t in enum_iterator::all::<AdType>() {
            assert_eq!(AdType::try_from(u8::from(t)).unwrap(), t);
        }
        assert!(AdType::try_from(0x00).is_err());
    }

    #[test]
    fn scan_response_types() {
        assert!(!AdType::Flags.allowed_in_scan_response());
        assert!(AdType::CompleteLocalName.allowed_in_scan_response());
        assert!(AdType::ManufacturerData.allowed_in_scan_response());
    }

    #[test]
    fn company_id() {
        assert_eq!(CompanyId::PARTICLE.raw(), 0x0662);
        assert_eq!(CompanyId::PARTICLE.to_string(), "0x0662");
        assert_eq!(format!("{:?}", CompanyId(1)), "CompanyId(0x0001)");
    }
}
