//! Length-type-value codec for legacy advertising and scan response payloads
//! ([Vol 3] Part C, Section 11 and \[CSS\] Part A, Section 1).
//!
//! Each AD structure is encoded as `[len, type, data...]`, where `len` counts
//! the type byte and the data. The codec keeps at most one structure of each
//! type: appending an existing type replaces it in place.

use std::fmt::{Debug, Formatter};

use structbuf::{Pack, StructBuf};

use blewire_const::{AdType, CompanyId};

use crate::gap::{AdvFlag, Uuid, UuidKind};
use crate::le::TxPower;
use crate::{Error, Result};

/// Legacy advertising or scan response payload.
#[derive(Clone, Copy)]
pub struct AdvData {
    buf: [u8; Self::MAX_LEN],
    len: usize,
}

impl AdvData {
    /// Maximum payload length ([Vol 6] Part B, Section 2.3.1).
    pub const MAX_LEN: usize = 31;

    /// Creates an empty payload.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0; Self::MAX_LEN],
            len: 0,
        }
    }

    /// Creates a payload from raw bytes, truncating anything past
    /// [`Self::MAX_LEN`]. The contents are not validated.
    #[must_use]
    pub fn from_raw(v: &[u8]) -> Self {
        let mut d = Self::new();
        d.len = v.len().min(Self::MAX_LEN);
        d.buf[..d.len].copy_from_slice(&v[..d.len]);
        d
    }

    /// Returns the payload length.
    #[inline(always)]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the payload is empty.
    #[inline(always)]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the encoded payload.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Removes all structures.
    #[inline]
    pub fn clear(&mut self) {
        self.buf.fill(0);
        self.len = 0;
    }

    /// Finds the first structure of type `typ` and returns its offset and
    /// total length, including the length byte. A structure whose declared
    /// length runs past the end of the payload is reported as absent.
    #[must_use]
    pub fn locate(&self, typ: impl Into<u8>) -> Option<(usize, usize)> {
        let typ = typ.into();
        let mut i = 0;
        while i + 2 <= self.len {
            let n = usize::from(self.buf[i]) + 1;
            if n > 1 && self.buf[i + 1] == typ {
                return (i + n <= self.len).then_some((i, n));
            }
            i += n;
        }
        None
    }

    /// Returns the data of the first structure of type `typ`.
    #[must_use]
    pub fn get(&self, typ: impl Into<u8>) -> Option<&[u8]> {
        let (i, n) = self.locate(typ)?;
        Some(&self.buf[i + 2..i + n])
    }

    /// Copies as much of the data of the first structure of type `typ` as
    /// fits into `out` and returns the full data length, which exceeds
    /// `out.len()` if the data was truncated. Returns 0 if the structure is
    /// missing.
    pub fn fetch(&self, typ: impl Into<u8>, out: &mut [u8]) -> usize {
        let Some(v) = self.get(typ) else { return 0 };
        let n = v.len().min(out.len());
        out[..n].copy_from_slice(&v[..n]);
        v.len()
    }

    /// Returns whether a structure of type `typ` is present.
    #[inline]
    #[must_use]
    pub fn contains(&self, typ: impl Into<u8>) -> bool {
        self.locate(typ).is_some()
    }

    /// Returns whether a structure of type `typ` is present with exactly the
    /// data `v`.
    #[inline]
    #[must_use]
    pub fn contains_value(&self, typ: impl Into<u8>, v: &[u8]) -> bool {
        self.get(typ).map_or(false, |d| d == v)
    }

    /// Appends a structure of type `typ`, or replaces the existing one in
    /// place while shifting any following structures. Returns
    /// [`Error::LimitExceeded`] and leaves the payload unchanged if the result
    /// would not fit.
    pub fn append(&mut self, typ: impl Into<u8>, v: &[u8]) -> Result<()> {
        let typ = typ.into();
        let (i, old) = self.locate(typ).unwrap_or((self.len, 0));
        let new = v.len() + 2;
        let total = self.len - old + new;
        if total > Self::MAX_LEN {
            return Err(Error::LimitExceeded);
        }
        let n = u8::try_from(v.len() + 1).map_err(|_| Error::LimitExceeded)?;
        self.buf.copy_within(i + old..self.len, i + new);
        self.buf[i] = n;
        self.buf[i + 1] = typ;
        self.buf[i + 2..i + new].copy_from_slice(v);
        self.buf[total..].fill(0);
        self.len = total;
        Ok(())
    }

    /// Removes the first structure of type `typ`, shifting any following
    /// structures down. Returns whether a structure was removed.
    pub fn remove(&mut self, typ: impl Into<u8>) -> bool {
        let Some((i, n)) = self.locate(typ) else {
            return false;
        };
        self.buf.copy_within(i + n..self.len, i);
        self.len -= n;
        self.buf[self.len..].fill(0);
        true
    }

    /// Returns an iterator over `(type, data)` pairs. Iteration stops at the
    /// first malformed structure.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter(self.as_bytes())
    }

    /// Sets the advertising flags (\[CSS\] Part A, Section 1.3).
    #[inline]
    pub fn set_flags(&mut self, v: AdvFlag) -> Result<()> {
        self.append(AdType::Flags, &[v.bits()])
    }

    /// Returns the advertising flags.
    #[must_use]
    pub fn flags(&self) -> Option<AdvFlag> {
        let &[v] = self.get(AdType::Flags)? else {
            return None;
        };
        Some(AdvFlag::from_bits_retain(v))
    }

    /// Sets the complete local name (\[CSS\] Part A, Section 1.2).
    #[inline]
    pub fn set_local_name(&mut self, name: impl AsRef<str>) -> Result<()> {
        self.append(AdType::CompleteLocalName, name.as_ref().as_bytes())
    }

    /// Returns the complete or shortened local name. Invalid UTF-8 is
    /// replaced.
    #[must_use]
    pub fn local_name(&self) -> Option<String> {
        (self.get(AdType::CompleteLocalName))
            .or_else(|| self.get(AdType::ShortLocalName))
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    /// Sets manufacturer-specific data prefixed by the company ID
    /// (\[CSS\] Part A, Section 1.4).
    pub fn set_manufacturer_data(&mut self, company: CompanyId, v: &[u8]) -> Result<()> {
        if v.len() + 2 + 2 > Self::MAX_LEN {
            return Err(Error::LimitExceeded);
        }
        let mut b = StructBuf::new(Self::MAX_LEN);
        b.append().u16(company.raw()).put(v);
        self.append(AdType::ManufacturerData, b.as_ref())
    }

    /// Sets the raw manufacturer-specific data, which must already start with
    /// a company ID.
    #[inline]
    pub fn set_custom_data(&mut self, v: &[u8]) -> Result<()> {
        self.append(AdType::ManufacturerData, v)
    }

    /// Sets the complete list of service class UUIDs to the single UUID `u`
    /// (\[CSS\] Part A, Section 1.1). Invalid UUIDs are rejected.
    pub fn set_service_uuid(&mut self, u: &Uuid) -> Result<()> {
        if !u.is_valid() {
            return Err(Error::InvalidArgument("invalid service UUID"));
        }
        let typ = match u.kind() {
            UuidKind::Short => AdType::CompleteServiceClass16,
            UuidKind::Long => AdType::CompleteServiceClass128,
        };
        self.append(typ, &u.to_le_bytes())
    }

    /// Returns the advertised service class UUIDs from the complete and
    /// incomplete lists.
    #[must_use]
    pub fn service_uuids(&self) -> Vec<Uuid> {
        let mut v = Vec::new();
        for (typ, width) in [
            (AdType::IncompleteServiceClass16, 2),
            (AdType::CompleteServiceClass16, 2),
            (AdType::IncompleteServiceClass128, 16),
            (AdType::CompleteServiceClass128, 16),
        ] {
            if let Some(d) = self.get(typ) {
                v.extend(d.chunks_exact(width).filter_map(|c| Uuid::try_from(c).ok()));
            }
        }
        v
    }

    /// Sets the TX power level (\[CSS\] Part A, Section 1.5).
    #[inline]
    pub fn set_tx_power(&mut self, p: TxPower) -> Result<()> {
        #[allow(clippy::cast_sign_loss)]
        let v = i8::from(p) as u8;
        self.append(AdType::TxPower, &[v])
    }

    /// Returns the TX power level.
    #[must_use]
    pub fn tx_power(&self) -> Option<TxPower> {
        let &[v] = self.get(AdType::TxPower)? else {
            return None;
        };
        #[allow(clippy::cast_possible_wrap)]
        let v = v as i8;
        Some(TxPower::new(v))
    }
}

impl Default for AdvData {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for AdvData {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for AdvData {}

impl AsRef<[u8]> for AdvData {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Debug for AdvData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut m = f.debug_map();
        for (typ, v) in self.iter() {
            match AdType::try_from(typ) {
                Ok(t) => m.entry(&t, &v),
                Err(_) => m.entry(&format_args!("{typ:#04X}"), &v),
            };
        }
        m.finish()
    }
}

impl<'a> IntoIterator for &'a AdvData {
    type Item = (u8, &'a [u8]);
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the structures of an [`AdvData`] payload.
#[derive(Clone, Debug)]
pub struct Iter<'a>(&'a [u8]);

impl<'a> Iterator for Iter<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&n, rest) = self.0.split_first()?;
        let n = usize::from(n);
        if n == 0 || n > rest.len() {
            self.0 = &[];
            return None;
        }
        let (s, rest) = rest.split_at(n);
        self.0 = rest;
        Some((s[0], &s[1..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_replace_remove() {
        let mut d = AdvData::new();
        d.set_flags(AdvFlag::GENERAL_LE_ONLY).unwrap();
        d.set_local_name("abc").unwrap();
        assert_eq!(d.as_bytes(), &[0x02, 0x01, 0x06, 0x04, 0x09, b'a', b'b', b'c']);

        // Replacing the first structure shifts the following one.
        d.append(AdType::Flags, &[0x04, 0x05]).unwrap();
        assert_eq!(d.as_bytes(), &[0x03, 0x01, 0x04, 0x05, 0x04, 0x09, b'a', b'b', b'c']);
        d.append(AdType::Flags, &[]).unwrap();
        assert_eq!(d.as_bytes(), &[0x01, 0x01, 0x04, 0x09, b'a', b'b', b'c']);
        assert!(d.contains(AdType::Flags));
        assert_eq!(d.get(AdType::Flags), Some(&[][..]));

        assert!(d.remove(AdType::Flags));
        assert_eq!(d.as_bytes(), &[0x04, 0x09, b'a', b'b', b'c']);
        assert!(!d.remove(AdType::Flags));
        assert_eq!(d.local_name().as_deref(), Some("abc"));

        d.clear();
        assert!(d.is_empty());
        assert_eq!(d, AdvData::new());
    }

    #[test]
    fn single_structure_per_type() {
        let mut d = AdvData::new();
        d.append(0x42, &[1]).unwrap();
        d.append(0x42, &[2, 3]).unwrap();
        d.append(0x42, &[]).unwrap();
        d.append(0x42, &[4]).unwrap();
        assert_eq!(d.iter().filter(|&(t, _)| t == 0x42).count(), 1);
        assert_eq!(d.as_bytes(), &[0x02, 0x42, 4]);
    }

    #[test]
    fn limit() {
        let mut d = AdvData::new();
        d.append(AdType::ManufacturerData, &[0xAA; 29]).unwrap();
        assert_eq!(d.len(), AdvData::MAX_LEN);
        let before = d;
        assert_eq!(d.append(AdType::Flags, &[]), Err(Error::LimitExceeded));
        assert_eq!(d, before);
        // Shrinking in place still fits.
        d.append(AdType::ManufacturerData, &[0xBB; 3]).unwrap();
        assert_eq!(d.len(), 5);
        assert_eq!(
            d.append(AdType::CompleteLocalName, &[b'x'; 27]),
            Err(Error::LimitExceeded)
        );
        d.append(AdType::CompleteLocalName, &[b'x'; 24]).unwrap();
        assert_eq!(d.len(), AdvData::MAX_LEN);
        assert_eq!(
            d.append(AdType::ManufacturerData, &[0xCC; 4]),
            Err(Error::LimitExceeded)
        );
        assert!(d.contains_value(AdType::ManufacturerData, &[0xBB; 3]));
    }

    #[test]
    fn overrun_is_absent() {
        let d = AdvData::from_raw(&[0x02, 0x01, 0x06, 0x09, 0x09, b'a']);
        assert!(d.contains(AdType::Flags));
        assert_eq!(d.locate(AdType::CompleteLocalName), None);
        assert_eq!(d.iter().count(), 1);
        assert_eq!(AdvData::from_raw(&[0; 40]).len(), AdvData::MAX_LEN);
    }

    #[test]
    fn fetch() {
        let mut d = AdvData::new();
        d.set_local_name("hello").unwrap();
        let mut out = [0; 3];
        assert_eq!(d.fetch(AdType::CompleteLocalName, &mut out), 5);
        assert_eq!(&out, b"hel");
        let mut out = [0; 8];
        assert_eq!(d.fetch(AdType::CompleteLocalName, &mut out), 5);
        assert_eq!(&out[..5], b"hello");
        assert_eq!(d.fetch(AdType::Flags, &mut out), 0);
        assert!(d.contains_value(AdType::CompleteLocalName, b"hello"));
        assert!(!d.contains_value(AdType::CompleteLocalName, b"hell"));
    }

    #[test]
    fn helpers() {
        let mut d = AdvData::new();
        d.set_manufacturer_data(CompanyId::PARTICLE, &[0x0C, 0x00]).unwrap();
        assert_eq!(d.get(AdType::ManufacturerData), Some(&[0x62, 0x06, 0x0C, 0x00][..]));
        d.set_service_uuid(&Uuid::from_u16(0x180F)).unwrap();
        d.set_tx_power(TxPower::new(-4)).unwrap();
        assert_eq!(d.tx_power(), Some(TxPower::new(-4)));
        assert_eq!(d.service_uuids(), vec![Uuid::from_u16(0x180F)]);
        assert_eq!(
            d.set_service_uuid(&Uuid::default()),
            Err(Error::InvalidArgument("invalid service UUID"))
        );
        assert_eq!(
            d.set_manufacturer_data(CompanyId::PARTICLE, &[0; 28]),
            Err(Error::LimitExceeded)
        );

        let mut s = AdvData::new();
        s.set_service_uuid(&Uuid::CONTROL_SERVICE).unwrap();
        assert_eq!(s.len(), 18);
        assert_eq!(s.service_uuids(), vec![Uuid::CONTROL_SERVICE]);
        assert_eq!(
            format!("{:?}", AdvData::from_raw(&[0x02, 0x01, 0x06])),
            "{Flags: [6]}"
        );
    }
}
