use std::sync::Arc;
use std::time::Duration;

use structbuf::{Pack, StructBuf};
use tracing::{debug, warn};

use blewire_const::AdType;

use crate::gap::{AdvData, AdvFlag, AdvParams, Uuid};
use crate::le::TxPower;
use crate::radio::Radio;
use crate::{Config, Error, Result};

/// Advertiser. Owns the advertising and scan response payloads and the
/// advertising parameters.
///
/// Payload changes only take effect on the next call to one of the
/// `advertise` methods.
#[derive(Debug)]
pub struct Broadcaster {
    radio: Arc<dyn Radio>,
    adv: AdvData,
    scan_rsp: AdvData,
    params: AdvParams,
}

impl Broadcaster {
    /// Creates an advertiser with the default payloads. The advertising
    /// payload carries the flags, the complete local name, and manufacturer
    /// data consisting of the company ID and the platform ID. The scan
    /// response carries the control service UUID.
    pub(crate) fn new(radio: Arc<dyn Radio>, cfg: &Config) -> Self {
        let mut adv = AdvData::new();
        let mut scan_rsp = AdvData::new();
        let mut mfg = StructBuf::new(4);
        mfg.append().u16(cfg.company_id).u16(cfg.platform_id);
        let r = [
            adv.set_flags(AdvFlag::GENERAL_LE_ONLY),
            adv.set_local_name(&cfg.device_name),
            adv.set_custom_data(mfg.as_ref()),
            scan_rsp.set_service_uuid(&Uuid::CONTROL_SERVICE),
        ];
        for e in r.into_iter().filter_map(|r| r.err()) {
            warn!("Incomplete default advertising data ({e})");
        }
        Self {
            radio,
            adv,
            scan_rsp,
            params: cfg.adv,
        }
    }

    /// Returns the advertising payload.
    #[inline(always)]
    #[must_use]
    pub const fn adv_data(&self) -> &AdvData {
        &self.adv
    }

    /// Returns the scan response payload.
    #[inline(always)]
    #[must_use]
    pub const fn scan_response_data(&self) -> &AdvData {
        &self.scan_rsp
    }

    /// Returns the advertising parameters used by [`Self::advertise`].
    #[inline(always)]
    #[must_use]
    pub const fn params(&self) -> &AdvParams {
        &self.params
    }

    /// Sets the advertising parameters used by [`Self::advertise`].
    #[inline]
    pub fn set_params(&mut self, p: AdvParams) {
        self.params = p;
    }

    /// Adds or replaces a structure in the advertising payload.
    #[inline]
    pub fn append_adv_data(&mut self, typ: impl Into<u8>, v: &[u8]) -> Result<()> {
        self.adv.append(typ, v)
    }

    /// Sets the complete local name in the advertising payload.
    #[inline]
    pub fn append_adv_local_name(&mut self, name: impl AsRef<str>) -> Result<()> {
        self.adv.set_local_name(name)
    }

    /// Sets raw manufacturer-specific data in the advertising payload. The
    /// data must start with a company ID.
    #[inline]
    pub fn append_adv_custom_data(&mut self, v: &[u8]) -> Result<()> {
        self.adv.set_custom_data(v)
    }

    /// Sets the service UUID list of the advertising payload to `u`.
    #[inline]
    pub fn append_adv_uuid(&mut self, u: &Uuid) -> Result<()> {
        self.adv.set_service_uuid(u)
    }

    /// Removes a structure from the advertising payload. The flags cannot be
    /// removed.
    pub fn remove_adv_data(&mut self, typ: impl Into<u8>) -> Result<()> {
        let typ = typ.into();
        if typ == u8::from(AdType::Flags) {
            return Err(Error::InvalidArgument("flags cannot be removed"));
        }
        self.adv.remove(typ);
        Ok(())
    }

    /// Removes all structures except the flags from the advertising payload.
    pub fn clear_adv_data(&mut self) {
        let flags = self.adv.flags().unwrap_or(AdvFlag::GENERAL_LE_ONLY);
        self.adv.clear();
        if let Err(e) = self.adv.set_flags(flags) {
            warn!("Failed to restore advertising flags ({e})");
        }
    }

    /// Adds or replaces a structure in the scan response payload. Flags are
    /// not allowed in scan responses.
    pub fn append_scan_response_data(&mut self, typ: impl Into<u8>, v: &[u8]) -> Result<()> {
        let typ = typ.into();
        if let Ok(t) = AdType::try_from(typ) {
            if !t.allowed_in_scan_response() {
                return Err(Error::InvalidArgument("type not allowed in scan response"));
            }
        }
        self.scan_rsp.append(typ, v)
    }

    /// Sets the complete local name in the scan response payload.
    #[inline]
    pub fn append_scan_response_local_name(&mut self, name: impl AsRef<str>) -> Result<()> {
        self.scan_rsp.set_local_name(name)
    }

    /// Sets raw manufacturer-specific data in the scan response payload.
    #[inline]
    pub fn append_scan_response_custom_data(&mut self, v: &[u8]) -> Result<()> {
        self.scan_rsp.set_custom_data(v)
    }

    /// Sets the service UUID list of the scan response payload to `u`.
    #[inline]
    pub fn append_scan_response_uuid(&mut self, u: &Uuid) -> Result<()> {
        self.scan_rsp.set_service_uuid(u)
    }

    /// Removes a structure from the scan response payload.
    pub fn remove_scan_response_data(&mut self, typ: impl Into<u8>) -> Result<()> {
        let typ = typ.into();
        if typ == u8::from(AdType::Flags) {
            return Err(Error::InvalidArgument("flags cannot be removed"));
        }
        self.scan_rsp.remove(typ);
        Ok(())
    }

    /// Removes all structures from the scan response payload.
    #[inline]
    pub fn clear_scan_response_data(&mut self) {
        self.scan_rsp.clear();
    }

    /// Sets the radio TX power level.
    #[inline]
    pub fn set_tx_power(&self, p: TxPower) -> Result<()> {
        Ok(self.radio.set_tx_power(p)?)
    }

    /// Returns the radio TX power level, or [`TxPower::NONE`] if it is
    /// unknown.
    #[must_use]
    pub fn tx_power(&self) -> TxPower {
        self.radio.tx_power().unwrap_or_else(|e| {
            warn!("Failed to get TX power ({e})");
            TxPower::NONE
        })
    }

    /// Starts advertising with the current parameters.
    #[inline]
    pub fn advertise(&self) -> Result<()> {
        self.start(&self.params)
    }

    /// Starts advertising with the specified interval.
    pub fn advertise_interval(&mut self, interval: Duration) -> Result<()> {
        self.advertise_with(AdvParams {
            interval,
            ..self.params
        })
    }

    /// Starts advertising with the specified interval for at most `timeout`.
    pub fn advertise_timeout(&mut self, interval: Duration, timeout: Duration) -> Result<()> {
        self.advertise_with(AdvParams {
            interval,
            timeout,
            ..self.params
        })
    }

    /// Starts advertising with the specified parameters, which become the
    /// current parameters.
    pub fn advertise_with(&mut self, p: AdvParams) -> Result<()> {
        self.start(&p)?;
        self.params = p;
        Ok(())
    }

    /// Stops advertising.
    #[inline]
    pub fn stop_advertising(&self) -> Result<()> {
        Ok(self.radio.stop_advertising()?)
    }

    /// Handles the end of advertising.
    pub(crate) fn process_stopped(&self) {
        debug!("Advertising stopped");
    }

    fn start(&self, p: &AdvParams) -> Result<()> {
        if !p.is_valid() {
            return Err(Error::InvalidArgument("invalid advertising interval"));
        }
        self.radio.set_adv_params(p)?;
        if !self.adv.is_empty() {
            self.radio.set_adv_data(self.adv.as_bytes())?;
        }
        if !self.scan_rsp.is_empty() {
            self.radio.set_scan_response_data(self.scan_rsp.as_bytes())?;
        }
        self.radio.start_advertising()?;
        debug!("Advertising every {:?}", p.interval);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;

    use crate::radio::mock::{Call, MockRadio};
    use crate::radio::Status;

    use super::*;

    fn broadcaster() -> (Arc<MockRadio>, Broadcaster) {
        let radio = Arc::new(MockRadio::new());
        let cfg = Config {
            device_name: "Argon".to_owned(),
            platform_id: 0x000C,
            ..Config::default()
        };
        let b = Broadcaster::new(Arc::clone(&radio) as Arc<dyn Radio>, &cfg);
        (radio, b)
    }

    #[test]
    fn default_payloads() {
        let (_, b) = broadcaster();
        assert_eq!(
            b.adv_data().as_bytes(),
            &[
                0x02, 0x01, 0x06, // Flags
                0x06, 0x09, b'A', b'r', b'g', b'o', b'n', // Complete local name
                0x05, 0xFF, 0x62, 0x06, 0x0C, 0x00, // Manufacturer data
            ]
        );
        assert_eq!(b.scan_response_data().len(), 18);
        assert_eq!(
            b.scan_response_data().get(AdType::CompleteServiceClass128),
            Some(&Uuid::CONTROL_SERVICE.as_bytes().unwrap()[..])
        );
    }

    #[test]
    fn flags_rules() {
        let (_, mut b) = broadcaster();
        assert_matches!(
            b.append_scan_response_data(AdType::Flags, &[0x06]),
            Err(Error::InvalidArgument(_))
        );
        assert_matches!(b.remove_adv_data(AdType::Flags), Err(Error::InvalidArgument(_)));
        assert_matches!(
            b.remove_scan_response_data(AdType::Flags),
            Err(Error::InvalidArgument(_))
        );
        assert!(b.adv_data().contains(AdType::Flags));
        b.remove_adv_data(AdType::CompleteLocalName).unwrap();
        assert!(!b.adv_data().contains(AdType::CompleteLocalName));
        b.clear_adv_data();
        assert_eq!(b.adv_data().iter().count(), 1);
        assert_eq!(b.adv_data().flags(), Some(AdvFlag::GENERAL_LE_ONLY));

        b.append_adv_data(AdType::Flags, &[0x05]).unwrap();
        b.append_adv_local_name("x").unwrap();
        b.clear_adv_data();
        assert_eq!(b.adv_data().as_bytes(), &[0x02, 0x01, 0x05]);
    }

    #[test]
    fn advertise_skips_empty_payloads() {
        let (radio, mut b) = broadcaster();
        b.clear_scan_response_data();
        b.advertise_timeout(Duration::from_millis(200), Duration::from_secs(10))
            .unwrap();
        let calls = radio.take_calls();
        assert_eq!(calls.len(), 3);
        assert_matches!(&calls[0], Call::SetAdvParams(p) if p.interval == Duration::from_millis(200)
            && p.timeout == Duration::from_secs(10));
        assert_eq!(calls[1], Call::SetAdvData(b.adv_data().as_bytes().to_vec()));
        assert_eq!(calls[2], Call::StartAdvertising);

        b.advertise().unwrap();
        assert_eq!(radio.take_calls().len(), 3);
        b.stop_advertising().unwrap();
        assert_eq!(radio.take_calls(), vec![Call::StopAdvertising]);
    }

    #[test]
    fn advertise_forwards_status() {
        let (radio, b) = broadcaster();
        radio.fail("start_advertising", Status::BUSY);
        assert_eq!(b.advertise(), Err(Error::Radio(Status::BUSY)));
        radio.fail("tx_power", Status::FAILED);
        assert_eq!(b.tx_power(), TxPower::NONE);
        radio.heal();
        b.set_tx_power(TxPower::new(4)).unwrap();
        assert_eq!(b.tx_power(), TxPower::new(4));
    }

    #[test]
    fn advertise_rejects_invalid_interval() {
        let (radio, mut b) = broadcaster();
        assert_matches!(
            b.advertise_interval(Duration::from_millis(10)),
            Err(Error::InvalidArgument(_))
        );
        assert_matches!(
            b.advertise_timeout(Duration::from_secs(11), Duration::from_secs(1)),
            Err(Error::InvalidArgument(_))
        );
        assert_eq!(*b.params(), AdvParams::default());
        assert!(radio.calls().is_empty());

        b.advertise_interval(AdvParams::MIN_INTERVAL).unwrap();
        assert_eq!(b.params().interval, AdvParams::MIN_INTERVAL);
    }

    #[test]
    fn long_name_does_not_fit() {
        let radio = Arc::new(MockRadio::new());
        let cfg = Config {
            device_name: "x".repeat(30),
            ..Config::default()
        };
        let b = Broadcaster::new(radio as Arc<dyn Radio>, &cfg);
        assert_eq!(b.adv_data().flags(), Some(AdvFlag::GENERAL_LE_ONLY));
        assert!(!b.adv_data().contains(AdType::CompleteLocalName));
        assert!(b.adv_data().contains(AdType::ManufacturerData));
        assert!(!b.scan_response_data().is_empty());
    }
}
