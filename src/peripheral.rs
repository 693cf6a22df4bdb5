use std::sync::Arc;

use tracing::{debug, warn};

use crate::gap::ConnParams;
use crate::gatt::GattServer;
use crate::le::ConnHandle;
use crate::radio::Radio;
use crate::{Error, PeerDevice, Result};

/// Peripheral role manager. Tracks the centrals connected to the local
/// device and owns the peripheral preferred connection parameters (PPCP).
#[derive(Debug)]
pub struct Peripheral {
    radio: Arc<dyn Radio>,
    gatts: GattServer,
    centrals: Vec<PeerDevice>,
    max: usize,
    ppcp: ConnParams,
}

impl Peripheral {
    pub(crate) fn new(gatts: GattServer, max: usize, ppcp: ConnParams) -> Self {
        Self {
            radio: gatts.radio(),
            gatts,
            centrals: Vec::with_capacity(max),
            max,
            ppcp,
        }
    }

    /// Returns the peripheral preferred connection parameters.
    #[inline(always)]
    #[must_use]
    pub const fn ppcp(&self) -> &ConnParams {
        &self.ppcp
    }

    /// Sets the peripheral preferred connection parameters and updates the
    /// radio.
    pub fn set_ppcp(&mut self, p: ConnParams) -> Result<()> {
        if !p.is_valid() {
            return Err(Error::InvalidArgument("invalid connection parameters"));
        }
        self.radio.set_ppcp(&p)?;
        self.ppcp = p;
        Ok(())
    }

    /// Writes the current preferred connection parameters to the radio.
    pub(crate) fn apply_ppcp(&self) -> Result<()> {
        Ok(self.radio.set_ppcp(&self.ppcp)?)
    }

    /// Disconnects all centrals and drops their subscriptions to the local
    /// GATT server. Returns the first failure after attempting every link.
    pub fn disconnect(&mut self) -> Result<()> {
        let mut r = Ok(());
        for c in self.centrals.drain(..) {
            self.gatts.process_disconnected(c.conn());
            if let Err(e) = self.radio.disconnect(c.conn()) {
                warn!("Failed to disconnect {} ({e})", c.conn());
                r = r.and(Err(e.into()));
            }
        }
        r
    }

    /// Returns the number of connected centrals.
    #[inline]
    #[must_use]
    pub fn central_count(&self) -> usize {
        self.centrals.len()
    }

    /// Returns whether any central is connected.
    #[inline]
    #[must_use]
    pub fn connected(&self) -> bool {
        !self.centrals.is_empty()
    }

    /// Returns the connected centrals in connection order.
    #[inline(always)]
    #[must_use]
    pub fn centrals(&self) -> &[PeerDevice] {
        &self.centrals
    }

    /// Returns the `i`-th connected central.
    #[inline]
    #[must_use]
    pub fn central_at(&self, i: usize) -> Option<&PeerDevice> {
        self.centrals.get(i)
    }

    pub(crate) fn find_mut(&mut self, conn: ConnHandle) -> Option<&mut PeerDevice> {
        self.centrals.iter_mut().find(|p| p.conn() == conn)
    }

    /// Records a new central link.
    pub(crate) fn process_connected(&mut self, peer: PeerDevice) -> Result<()> {
        if self.centrals.len() >= self.max {
            return Err(Error::LimitExceeded);
        }
        debug!("Central {:?} connected via {}", peer.addr(), peer.conn());
        self.centrals.push(peer);
        Ok(())
    }

    /// Removes a closed central link.
    pub(crate) fn process_disconnected(&mut self, conn: ConnHandle) -> Option<PeerDevice> {
        let i = self.centrals.iter().position(|p| p.conn() == conn)?;
        debug!("Central disconnected from {conn}");
        Some(self.centrals.remove(i))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::gatt::{CharProps, Characteristic};
    use crate::le::{Addr, RawAddr};
    use crate::radio::mock::{Call, MockRadio};
    use crate::radio::Status;
    use crate::Role;

    use super::*;

    fn central(radio: &Arc<MockRadio>, v: u16) -> PeerDevice {
        let conn = ConnHandle::new(v).unwrap();
        let addr = Addr::Random(RawAddr::new([0xC0, 0, 0, 0, 0, v.to_le_bytes()[0]]));
        let radio = Arc::clone(radio) as Arc<dyn Radio>;
        PeerDevice::new(conn, Role::Central, addr, ConnParams::default(), radio)
    }

    fn peripheral(radio: &Arc<MockRadio>, max: usize) -> Peripheral {
        let gatts = GattServer::local(MockRadio::ADDR, Arc::clone(radio) as Arc<dyn Radio>);
        Peripheral::new(gatts, max, ConnParams::default())
    }

    #[test]
    fn links() {
        let radio = Arc::new(MockRadio::new());
        let mut p = peripheral(&radio, 2);
        p.process_connected(central(&radio, 1)).unwrap();
        p.process_connected(central(&radio, 2)).unwrap();
        assert_eq!(p.process_connected(central(&radio, 3)), Err(Error::LimitExceeded));
        assert_eq!(p.central_count(), 2);

        // Only the matching central is removed
        let c = p.process_disconnected(ConnHandle::new(1).unwrap()).unwrap();
        assert_eq!(c.conn(), ConnHandle::new(1).unwrap());
        assert_eq!(p.central_at(0), Some(&central(&radio, 2)));
        assert!(p.process_disconnected(ConnHandle::new(1).unwrap()).is_none());

        let level = Characteristic::new("level", CharProps::NOTIFY);
        p.gatts.add_characteristic(&level).unwrap();
        let c4 = central(&radio, 4);
        p.process_connected(c4.clone()).unwrap();
        p.gatts.process_data_written(level.handles().cccd.unwrap(), &[0x01, 0x00], &c4);
        assert_eq!(level.subscribers(), vec![c4.conn()]);
        radio.fail("disconnect", Status::BUSY);
        assert_eq!(p.disconnect(), Err(Error::Radio(Status::BUSY)));
        assert!(!p.connected());
        assert!(level.subscribers().is_empty());
        radio.heal();
        p.disconnect().unwrap();
    }

    #[test]
    fn ppcp() {
        let radio = Arc::new(MockRadio::new());
        let mut p = peripheral(&radio, 1);
        let v = ConnParams::default().with_interval(Duration::from_millis(15));
        p.set_ppcp(v).unwrap();
        assert_eq!(*p.ppcp(), v);
        let bad = ConnParams {
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(50),
            ..ConnParams::default()
        };
        matches::assert_matches!(p.set_ppcp(bad), Err(Error::InvalidArgument(_)));
        assert_eq!(radio.take_calls(), vec![Call::SetPpcp(v)]);
    }
}
