use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::gap::ConnParams;
use crate::gatt::GattServer;
use crate::le::{Addr, ConnHandle};
use crate::radio::Radio;
use crate::{Error, PeerDevice, Result};

/// Central role manager. Initiates links and tracks the peripherals the
/// local device is connected to.
#[derive(Debug)]
pub struct Central {
    radio: Arc<dyn Radio>,
    gatts: GattServer,
    peripherals: Vec<PeerDevice>,
    max: usize,
    params: ConnParams,
}

impl Central {
    pub(crate) fn new(gatts: GattServer, max: usize, params: ConnParams) -> Self {
        Self {
            radio: gatts.radio(),
            gatts,
            peripherals: Vec::with_capacity(max),
            max,
            params,
        }
    }

    /// Returns the connection parameters used by [`Self::connect`].
    #[inline(always)]
    #[must_use]
    pub const fn params(&self) -> &ConnParams {
        &self.params
    }

    /// Starts connecting to `addr` with the current parameters. The link is
    /// reported by a connection event.
    pub fn connect(&self, addr: Addr) -> Result<()> {
        self.start(addr, &self.params)
    }

    /// Starts connecting to `addr` with a fixed connection `interval`, slave
    /// `latency`, and supervision `timeout`. These become the current
    /// parameters.
    pub fn connect_with(
        &mut self,
        addr: Addr,
        interval: Duration,
        latency: u16,
        timeout: Duration,
    ) -> Result<()> {
        let p = ConnParams {
            latency,
            timeout,
            ..ConnParams::default().with_interval(interval)
        };
        self.start(addr, &p)?;
        self.params = p;
        Ok(())
    }

    /// Disconnects `peer`. The peripheral with the same connection handle is
    /// removed immediately and its subscriptions to the local GATT server are
    /// dropped.
    pub fn disconnect(&mut self, peer: &PeerDevice) -> Result<()> {
        let conn = peer.conn();
        let i = (self.peripherals.iter().position(|p| p.conn() == conn))
            .ok_or(Error::InvalidArgument("unknown peripheral"))?;
        self.peripherals.remove(i);
        self.gatts.process_disconnected(conn);
        debug!("Disconnecting peripheral {:?} on {conn}", peer.addr());
        Ok(self.radio.disconnect(conn)?)
    }

    /// Returns the number of connected peripherals.
    #[inline]
    #[must_use]
    pub fn peripheral_count(&self) -> usize {
        self.peripherals.len()
    }

    /// Returns the connected peripherals in connection order.
    #[inline(always)]
    #[must_use]
    pub fn peripherals(&self) -> &[PeerDevice] {
        &self.peripherals
    }

    /// Returns the `i`-th connected peripheral.
    #[inline]
    #[must_use]
    pub fn peripheral_at(&self, i: usize) -> Option<&PeerDevice> {
        self.peripherals.get(i)
    }

    pub(crate) fn find_mut(&mut self, conn: ConnHandle) -> Option<&mut PeerDevice> {
        self.peripherals.iter_mut().find(|p| p.conn() == conn)
    }

    /// Records a new peripheral link.
    pub(crate) fn process_connected(&mut self, peer: PeerDevice) -> Result<()> {
        if self.peripherals.len() >= self.max {
            return Err(Error::LimitExceeded);
        }
        debug!("Connected to peripheral {:?} via {}", peer.addr(), peer.conn());
        self.peripherals.push(peer);
        Ok(())
    }

    /// Removes a closed peripheral link.
    pub(crate) fn process_disconnected(&mut self, conn: ConnHandle) -> Option<PeerDevice> {
        let i = self.peripherals.iter().position(|p| p.conn() == conn)?;
        debug!("Peripheral disconnected from {conn}");
        Some(self.peripherals.remove(i))
    }

    fn start(&self, addr: Addr, p: &ConnParams) -> Result<()> {
        if !p.is_valid() {
            return Err(Error::InvalidArgument("invalid connection parameters"));
        }
        if self.peripherals.len() >= self.max {
            return Err(Error::LimitExceeded);
        }
        self.radio.connect(addr, p)?;
        debug!("Connecting to {addr:?}");
        Ok(())
    }
}
