use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::gap::{AdvData, ConnParams};
use crate::gatt::{Characteristic, GattClient, GattServer};
use crate::le::{Addr, ConnHandle};
use crate::radio::{Event, LocalRole, Radio};
use crate::util::name_of;
use crate::{
    Broadcaster, Central, Config, Observer, PeerDevice, Peripheral, Result, Role, ScanResult,
};

/// Connection state change callback.
pub type ConnCallback = Box<dyn FnMut(&PeerDevice) + Send>;

/// Local Bluetooth LE device.
///
/// Owns the role components and the local GATT server model, and is the only
/// consumer of radio events. Events are queued by the radio and applied by
/// [`Self::dispatch`], either one at a time through [`Self::process_events`]
/// or continuously by [`Self::run`].
pub struct LocalDevice {
    radio: Arc<dyn Radio>,
    addr: Addr,
    broadcaster: Broadcaster,
    observer: Observer,
    peripheral: Peripheral,
    central: Central,
    gatts: GattServer,
    gattc: GattClient,
    on_connected: Option<ConnCallback>,
    on_disconnected: Option<ConnCallback>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl LocalDevice {
    /// Initializes the radio stack if needed, applies the configuration, and
    /// registers the event channel.
    pub fn new(radio: Arc<dyn Radio>, cfg: &Config) -> Result<Self> {
        if !radio.is_initialized() {
            radio.init_stack()?;
        }
        let addr = radio.device_address()?;
        radio.set_device_name(&cfg.device_name)?;
        let gatts = GattServer::local(addr, Arc::clone(&radio));
        let peripheral = Peripheral::new(gatts.clone(), cfg.max_centrals, cfg.ppcp);
        peripheral.apply_ppcp()?;
        let (tx, events) = mpsc::unbounded_channel();
        radio.set_event_sink(tx)?;
        debug!("Local device {addr:?} ({:?})", cfg.device_name);
        Ok(Self {
            broadcaster: Broadcaster::new(Arc::clone(&radio), cfg),
            observer: Observer::new(Arc::clone(&radio), cfg.scan),
            peripheral,
            central: Central::new(gatts.clone(), cfg.max_peripherals, cfg.conn),
            gatts,
            gattc: GattClient::new(),
            on_connected: None,
            on_disconnected: None,
            events,
            radio,
            addr,
        })
    }

    /// Returns the local device address.
    #[inline(always)]
    #[must_use]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    /// Sets the local device address.
    pub fn set_addr(&mut self, addr: Addr) -> Result<()> {
        self.radio.set_device_address(addr)?;
        self.addr = addr;
        Ok(())
    }

    /// Sets the GAP device name.
    #[inline]
    pub fn set_name(&self, name: &str) -> Result<()> {
        Ok(self.radio.set_device_name(name)?)
    }

    #[inline(always)]
    #[must_use]
    pub const fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    #[inline(always)]
    pub fn broadcaster_mut(&mut self) -> &mut Broadcaster {
        &mut self.broadcaster
    }

    #[inline(always)]
    #[must_use]
    pub const fn observer(&self) -> &Observer {
        &self.observer
    }

    #[inline(always)]
    pub fn observer_mut(&mut self) -> &mut Observer {
        &mut self.observer
    }

    #[inline(always)]
    #[must_use]
    pub const fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    #[inline(always)]
    pub fn peripheral_mut(&mut self) -> &mut Peripheral {
        &mut self.peripheral
    }

    #[inline(always)]
    #[must_use]
    pub const fn central(&self) -> &Central {
        &self.central
    }

    #[inline(always)]
    pub fn central_mut(&mut self) -> &mut Central {
        &mut self.central
    }

    /// Returns the local GATT server model.
    #[inline(always)]
    #[must_use]
    pub const fn gatt_server(&self) -> &GattServer {
        &self.gatts
    }

    /// Returns the GATT client adapter.
    #[inline(always)]
    #[must_use]
    pub const fn gatt_client(&self) -> &GattClient {
        &self.gattc
    }

    /// Adds a local characteristic. See [`GattServer::add_characteristic`].
    #[inline]
    pub fn add_characteristic(&self, c: &Characteristic) -> Result<()> {
        self.gatts.add_characteristic(c)
    }

    /// Sets the callbacks invoked when a link is established or closed.
    pub fn on_connection_changed(
        &mut self,
        connected: impl FnMut(&PeerDevice) + Send + 'static,
        disconnected: impl FnMut(&PeerDevice) + Send + 'static,
    ) {
        self.on_connected = Some(Box::new(connected));
        self.on_disconnected = Some(Box::new(disconnected));
    }

    /// Returns the peer connected via `conn` in either role.
    #[must_use]
    pub fn find_peer(&self, conn: ConnHandle) -> Option<&PeerDevice> {
        (self.peripheral.centrals().iter())
            .chain(self.central.peripherals())
            .find(|p| p.conn() == conn)
    }

    fn find_peer_mut(&mut self, conn: ConnHandle) -> Option<&mut PeerDevice> {
        match self.peripheral.find_mut(conn) {
            Some(p) => Some(p),
            None => self.central.find_mut(conn),
        }
    }

    /// Dispatches all queued events without waiting. Returns the number of
    /// events dispatched.
    pub fn process_events(&mut self) -> usize {
        let mut n = 0;
        while let Ok(evt) = self.events.try_recv() {
            self.dispatch(evt);
            n += 1;
        }
        n
    }

    /// Dispatches events until the radio closes the event channel.
    pub async fn run(&mut self) {
        while let Some(evt) = self.events.recv().await {
            self.dispatch(evt);
        }
        debug!("Event channel closed");
    }

    /// Applies a radio event to the device state.
    pub fn dispatch(&mut self, evt: Event) {
        trace!("{evt:?}");
        match evt {
            Event::AdvStopped => self.broadcaster.process_stopped(),
            Event::ScanResult {
                addr,
                rssi,
                data,
                scan_response,
            } => {
                let v = AdvData::from_raw(&data);
                let (adv_data, scan_response) = if scan_response {
                    (AdvData::new(), v)
                } else {
                    (v, AdvData::new())
                };
                self.observer.process_result(&ScanResult {
                    addr,
                    rssi,
                    adv_data,
                    scan_response,
                });
            }
            Event::ScanStopped => self.observer.process_stopped(),
            Event::Connected {
                conn,
                addr,
                params,
                role,
            } => self.process_connected(conn, addr, params, role),
            Event::Disconnected { conn } => self.process_disconnected(conn),
            Event::ConnParamsUpdated { conn, params } => match self.find_peer_mut(conn) {
                Some(p) => {
                    debug!("Connection parameters of {conn} updated to {params:?}");
                    p.set_params(params);
                }
                None => warn!("Parameter update for unknown {conn}"),
            },
            Event::DataWritten { conn, attr, data } => match self.find_peer(conn) {
                Some(p) => self.gatts.process_data_written(attr, &data, p),
                None => warn!("Write of {attr} by unknown {conn}"),
            },
            Event::DataNotified { conn, attr, data } => match self.find_peer(conn) {
                Some(p) => self.gattc.process_data_notified(attr, &data, p),
                None => warn!("Notification of {attr} from unknown {conn}"),
            },
        }
    }

    fn process_connected(
        &mut self,
        conn: ConnHandle,
        addr: Addr,
        params: ConnParams,
        role: LocalRole,
    ) {
        let role = match role {
            LocalRole::Peripheral => Role::Central,
            LocalRole::Central => Role::Peripheral,
        };
        let peer = PeerDevice::new(conn, role, addr, params, Arc::clone(&self.radio));
        let r = match role {
            Role::Central => self.peripheral.process_connected(peer.clone()),
            Role::Peripheral => self.central.process_connected(peer.clone()),
        };
        if let Err(e) = r {
            warn!("Rejecting {role} {addr:?} on {conn} ({e})");
            if let Err(e) = self.radio.disconnect(conn) {
                warn!("Failed to disconnect {conn} ({e})");
            }
            return;
        }
        if let Some(f) = self.on_connected.as_mut() {
            f(&peer);
        }
    }

    fn process_disconnected(&mut self, conn: ConnHandle) {
        self.gatts.process_disconnected(conn);
        let peer = (self.peripheral.process_disconnected(conn))
            .or_else(|| self.central.process_disconnected(conn));
        let Some(peer) = peer else {
            // Links closed locally are removed before the event arrives
            debug!("Disconnect of untracked {conn}");
            return;
        };
        if let Some(f) = self.on_disconnected.as_mut() {
            f(&peer);
        }
    }
}

impl Debug for LocalDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(LocalDevice))
            .field("addr", &self.addr)
            .field("broadcaster", &self.broadcaster)
            .field("observer", &self.observer)
            .field("peripheral", &self.peripheral)
            .field("central", &self.central)
            .field("gatts", &self.gatts)
            .finish_non_exhaustive()
    }
}
