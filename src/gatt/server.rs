use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::gap::Uuid;
use crate::le::{Addr, ConnHandle};
use crate::radio::Radio;
use crate::util::name_of;
use crate::{Error, PeerDevice, Result};

use super::*;

/// Shared GATT server model.
///
/// The local device owns one server model whose services are registered
/// with the radio. Every peer device owns a server model that mirrors the
/// services discovered on the peer; its characteristics forward reads and
/// writes over the peer's connection.
#[derive(Clone)]
pub struct GattServer(Arc<Mutex<State>>);

#[derive(Debug)]
struct State {
    addr: Addr,
    /// Connection of the peer that owns the model, or `None` for the local
    /// device.
    conn: Option<ConnHandle>,
    radio: Arc<dyn Radio>,
    services: Vec<Service>,
}

impl GattServer {
    /// Creates the server model of the local device.
    #[must_use]
    pub(crate) fn local(addr: Addr, radio: Arc<dyn Radio>) -> Self {
        Self::with_state(addr, None, radio)
    }

    /// Creates the server model of a peer connected via `conn`.
    #[must_use]
    pub(crate) fn peer(addr: Addr, conn: ConnHandle, radio: Arc<dyn Radio>) -> Self {
        Self::with_state(addr, Some(conn), radio)
    }

    fn with_state(addr: Addr, conn: Option<ConnHandle>, radio: Arc<dyn Radio>) -> Self {
        Self(Arc::new(Mutex::new(State {
            addr,
            conn,
            radio,
            services: Vec::new(),
        })))
    }

    /// Returns the address of the device that owns the model.
    #[inline]
    #[must_use]
    pub fn addr(&self) -> Addr {
        self.0.lock().addr
    }

    /// Returns whether this is the local device's server model.
    #[inline]
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0.lock().conn.is_none()
    }

    /// Returns the peer connection for a peer server model.
    #[inline]
    #[must_use]
    pub fn conn(&self) -> Option<ConnHandle> {
        self.0.lock().conn
    }

    /// Returns the number of services.
    #[inline]
    #[must_use]
    pub fn service_count(&self) -> usize {
        self.0.lock().services.len()
    }

    /// Returns handles to all services.
    #[inline]
    #[must_use]
    pub fn services(&self) -> Vec<Service> {
        self.0.lock().services.clone()
    }

    /// Returns the service with UUID `uuid`.
    #[must_use]
    pub fn service(&self, uuid: &Uuid) -> Option<Service> {
        (self.0.lock().services.iter())
            .find(|s| s.uuid() == *uuid)
            .cloned()
    }

    /// Adds a service. Local services are registered with the radio, which
    /// assigns their start handle. Service UUIDs must be valid and unique
    /// within the server.
    pub fn add_service(&self, svc: &Service) -> Result<()> {
        let uuid = svc.uuid();
        if !uuid.is_valid() {
            return Err(Error::InvalidArgument("invalid service UUID"));
        }
        if svc.server().is_some() {
            return Err(Error::InvalidArgument("service already added"));
        }
        if self.service(&uuid).is_some() {
            return Err(Error::InvalidArgument("duplicate service UUID"));
        }
        let radio = self.radio();
        let start = if self.is_local() {
            if !radio.is_initialized() {
                return Err(Error::InvalidState);
            }
            Some(radio.add_service(&uuid)?)
        } else {
            None
        };
        svc.attach(self, start);
        debug!("Added service {uuid:?} at {start:?}");
        self.0.lock().services.push(svc.clone());
        Ok(())
    }

    /// Adds a characteristic to the service named by its service UUID,
    /// creating the service if necessary. A local characteristic without a
    /// valid service UUID goes into the [`Uuid::CONTROL_SERVICE`] service.
    pub fn add_characteristic(&self, c: &Characteristic) -> Result<()> {
        if !c.is_valid() {
            return Err(Error::InvalidArgument("detached characteristic"));
        }
        let local = self.is_local();
        c.set_local(local);
        let default = if local {
            Uuid::CONTROL_SERVICE
        } else {
            Uuid::default()
        };
        let uuid = (c.default_service(default))
            .ok_or(Error::InvalidArgument("detached characteristic"))?;
        let svc = match self.service(&uuid) {
            Some(svc) => svc,
            None => {
                let svc = Service::new(uuid);
                self.add_service(&svc)?;
                svc
            }
        };
        svc.add_characteristic(c)
    }

    /// Returns the first characteristic with the user description `desc`.
    #[must_use]
    pub fn characteristic_by_desc(&self, desc: &str) -> Option<Characteristic> {
        (self.services().iter()).find_map(|s| s.characteristic_by_desc(desc))
    }

    /// Returns the first characteristic with UUID `uuid`.
    #[must_use]
    pub fn characteristic_by_uuid(&self, uuid: &Uuid) -> Option<Characteristic> {
        (self.services().iter()).find_map(|s| s.characteristic_by_uuid(uuid))
    }

    /// Returns the characteristic that owns attribute handle `hdl`.
    #[must_use]
    pub fn characteristic_by_handle(&self, hdl: Handle) -> Option<Characteristic> {
        (self.services().iter()).find_map(|s| s.characteristic_by_handle(hdl))
    }

    /// Removes all subscriptions of a disconnected peer.
    pub(crate) fn process_disconnected(&self, conn: ConnHandle) {
        for s in self.services() {
            s.unsubscribe(conn);
        }
    }

    /// Routes data written to attribute `attr` by `peer` and invokes the data
    /// callbacks of the matching characteristics.
    pub(crate) fn process_data_written(&self, attr: Handle, data: &[u8], peer: &PeerDevice) {
        let mut cbs = SmallVec::<[DataCallback; 2]>::new();
        for s in self.services() {
            s.route_write(attr, data, peer.conn(), &mut cbs);
        }
        if cbs.is_empty() {
            trace!("No receiver for {attr} written by {}", peer.conn());
        }
        for cb in &cbs {
            cb.call(data, peer);
        }
    }

    #[inline]
    pub(crate) fn radio(&self) -> Arc<dyn Radio> {
        Arc::clone(&self.0.lock().radio)
    }

    #[inline]
    pub(super) fn downgrade(&self) -> WeakServer {
        WeakServer(Arc::downgrade(&self.0))
    }
}

impl PartialEq for GattServer {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for GattServer {}

impl Debug for GattServer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let st = self.0.lock();
        f.debug_struct(name_of!(GattServer))
            .field("addr", &st.addr)
            .field("conn", &st.conn)
            .field("services", &st.services)
            .finish()
    }
}

/// Weak reference from a service to its server.
#[derive(Clone, Debug, Default)]
pub(super) struct WeakServer(Weak<Mutex<State>>);

impl WeakServer {
    #[inline]
    pub fn upgrade(&self) -> Option<GattServer> {
        self.0.upgrade().map(GattServer)
    }
}

#[cfg(test)]
mod tests;
