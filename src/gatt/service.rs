use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

use crate::gap::Uuid;
use crate::le::ConnHandle;
use crate::util::name_of;
use crate::{Error, Result};

use super::server::WeakServer;
use super::*;

/// Shared handle to a GATT service. Clones refer to the same service.
///
/// A service must be added to a [`GattServer`] before characteristics can be
/// added to it. The service keeps a stub handle to each of its
/// characteristics, so dropping the last handle to a service detaches all
/// application handles to its characteristics.
#[derive(Clone)]
pub struct Service(Arc<Mutex<ServiceRecord>>);

#[derive(Debug)]
struct ServiceRecord {
    uuid: Uuid,
    start: Option<Handle>,
    end: Option<Handle>,
    chars: Vec<Characteristic>,
    server: WeakServer,
}

impl Service {
    /// Creates a service that is not yet part of any server.
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self(Arc::new(Mutex::new(ServiceRecord {
            uuid,
            start: None,
            end: None,
            chars: Vec::new(),
            server: WeakServer::default(),
        })))
    }

    /// Returns the service UUID.
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0.lock().uuid
    }

    /// Returns the range of attribute handles occupied by the service.
    #[must_use]
    pub fn handles(&self) -> Option<HandleRange> {
        let r = self.0.lock();
        Some(HandleRange::new(r.start?, r.end?))
    }

    /// Returns the server that owns this service.
    #[inline]
    #[must_use]
    pub fn server(&self) -> Option<GattServer> {
        self.0.lock().server.upgrade()
    }

    /// Returns the number of characteristics.
    #[inline]
    #[must_use]
    pub fn characteristic_count(&self) -> usize {
        self.0.lock().chars.len()
    }

    /// Returns handles to all characteristics.
    #[must_use]
    pub fn characteristics(&self) -> Vec<Characteristic> {
        self.0.lock().chars.clone()
    }

    /// Returns whether `c` refers to a characteristic of this service.
    #[must_use]
    pub fn contains(&self, c: &Characteristic) -> bool {
        self.find(|v| v.same_as(c)).is_some()
    }

    /// Returns the first characteristic with the user description `desc`.
    #[must_use]
    pub fn characteristic_by_desc(&self, desc: &str) -> Option<Characteristic> {
        self.find(|c| c.description() == desc)
    }

    /// Returns the characteristic with UUID `uuid`.
    #[must_use]
    pub fn characteristic_by_uuid(&self, uuid: &Uuid) -> Option<Characteristic> {
        self.find(|c| c.uuid() == *uuid)
    }

    /// Returns the characteristic that owns attribute handle `hdl`.
    #[must_use]
    pub fn characteristic_by_handle(&self, hdl: Handle) -> Option<Characteristic> {
        self.find(|c| c.handles().contains(hdl))
    }

    /// Adds a characteristic to the service. A local characteristic is
    /// registered with the radio first, receiving a default UUID if it has
    /// none. A peer characteristic is attached to the peer's connection.
    ///
    /// The service stores a stub handle to the characteristic.
    pub fn add_characteristic(&self, c: &Characteristic) -> Result<()> {
        if !c.is_valid() {
            return Err(Error::InvalidArgument("detached characteristic"));
        }
        if c.properties().is_empty() {
            return Err(Error::InvalidArgument("characteristic has no properties"));
        }
        if self.contains(c) {
            return Err(Error::InvalidArgument("characteristic already added"));
        }
        let uuid = c.uuid();
        if uuid.is_valid() && self.characteristic_by_uuid(&uuid).is_some() {
            return Err(Error::InvalidArgument("duplicate characteristic UUID"));
        }
        let server = self.server().ok_or(Error::InvalidState)?;
        let radio = server.radio();
        if let Some(conn) = server.conn() {
            c.set_local(false);
            c.attach_peer(&radio, self, conn);
        } else {
            c.set_local(true);
            if !radio.is_initialized() {
                return Err(Error::InvalidState);
            }
            let start = self.0.lock().start.ok_or(Error::InvalidState)?;
            c.register(&radio, self, start)?;
        }
        let stub = c.clone();
        stub.mark_stub();
        let hdls = stub.handles();
        let mut r = self.0.lock();
        for h in hdls.iter() {
            r.start = Some(r.start.map_or(h, |v| v.min(h)));
            r.end = Some(r.end.map_or(h, |v| v.max(h)));
        }
        debug!("Added {:?} to service {:?}", hdls.value, r.uuid);
        r.chars.push(stub);
        Ok(())
    }

    /// Returns a weak reference to the service.
    #[inline]
    pub(super) fn downgrade(&self) -> WeakService {
        WeakService(Arc::downgrade(&self.0))
    }

    /// Attaches the service to `server`. Local services start at `start`.
    pub(super) fn attach(&self, server: &GattServer, start: Option<Handle>) {
        let mut r = self.0.lock();
        r.server = server.downgrade();
        r.start = start;
        r.end = start;
    }

    /// Routes a write of attribute `attr` to the owning characteristic,
    /// collecting any data callbacks in `cbs`.
    pub(super) fn route_write(
        &self,
        attr: Handle,
        data: &[u8],
        conn: ConnHandle,
        cbs: &mut SmallVec<[DataCallback; 2]>,
    ) {
        let r = self.0.lock();
        for c in &r.chars {
            if !c.handles().contains(attr) {
                continue;
            }
            cbs.extend(c.process_write(attr, data, conn));
            break;
        }
    }

    /// Removes all subscriptions of connection `conn`.
    pub(super) fn unsubscribe(&self, conn: ConnHandle) {
        for c in &self.0.lock().chars {
            c.unsubscribe(conn);
        }
    }

    /// Returns a handle to the first characteristic matching `f`.
    fn find(&self, f: impl Fn(&Characteristic) -> bool) -> Option<Characteristic> {
        self.0.lock().chars.iter().find(|&c| f(c)).cloned()
    }
}

impl PartialEq for Service {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Service {}

impl Debug for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let r = self.0.lock();
        f.debug_struct(name_of!(Service))
            .field("uuid", &r.uuid)
            .field("start", &r.start)
            .field("end", &r.end)
            .field("chars", &r.chars.len())
            .finish()
    }
}

/// Weak reference from a characteristic to its service.
#[derive(Clone, Debug, Default)]
pub(super) struct WeakService(Weak<Mutex<ServiceRecord>>);

impl WeakService {
    #[inline]
    pub fn upgrade(&self) -> Option<Service> {
        self.0.upgrade().map(Service)
    }
}
