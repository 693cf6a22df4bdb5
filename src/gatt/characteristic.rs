use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace, warn};

use crate::gap::Uuid;
use crate::le::ConnHandle;
use crate::radio::{CharDef, Radio};
use crate::util::name_of;
use crate::{Error, PeerDevice, Result};

use super::service::WeakService;
use super::*;

/// Callback invoked with data written to a local characteristic by a peer, or
/// notified by a peer for a mirrored characteristic.
#[derive(Clone)]
#[repr(transparent)]
pub struct DataCallback(Arc<dyn Fn(&[u8], &PeerDevice) + Send + Sync>);

impl DataCallback {
    #[inline(always)]
    pub(super) fn call(&self, data: &[u8], peer: &PeerDevice) {
        (self.0)(data, peer);
    }
}

impl Debug for DataCallback {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        (f.debug_tuple(name_of!(DataCallback)).field(&Arc::as_ptr(&self.0))).finish()
    }
}

impl<T: Fn(&[u8], &PeerDevice) + Send + Sync + 'static> From<T> for DataCallback {
    #[inline(always)]
    fn from(f: T) -> Self {
        Self(Arc::new(f))
    }
}

/// Handle to a shared characteristic record.
///
/// Every clone observes the same record. A handle is either a stub, which is
/// held internally by the owning [`Service`], or an application handle. When
/// the last stub is dropped, every other handle to the record is detached and
/// the record is destroyed. Dropping an application handle only detaches that
/// handle. A detached handle behaves like a characteristic that was never
/// registered.
pub struct Characteristic {
    id: RefId,
    shared: Arc<Mutex<Shared>>,
}

impl Characteristic {
    /// Creates a characteristic that will receive a default UUID and be
    /// placed in the default service when registered.
    #[inline]
    #[must_use]
    pub fn new(desc: impl Into<String>, props: CharProps) -> Self {
        Self::with_uuids(desc, props, Uuid::default(), Uuid::default())
    }

    /// Creates a characteristic with explicit characteristic and service
    /// UUIDs. Invalid UUIDs are replaced with defaults during registration.
    #[must_use]
    pub fn with_uuids(desc: impl Into<String>, props: CharProps, uuid: Uuid, svc: Uuid) -> Self {
        Self::from_record(Record::new(desc.into(), props, uuid, svc))
    }

    /// Creates a mirror of a characteristic discovered on a peer. The handle
    /// becomes usable once it is added to the peer's [`GattServer`].
    #[must_use]
    pub fn remote(
        desc: impl Into<String>,
        props: CharProps,
        uuid: Uuid,
        svc: Uuid,
        hdls: CharHandles,
    ) -> Self {
        let mut r = Record::new(desc.into(), props, uuid, svc);
        r.local = false;
        r.hdls = hdls;
        Self::from_record(r)
    }

    fn from_record(r: Record) -> Self {
        let id = RefId::next();
        let shared = Shared {
            refs: smallvec![Ref { id, stub: false }],
            rec: Some(r),
        };
        Self {
            id,
            shared: Arc::new(Mutex::new(shared)),
        }
    }

    /// Returns whether this handle is attached to a record.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.shared.lock().rec(self.id).is_some()
    }

    /// Returns the characteristic UUID. Detached handles return the invalid
    /// default UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.with(|r| r.uuid).unwrap_or_default()
    }

    /// Returns the UUID of the owning service.
    #[must_use]
    pub fn service_uuid(&self) -> Uuid {
        self.with(|r| r.svc_uuid).unwrap_or_default()
    }

    /// Returns the characteristic properties.
    #[must_use]
    pub fn properties(&self) -> CharProps {
        self.with(|r| r.props).unwrap_or_default()
    }

    /// Returns the user description.
    #[must_use]
    pub fn description(&self) -> String {
        self.with(|r| r.desc.clone()).unwrap_or_default()
    }

    /// Returns the attribute handles assigned by the radio or discovered on
    /// the peer.
    #[must_use]
    pub fn handles(&self) -> CharHandles {
        self.with(|r| r.hdls).unwrap_or_default()
    }

    /// Returns whether this is a local characteristic.
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.with(|r| r.local).unwrap_or_default()
    }

    /// Returns the connections subscribed to notifications or indications.
    #[must_use]
    pub fn subscribers(&self) -> Vec<ConnHandle> {
        self.with(|r| r.subscribers.to_vec()).unwrap_or_default()
    }

    /// Returns the owning service, if the characteristic is registered.
    #[must_use]
    pub fn service(&self) -> Option<Service> {
        self.with(|r| r.service.upgrade()).flatten()
    }

    /// Sets the callback for data received from peers. The callback replaces
    /// any previous one and is shared by all clones of this handle.
    pub fn on_data_received(&self, f: impl Into<DataCallback>) {
        let f = f.into();
        let mut sh = self.shared.lock();
        let old = sh.rec_mut(self.id).map(|r| r.on_data.replace(f));
        drop(sh);
        drop(old);
    }

    /// Reads the characteristic value into `buf`, returning the number of
    /// bytes read. Local values come from the radio's attribute table and peer
    /// values are read over the link. Returns 0 on failure.
    pub fn value(&self, buf: &mut [u8]) -> usize {
        let Some(l) = self.link() else { return 0 };
        let n = buf.len().min(MAX_VALUE_LEN);
        let r = match l.side {
            Side::Local(_) => l.radio.char_value(l.value, &mut buf[..n]),
            Side::Peer(conn) => l.radio.read(conn, l.value, &mut buf[..n]),
        };
        r.unwrap_or_else(|e| {
            warn!("Failed to read {:?} ({e})", l.uuid);
            0
        })
    }

    /// Sets the characteristic value, truncating it to [`MAX_VALUE_LEN`]
    /// bytes, and returns the number of bytes written. Local values are
    /// stored in the radio's attribute table and pushed to every subscribed
    /// peer. Peer values are written over the link. Returns 0 on failure.
    pub fn set_value(&self, v: &[u8]) -> usize {
        let v = &v[..v.len().min(MAX_VALUE_LEN)];
        let Some(l) = self.link() else {
            debug!("Setting value of an unregistered characteristic");
            return 0;
        };
        let r = match l.side {
            Side::Local(ref subs) => l.update(subs, v),
            Side::Peer(conn) => l.write(conn, v),
        };
        match r {
            Ok(()) => v.len(),
            Err(e) => {
                warn!("Failed to set {:?} ({e})", l.uuid);
                0
            }
        }
    }

    /// Sets the characteristic value to a UTF-8 string.
    #[inline]
    pub fn set_str(&self, s: impl AsRef<str>) -> usize {
        self.set_value(s.as_ref().as_bytes())
    }

    /// Returns the number of handles attached to the record.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        let sh = self.shared.lock();
        sh.rec(self.id).map_or(0, |_| sh.refs.len())
    }

    /// Returns the number of stub handles attached to the record.
    #[must_use]
    pub fn stub_count(&self) -> usize {
        let sh = self.shared.lock();
        sh.rec(self.id).map_or(0, |_| sh.stub_count())
    }

    /// Returns whether this is a stub handle.
    #[must_use]
    pub fn is_stub(&self) -> bool {
        self.shared.lock().find(self.id).map_or(false, |r| r.stub)
    }

    /// Marks this handle as a stub.
    pub(super) fn mark_stub(&self) {
        if let Some(r) = self.shared.lock().refs.iter_mut().find(|r| r.id == self.id) {
            r.stub = true;
        }
    }

    /// Records whether the characteristic belongs to the local device.
    pub(super) fn set_local(&self, local: bool) {
        let mut sh = self.shared.lock();
        if let Some(r) = sh.rec_mut(self.id) {
            r.local = local;
        }
    }

    /// Replaces an invalid service UUID with `svc` and returns the resulting
    /// service UUID.
    pub(super) fn default_service(&self, svc: Uuid) -> Option<Uuid> {
        let mut sh = self.shared.lock();
        let r = sh.rec_mut(self.id)?;
        if !r.svc_uuid.is_valid() {
            r.svc_uuid = svc;
        }
        Some(r.svc_uuid)
    }

    /// Registers a local characteristic with the radio in the service that
    /// starts at `start`. A missing UUID is replaced with the next default
    /// UUID.
    pub(super) fn register(
        &self,
        radio: &Arc<dyn Radio>,
        svc: &Service,
        start: Handle,
    ) -> Result<()> {
        let (uuid, props, desc) = {
            let mut sh = self.shared.lock();
            let r = (sh.rec_mut(self.id)).ok_or(Error::InvalidArgument("detached characteristic"))?;
            if !r.uuid.is_valid() {
                r.uuid = next_default_uuid()?;
            }
            (r.uuid, r.props, r.desc.clone())
        };
        let def = CharDef {
            service: start,
            uuid,
            props,
            description: &desc,
        };
        let hdls = radio.add_characteristic(&def)?;
        if hdls.value.is_none() {
            return Err(Error::Internal);
        }
        debug!("Registered characteristic {uuid:?} at {hdls:?}");
        self.attach(svc, Some(Arc::clone(radio)), None, hdls);
        Ok(())
    }

    /// Attaches a peer characteristic mirror to connection `conn`.
    pub(super) fn attach_peer(&self, radio: &Arc<dyn Radio>, svc: &Service, conn: ConnHandle) {
        let hdls = self.handles();
        self.attach(svc, Some(Arc::clone(radio)), Some(conn), hdls);
    }

    fn attach(
        &self,
        svc: &Service,
        radio: Option<Arc<dyn Radio>>,
        conn: Option<ConnHandle>,
        hdls: CharHandles,
    ) {
        let (svc_uuid, service) = (svc.uuid(), svc.downgrade());
        let mut sh = self.shared.lock();
        if let Some(r) = sh.rec_mut(self.id) {
            r.svc_uuid = svc_uuid;
            r.service = service;
            r.radio = radio;
            r.conn = conn;
            r.hdls = hdls;
        }
    }

    /// Handles a write of attribute `attr` by connection `conn`. CCCD writes
    /// update the subscription list of a local characteristic. Value writes
    /// return the data callback, which the caller invokes without holding any
    /// locks.
    pub(super) fn process_write(
        &self,
        attr: Handle,
        data: &[u8],
        conn: ConnHandle,
    ) -> Option<DataCallback> {
        let mut sh = self.shared.lock();
        let r = sh.rec_mut(self.id)?;
        if r.local && r.hdls.cccd == Some(attr) {
            r.configure_cccd(conn, data.first().map_or(false, |&b| b != 0));
            return None;
        }
        if r.hdls.value != Some(attr) {
            return None;
        }
        if r.on_data.is_none() {
            trace!("No data callback for {:?}", r.uuid);
        }
        r.on_data.clone()
    }

    /// Removes all subscriptions of connection `conn`.
    pub(super) fn unsubscribe(&self, conn: ConnHandle) {
        let mut sh = self.shared.lock();
        if let Some(r) = sh.rec_mut(self.id) {
            r.configure_cccd(conn, false);
        }
    }

    /// Returns whether this handle is a handle to the same record as
    /// `other`. Detached handles are never the same.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.is_valid() && other.is_valid()
    }

    /// Calls `f` with the record if this handle is attached.
    fn with<T>(&self, f: impl FnOnce(&Record) -> T) -> Option<T> {
        self.shared.lock().rec(self.id).map(f)
    }

    /// Returns the I/O context of a registered characteristic.
    fn link(&self) -> Option<Link> {
        let sh = self.shared.lock();
        let r = sh.rec(self.id)?;
        let side = if r.local {
            Side::Local(r.subscribers.clone())
        } else {
            Side::Peer(r.conn?)
        };
        Some(Link {
            radio: Arc::clone(r.radio.as_ref()?),
            uuid: r.uuid,
            props: r.props,
            value: r.hdls.value?,
            side,
        })
    }

    /// Detaches this handle from the record.
    fn release(&self) {
        let mut sh = self.shared.lock();
        let Some(i) = sh.refs.iter().position(|r| r.id == self.id) else {
            return;
        };
        if sh.refs[i].stub && sh.stub_count() == 1 {
            if sh.refs.len() > 1 {
                trace!("Detaching {} handle(s) from the last stub", sh.refs.len() - 1);
            }
            sh.refs.clear();
        } else {
            sh.refs.swap_remove(i);
        }
        let rec = if sh.refs.is_empty() { sh.rec.take() } else { None };
        drop(sh);
        // Dropped without the lock because callbacks may own other handles
        drop(rec);
    }
}

impl Clone for Characteristic {
    /// Returns a new handle to the same record. The new handle is a stub if
    /// and only if `self` is a stub. Cloning a detached handle returns a
    /// detached handle.
    fn clone(&self) -> Self {
        let id = RefId::next();
        let mut sh = self.shared.lock();
        if let Some(stub) = sh.find(self.id).map(|r| r.stub) {
            sh.refs.push(Ref { id, stub });
        }
        drop(sh);
        Self {
            id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Detaches `self` and reattaches it to the record of `src`. The data
    /// callback of the previous record is carried over if the new record has
    /// none.
    fn clone_from(&mut self, src: &Self) {
        let cb = self.with(|r| r.on_data.clone()).flatten();
        self.release();
        self.shared = Arc::clone(&src.shared);
        let mut sh = self.shared.lock();
        let Some(stub) = sh.find(src.id).map(|r| r.stub) else {
            return;
        };
        sh.refs.push(Ref { id: self.id, stub });
        if let Some(r) = sh.rec.as_mut() {
            if r.on_data.is_none() {
                r.on_data = cb;
            }
        }
    }
}

impl Drop for Characteristic {
    #[inline]
    fn drop(&mut self) {
        self.release();
    }
}

impl Default for Characteristic {
    /// Returns an empty characteristic without properties, which cannot be
    /// registered.
    #[inline]
    fn default() -> Self {
        Self::new(String::new(), CharProps::empty())
    }
}

impl Debug for Characteristic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let sh = self.shared.lock();
        let Some(r) = sh.rec(self.id) else {
            return f.write_str("Characteristic(detached)");
        };
        f.debug_struct(name_of!(Characteristic))
            .field("uuid", &r.uuid)
            .field("desc", &r.desc)
            .field("props", &r.props)
            .field("hdls", &r.hdls)
            .field("local", &r.local)
            .finish()
    }
}

/// Returns the next default characteristic UUID. Default UUIDs are derived
/// from [`Uuid::CONTROL_SERVICE`] with a process-wide increasing 16-bit
/// suffix. The service itself uses suffix `0x0001`.
fn next_default_uuid() -> Result<Uuid> {
    static LAST: AtomicU16 = AtomicU16::new(0x0001);
    let prev = (LAST.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_add(1)))
        .map_err(|_| Error::LimitExceeded)?;
    (Uuid::CONTROL_SERVICE.derive(prev + 1)).ok_or(Error::Internal)
}

/// Unique handle identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
struct RefId(u64);

impl RefId {
    #[inline]
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Copy, Debug)]
struct Ref {
    id: RefId,
    stub: bool,
}

/// Record shared by all handles, together with the handle list.
#[derive(Debug)]
struct Shared {
    refs: SmallVec<[Ref; 2]>,
    rec: Option<Record>,
}

impl Shared {
    #[inline]
    fn find(&self, id: RefId) -> Option<&Ref> {
        self.refs.iter().find(|r| r.id == id)
    }

    #[inline]
    fn rec(&self, id: RefId) -> Option<&Record> {
        self.find(id).and(self.rec.as_ref())
    }

    #[inline]
    fn rec_mut(&mut self, id: RefId) -> Option<&mut Record> {
        self.find(id)?;
        self.rec.as_mut()
    }

    #[inline]
    fn stub_count(&self) -> usize {
        self.refs.iter().filter(|r| r.stub).count()
    }
}

#[derive(Debug)]
struct Record {
    desc: String,
    props: CharProps,
    uuid: Uuid,
    svc_uuid: Uuid,
    local: bool,
    hdls: CharHandles,
    subscribers: SmallVec<[ConnHandle; 4]>,
    conn: Option<ConnHandle>,
    service: WeakService,
    radio: Option<Arc<dyn Radio>>,
    on_data: Option<DataCallback>,
}

impl Record {
    fn new(desc: String, props: CharProps, uuid: Uuid, svc_uuid: Uuid) -> Self {
        Self {
            desc,
            props,
            uuid,
            svc_uuid,
            local: true,
            hdls: CharHandles::default(),
            subscribers: SmallVec::new(),
            conn: None,
            service: WeakService::default(),
            radio: None,
            on_data: None,
        }
    }

    /// Subscribes or unsubscribes connection `conn`.
    fn configure_cccd(&mut self, conn: ConnHandle, enable: bool) {
        if enable {
            if !self.subscribers.contains(&conn) {
                trace!("{conn} subscribed to {:?}", self.uuid);
                self.subscribers.push(conn);
            }
        } else {
            self.subscribers.retain(|&mut c| c != conn);
        }
    }
}

/// I/O context copied out of a record so that radio calls happen without
/// holding the record lock.
struct Link {
    radio: Arc<dyn Radio>,
    uuid: Uuid,
    props: CharProps,
    value: Handle,
    side: Side,
}

enum Side {
    Local(SmallVec<[ConnHandle; 4]>),
    Peer(ConnHandle),
}

impl Link {
    /// Updates a local value and pushes it to subscribers.
    fn update(&self, subs: &[ConnHandle], v: &[u8]) -> Result<()> {
        self.radio.set_char_value(self.value, v)?;
        if !self.props.has_cccd() {
            return Ok(());
        }
        let notify = self.props.contains(CharProps::NOTIFY);
        for &conn in subs {
            if notify {
                self.radio.notify(conn, self.value, v)?;
            } else {
                self.radio.indicate(conn, self.value, v)?;
            }
        }
        Ok(())
    }

    /// Writes a peer value.
    fn write(&self, conn: ConnHandle, v: &[u8]) -> Result<()> {
        if self.props.contains(CharProps::WRITE) {
            self.radio.write_with_response(conn, self.value, v)?;
        } else if self.props.contains(CharProps::WRITE_WITHOUT_RESPONSE) {
            self.radio.write_without_response(conn, self.value, v)?;
        } else {
            return Err(Error::InvalidArgument("characteristic is not writable"));
        }
        Ok(())
    }
}
