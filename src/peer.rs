use std::sync::Arc;

use crate::gap::{ConnParams, Uuid};
use crate::gatt::{Characteristic, GattServer, Handle};
use crate::le::{Addr, ConnHandle};
use crate::radio::Radio;
use crate::Result;

/// Role of a connected peer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
pub enum Role {
    /// The peer connected to the local peripheral.
    Central,
    /// The local central connected to the peer.
    Peripheral,
}

/// Remote device on an established link. Clones share the peer's GATT
/// server model.
#[derive(Clone, Debug)]
pub struct PeerDevice {
    conn: ConnHandle,
    role: Role,
    addr: Addr,
    params: ConnParams,
    gatt: GattServer,
}

impl PeerDevice {
    pub(crate) fn new(
        conn: ConnHandle,
        role: Role,
        addr: Addr,
        params: ConnParams,
        radio: Arc<dyn Radio>,
    ) -> Self {
        Self {
            conn,
            role,
            addr,
            params,
            gatt: GattServer::peer(addr, conn, radio),
        }
    }

    /// Returns the connection handle.
    #[inline(always)]
    #[must_use]
    pub const fn conn(&self) -> ConnHandle {
        self.conn
    }

    /// Returns the peer role.
    #[inline(always)]
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns the peer address.
    #[inline(always)]
    #[must_use]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    /// Returns the connection parameters negotiated for the link.
    #[inline(always)]
    #[must_use]
    pub const fn params(&self) -> &ConnParams {
        &self.params
    }

    /// Returns the model of the peer's GATT server.
    #[inline(always)]
    #[must_use]
    pub const fn gatt(&self) -> &GattServer {
        &self.gatt
    }

    /// Adds a mirror of a peer characteristic, which must have been created
    /// with [`Characteristic::remote`] to carry the peer's handles.
    #[inline]
    pub fn add_characteristic(&self, c: &Characteristic) -> Result<()> {
        self.gatt.add_characteristic(c)
    }

    /// Returns the mirrored characteristic with the user description `desc`.
    #[inline]
    #[must_use]
    pub fn characteristic_by_desc(&self, desc: &str) -> Option<Characteristic> {
        self.gatt.characteristic_by_desc(desc)
    }

    /// Returns the mirrored characteristic with UUID `uuid`.
    #[inline]
    #[must_use]
    pub fn characteristic_by_uuid(&self, uuid: &Uuid) -> Option<Characteristic> {
        self.gatt.characteristic_by_uuid(uuid)
    }

    /// Returns the mirrored characteristic that owns attribute `hdl`.
    #[inline]
    #[must_use]
    pub fn characteristic_by_handle(&self, hdl: Handle) -> Option<Characteristic> {
        self.gatt.characteristic_by_handle(hdl)
    }

    pub(crate) fn set_params(&mut self, p: ConnParams) {
        self.params = p;
    }
}

impl PartialEq for PeerDevice {
    /// Peers are equal when their connection handles and addresses match.
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.conn == other.conn && self.addr == other.addr
    }
}

impl Eq for PeerDevice {}
