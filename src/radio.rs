//! Radio stack interface.
//!
//! The abstraction layer never talks to a controller directly. Every hardware
//! primitive goes through the [`Radio`] trait, and every asynchronous
//! occurrence comes back as an [`Event`] on the channel registered with
//! [`Radio::set_event_sink`]. Primitives are fire-and-forget: completion of
//! a connection, a scan, or an advertising timeout is only reported through
//! events.

use std::fmt::Debug;
use std::num::NonZeroI32;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::gap::{AdvParams, ConnParams, ScanParams, Uuid};
use crate::gatt::{CharHandles, CharProps, Handle};
use crate::le::{Addr, ConnHandle, TxPower};

#[cfg(test)]
pub(crate) mod mock;

/// Non-zero status code reported by a failed radio primitive.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, thiserror::Error)]
#[error("radio status {0}")]
#[repr(transparent)]
pub struct Status(NonZeroI32);

impl Status {
    /// Generic failure status.
    pub const FAILED: Self = Self::from_code(-1);
    /// The stack is busy or out of resources.
    pub const BUSY: Self = Self::from_code(-2);

    /// Wraps a raw status code. Returns `None` for `0`, which means success.
    #[inline]
    #[must_use]
    pub const fn new(code: i32) -> Option<Self> {
        match NonZeroI32::new(code) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }

    const fn from_code(code: i32) -> Self {
        match Self::new(code) {
            Some(s) => s,
            None => panic!("zero status code"),
        }
    }

    /// Returns the raw status code.
    #[inline(always)]
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0.get()
    }
}

/// Result type of radio primitives.
pub type Result<T> = std::result::Result<T, Status>;

/// Sending half of the radio event channel.
pub type EventSender = mpsc::UnboundedSender<Event>;

/// Role of the local device in a connection.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, strum::Display)]
pub enum LocalRole {
    Central,
    Peripheral,
}

/// Characteristic definition passed to [`Radio::add_characteristic`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CharDef<'a> {
    /// Start handle of the owning service.
    pub service: Handle,
    pub uuid: Uuid,
    pub props: CharProps,
    /// User description. A User Description descriptor is added when this is
    /// non-empty.
    pub description: &'a str,
}

/// Asynchronous radio event.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Event {
    /// Advertising stopped because of a timeout or an incoming connection.
    AdvStopped,
    /// Advertising or scan response report.
    ScanResult {
        addr: Addr,
        rssi: i8,
        data: Bytes,
        scan_response: bool,
    },
    /// Scanning stopped.
    ScanStopped,
    /// A link was established.
    Connected {
        conn: ConnHandle,
        addr: Addr,
        params: ConnParams,
        role: LocalRole,
    },
    /// A link was closed.
    Disconnected { conn: ConnHandle },
    /// The connection parameters of a link changed.
    ConnParamsUpdated { conn: ConnHandle, params: ConnParams },
    /// A peer wrote a local attribute.
    DataWritten {
        conn: ConnHandle,
        attr: Handle,
        data: Bytes,
    },
    /// A peer notified or indicated one of its attributes.
    DataNotified {
        conn: ConnHandle,
        attr: Handle,
        data: Bytes,
    },
}

/// Interface to the radio stack. All methods must be callable from any
/// thread and must not invoke the abstraction layer reentrantly.
pub trait Radio: Debug + Send + Sync {
    /// Initializes the stack. Must be idempotent.
    fn init_stack(&self) -> Result<()>;

    /// Returns whether the stack is initialized.
    fn is_initialized(&self) -> bool;

    /// Registers the channel for all subsequent events.
    fn set_event_sink(&self, tx: EventSender) -> Result<()>;

    /// Returns the local device address.
    fn device_address(&self) -> Result<Addr>;

    /// Sets the local device address.
    fn set_device_address(&self, addr: Addr) -> Result<()>;

    /// Sets the GAP device name.
    fn set_device_name(&self, name: &str) -> Result<()>;

    /// Returns the TX power level.
    fn tx_power(&self) -> Result<TxPower>;

    /// Sets the TX power level.
    fn set_tx_power(&self, p: TxPower) -> Result<()>;

    fn set_adv_params(&self, p: &AdvParams) -> Result<()>;
    fn set_adv_data(&self, v: &[u8]) -> Result<()>;
    fn set_scan_response_data(&self, v: &[u8]) -> Result<()>;
    fn start_advertising(&self) -> Result<()>;
    fn stop_advertising(&self) -> Result<()>;

    fn set_scan_params(&self, p: &ScanParams) -> Result<()>;
    fn start_scan(&self) -> Result<()>;
    fn stop_scan(&self) -> Result<()>;

    /// Initiates a connection. The link is reported by [`Event::Connected`].
    fn connect(&self, peer: Addr, p: &ConnParams) -> Result<()>;

    /// Terminates a link. Completion is reported by [`Event::Disconnected`].
    fn disconnect(&self, conn: ConnHandle) -> Result<()>;

    /// Sets the peripheral preferred connection parameters.
    fn set_ppcp(&self, p: &ConnParams) -> Result<()>;

    /// Adds a primary service and returns its start handle.
    fn add_service(&self, uuid: &Uuid) -> Result<Handle>;

    /// Adds a characteristic to a service added with
    /// [`Self::add_service`] and returns the assigned handles. The value
    /// handle must be assigned.
    fn add_characteristic(&self, c: &CharDef<'_>) -> Result<CharHandles>;

    /// Reads a local attribute value into `buf`, returning its length.
    fn char_value(&self, hdl: Handle, buf: &mut [u8]) -> Result<usize>;

    /// Writes a local attribute value.
    fn set_char_value(&self, hdl: Handle, v: &[u8]) -> Result<()>;

    /// Sends a notification to a subscribed peer.
    fn notify(&self, conn: ConnHandle, hdl: Handle, v: &[u8]) -> Result<()>;

    /// Sends an indication to a subscribed peer.
    fn indicate(&self, conn: ConnHandle, hdl: Handle, v: &[u8]) -> Result<()>;

    /// Reads a peer attribute into `buf`, returning its length.
    fn read(&self, conn: ConnHandle, hdl: Handle, buf: &mut [u8]) -> Result<usize>;

    /// Writes a peer attribute and waits for the response.
    fn write_with_response(&self, conn: ConnHandle, hdl: Handle, v: &[u8]) -> Result<()>;

    /// Writes a peer attribute without waiting for a response.
    fn write_without_response(&self, conn: ConnHandle, hdl: Handle, v: &[u8]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status() {
        assert!(Status::new(0).is_none());
        assert_eq!(Status::new(-5).map(Status::code), Some(-5));
        assert_eq!(Status::FAILED.to_string(), "radio status -1");
        assert_eq!(
            crate::Error::from(Status::BUSY).to_string(),
            "radio status -2"
        );
    }
}
