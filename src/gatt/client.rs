use crate::PeerDevice;

use super::Handle;

/// GATT client adapter. Notifications and indications received from a peer
/// are routed to the matching characteristic in the peer's server model.
#[derive(Clone, Copy, Debug, Default)]
#[non_exhaustive]
pub struct GattClient;

impl GattClient {
    /// Creates a client adapter.
    #[inline(always)]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Routes data notified by `peer` for attribute `attr` to the data
    /// callback of the mirrored characteristic.
    #[inline]
    pub fn process_data_notified(&self, attr: Handle, data: &[u8], peer: &PeerDevice) {
        peer.gatt().process_data_written(attr, data, peer);
    }
}
