//! Generic Attribute Profile ([Vol 3] Part G).
//!
//! Local attributes and mirrors of peer attributes share one model. A
//! [`GattServer`] owns [`Service`]s, which own [`Characteristic`]s. The
//! server model of the local device registers its attributes with the radio;
//! the server model of a peer device only mirrors the peer's handles so that
//! reads and writes can be forwarded over the link.

pub use {characteristic::*, client::*, consts::*, handle::*, server::*, service::*};

mod characteristic;
mod client;
mod consts;
mod handle;
mod server;
mod service;
