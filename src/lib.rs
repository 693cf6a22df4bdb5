//! Role-agnostic Bluetooth LE abstraction layer.
//!
//! The local device acts as a peripheral (GATT server and advertiser) and as a
//! central (GATT client and scanner) at the same time. Local and peer
//! attributes are exposed through the same [`gatt::Characteristic`] and
//! [`gatt::Service`] handles, which may be freely cloned by the application
//! while all clones observe one shared record.
//!
//! The radio itself is an external collaborator described by the
//! [`radio::Radio`] trait. Radio events are delivered through a single
//! inbound channel and consumed by [`LocalDevice`], which is the only event
//! dispatcher. Callers must not drive one [`LocalDevice`] from several threads
//! without their own synchronization.

#![warn(missing_debug_implementations)]
#![warn(non_ascii_idents)]
#![warn(single_use_lifetimes)]
#![warn(unused_extern_crates)]
#![warn(unused_import_braces)]
#![warn(unused_lifetimes)]
#![warn(unused_qualifications)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::inline_always)]
#![allow(clippy::module_name_repetitions)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::todo)]

pub use blewire_const::{AdType, CompanyId};
pub use {
    broadcaster::*, central::*, config::Config, device::*, observer::*, peer::*, peripheral::*,
};

pub mod config;
pub mod gap;
pub mod gatt;
pub mod le;
pub mod radio;

mod broadcaster;
mod central;
mod device;
mod observer;
mod peer;
mod peripheral;
mod util;

/// Error type returned by the abstraction layer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("invalid state")]
    InvalidState,
    #[error("limit exceeded")]
    LimitExceeded,
    #[error("internal error")]
    Internal,
    #[error(transparent)]
    Radio(#[from] radio::Status),
}

/// Common result type.
pub type Result<T> = std::result::Result<T, Error>;
