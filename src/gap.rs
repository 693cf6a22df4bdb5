//! Generic Access Profile ([Vol 3] Part C): UUIDs, advertising data, and
//! link parameters.

pub use {adv_data::*, consts::*, params::*, uuid::*};

mod adv_data;
mod consts;
mod params;
mod uuid;
