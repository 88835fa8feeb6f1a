//! Mirrors of the Qubes management surface.
//!
//! The domain manager publishes one object per virtualization domain and the
//! label service publishes one object per color label. This crate wraps both
//! behind the generic caches from `dbus_mirror` and adds the read-time value
//! translation the tray widgets rely on.

mod domain;
mod error;
mod label;
mod manager;
pub mod names;

pub use domain::*;
pub use error::*;
pub use label::*;
pub use manager::*;
