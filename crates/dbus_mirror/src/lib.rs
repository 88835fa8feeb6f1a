//! Live local mirrors of remote D-Bus objects.
//!
//! The building blocks, leaf to root:
//!
//! - [`parse_introspection`]: parses an object's introspection XML into
//!   [`Interface`]/[`Method`]/[`Signal`] descriptions.
//! - [`Model`]: wraps one remote object, introspects it once, and lets you
//!   invoke any discovered method by name through a dispatch table.
//! - [`PropertyCache`]: a `Model` over `org.freedesktop.DBus.Properties`
//!   that keeps a local copy of the property table, merged from
//!   `PropertiesChanged` notifications in the background.
//! - [`ObjectManagerCache`]: a `Model` over
//!   `org.freedesktop.DBus.ObjectManager` that builds one child cache per
//!   managed object from a single `GetManagedObjects` round-trip.
//!
//! Nothing here renders anything or owns a well-known bus name; callers
//! construct caches around explicit bus addresses and read through them.

mod introspect;
pub use introspect::*;

mod error;
pub use error::*;

mod model;
pub use model::*;

mod properties;
pub use properties::*;

mod manager;
pub use manager::*;
