use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dbus mirror error")]
    Mirror(#[from] dbus_mirror::Error),

    #[error("Dbus connection error")]
    DbusError(#[from] zbus::Error),

    #[error("property {0:?} does not hold the expected type")]
    PropertyType(String),

    #[error("no mirrored object at {0:?}")]
    UnresolvedPath(String),
}

pub type Result<T> = std::result::Result<T, Error>;
