use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Dbus connection error")]
    DbusError(#[from] zbus::Error),
    #[error("Dbus call error")]
    FdoError(#[from] zbus::fdo::Error),
    #[error("could not parse introspection document")]
    IntrospectionError(#[from] quick_xml::DeError),
    #[error("object declares no interface named {0:?}")]
    UnknownInterface(String),
    #[error("no method named {0:?} on any interface")]
    UnknownMethod(String),
    #[error("no property named {0:?}")]
    UnknownProperty(String),
    #[error("it is not possible to delete D-Bus properties")]
    PropertyDeletion,
}

pub type Result<T> = std::result::Result<T, Error>;
