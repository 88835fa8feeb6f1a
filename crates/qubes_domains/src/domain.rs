//! A single virtualization domain, mirrored from its child object under
//! the domain manager.

use std::{collections::HashMap, sync::Arc};

use dbus_mirror::{BusObject, ChildCache, PropertyCache};
use zbus::zvariant::{ObjectPath, OwnedValue, Value};

use crate::{names, DomainManager, Error, Label, LabelsDirectory, Result};

/// A domain property value after read-time translation.
#[derive(Debug, Clone)]
pub enum Resolved {
    /// The value was a path into the label service.
    Label(Arc<Label>),
    /// The value was a path to a sibling domain.
    Domain(Arc<Domain>),
    /// Anything else, passed through untouched.
    Plain(OwnedValue),
}

/// One domain, backed by a property cache over its bus object.
///
/// The remote property types cannot express absence, so the service
/// publishes an empty string where a value is unset and object paths
/// where a value references another bus object. [`get`][Self::get] and
/// [`resolve`][Self::resolve] undo both conventions.
#[derive(Debug)]
pub struct Domain {
    properties: PropertyCache,
}

impl Domain {
    /// Mirror a domain object, fetching its property table.
    pub async fn connect(object: BusObject) -> Result<Self> {
        Ok(Domain { properties: PropertyCache::connect(object).await? })
    }

    pub fn properties(&self) -> &PropertyCache {
        &self.properties
    }

    pub fn path(&self) -> &ObjectPath<'static> {
        self.properties.model().object().path()
    }

    /// Read a property, translating the empty string to `None`.
    pub fn get(&self, key: &str) -> Result<Option<OwnedValue>> {
        let value = self.properties.get(key)?;
        if let Value::Str(s) = &*value {
            if s.as_str().is_empty() {
                return Ok(None);
            }
        }
        Ok(Some(value))
    }

    /// Read a property like [`get`][Self::get], additionally resolving
    /// object-path values into the live mirror they point to.
    ///
    /// The sibling caches are passed in by the caller; a path that points
    /// at an object neither of them mirrors is an error, the same way a
    /// missing key is.
    pub fn resolve(&self, key: &str, labels: &LabelsDirectory, manager: &DomainManager) -> Result<Option<Resolved>> {
        let value = match self.get(key)? {
            None => return Ok(None),
            Some(value) => value,
        };
        if let Value::ObjectPath(path) = &*value {
            let path = path.as_str();
            if path.starts_with(names::LABEL_PATH_PREFIX) {
                let label = labels.get(path).ok_or_else(|| Error::UnresolvedPath(path.to_owned()))?;
                return Ok(Some(Resolved::Label(label)));
            }
            if path.starts_with(names::DOMAIN_PATH_PREFIX) {
                let domain = manager.get(path).ok_or_else(|| Error::UnresolvedPath(path.to_owned()))?;
                return Ok(Some(Resolved::Domain(domain)));
            }
        }
        Ok(Some(Resolved::Plain(value)))
    }

    /// Deliberately does nothing: domain properties are read only from
    /// this consumer's side. The remote `Set` path stays reachable
    /// through [`properties`][Self::properties] for callers that know
    /// better.
    pub fn set(&self, _key: &str, _value: &Value<'_>) -> Result<()> {
        Ok(())
    }

    pub fn name(&self) -> Result<String> {
        self.string_property("name")
    }

    pub fn state(&self) -> Result<String> {
        self.string_property("state")
    }

    fn string_property(&self, key: &str) -> Result<String> {
        let value = self.properties.get(key)?;
        match &*value {
            Value::Str(s) => Ok(s.as_str().to_owned()),
            _ => Err(Error::PropertyType(key.to_owned())),
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        Ok(self.properties.model().call("Shutdown", &()).await?)
    }

    pub async fn kill(&self) -> Result<()> {
        Ok(self.properties.model().call("Kill", &()).await?)
    }
}

impl ChildCache for Domain {
    async fn attach(object: BusObject, seed: HashMap<String, OwnedValue>) -> dbus_mirror::Result<Self> {
        Ok(Domain { properties: PropertyCache::connect_seeded(object, seed).await? })
    }

    fn object_path(&self) -> &ObjectPath<'static> {
        self.path()
    }
}
