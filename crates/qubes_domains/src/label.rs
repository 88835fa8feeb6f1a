//! The label service: one object per color label under
//! `/org/qubes/Labels1/labels/<name>`.

use std::{collections::HashMap, sync::Arc};

use dbus_mirror::{BusObject, ChildCache, ObjectManagerCache, PropertyCache};
use zbus::zvariant::{ObjectPath, OwnedValue};

use crate::{names, Result};

/// One color label, mirrored from the label service.
///
/// Labels carry presentation properties (the icon name the widgets load)
/// and never change after construction, so this is a plain property
/// cache plus the name baked into the object path.
#[derive(Debug)]
pub struct Label {
    properties: PropertyCache,
}

impl Label {
    pub fn properties(&self) -> &PropertyCache {
        &self.properties
    }

    pub fn path(&self) -> &ObjectPath<'static> {
        self.properties.model().object().path()
    }

    /// The label name, which is the trailing segment of the object path.
    pub fn name(&self) -> &str {
        path_tail(self.path().as_str())
    }

    pub fn get(&self, key: &str) -> Result<OwnedValue> {
        Ok(self.properties.get(key)?)
    }
}

impl ChildCache for Label {
    async fn attach(object: BusObject, seed: HashMap<String, OwnedValue>) -> dbus_mirror::Result<Self> {
        Ok(Label { properties: PropertyCache::connect_seeded(object, seed).await? })
    }

    fn object_path(&self) -> &ObjectPath<'static> {
        self.path()
    }
}

/// All labels published by the label service, keyed by object path.
#[derive(Debug)]
pub struct LabelsDirectory {
    children: ObjectManagerCache<Label>,
}

impl LabelsDirectory {
    /// Connect to the label service at its well-known address.
    pub async fn connect(conn: &zbus::Connection) -> Result<Self> {
        Self::connect_to(BusObject::new(conn, names::LABELS_BUS, names::LABELS_PATH)?).await
    }

    /// Connect to a label service at an explicit address.
    pub async fn connect_to(object: BusObject) -> Result<Self> {
        let children = ObjectManagerCache::connect(object, names::LABEL_INTERFACE).await?;
        Ok(LabelsDirectory { children })
    }

    pub fn get(&self, path: &str) -> Option<Arc<Label>> {
        self.children.get(path)
    }

    /// Look a label up by name, matching the trailing path segment case
    /// insensitively.
    pub fn by_name(&self, name: &str) -> Option<Arc<Label>> {
        self.children
            .snapshot()
            .into_iter()
            .find(|(path, _)| path_tail(path).eq_ignore_ascii_case(name))
            .map(|(_, label)| label)
    }

    pub fn paths(&self) -> Vec<String> {
        self.children.paths()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn children(&self) -> &ObjectManagerCache<Label> {
        &self.children
    }
}

pub(crate) fn path_tail(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn path_tail_takes_the_last_segment() {
        assert_eq!(path_tail("/org/qubes/Labels1/labels/red"), "red");
        assert_eq!(path_tail("red"), "red");
        assert_eq!(path_tail("/"), "");
    }
}
