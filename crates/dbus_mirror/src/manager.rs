//! A local mirror of an object's managed children, via
//! `org.freedesktop.DBus.ObjectManager`.

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
};

use zbus::{names::OwnedInterfaceName, zvariant::OwnedValue};

use crate::{BusObject, Model, PropertyCache, Result};

pub const OBJECT_MANAGER_INTERFACE: &str = "org.freedesktop.DBus.ObjectManager";

/// A cache wrapped around each child of an object manager.
///
/// `GetManagedObjects` delivers every child's initial property table
/// inline, so a child cache is constructed from its address plus that
/// seed and never fetches the table itself.
pub trait ChildCache: Sized + Send + Sync + 'static {
    fn attach(object: BusObject, seed: HashMap<String, OwnedValue>) -> impl Future<Output = Result<Self>> + Send;

    /// The object path the child reports for itself.
    fn object_path(&self) -> &zbus::zvariant::ObjectPath<'static>;
}

impl ChildCache for PropertyCache {
    async fn attach(object: BusObject, seed: HashMap<String, OwnedValue>) -> Result<Self> {
        PropertyCache::connect_seeded(object, seed).await
    }

    fn object_path(&self) -> &zbus::zvariant::ObjectPath<'static> {
        self.model().object().path()
    }
}

/// A mirror of the children of an object manager.
///
/// Built from a single `GetManagedObjects` round-trip: one child cache per
/// managed path, seeded with the table of the interface named at
/// construction. The base cache never subscribes to membership signals;
/// specializations that track them mutate the mapping through
/// [`insert`][ObjectManagerCache::insert] and
/// [`remove`][ObjectManagerCache::remove].
#[derive(Debug)]
pub struct ObjectManagerCache<C = PropertyCache> {
    model: Arc<Model>,
    seed_interface: String,
    // Keyed by the path each child reports for itself, not the
    // enumeration key (they are expected to agree).
    children: Mutex<HashMap<String, Arc<C>>>,
}

impl<C: ChildCache> ObjectManagerCache<C> {
    /// Enumerate and wrap the children of an already-reflected object.
    ///
    /// `seed_interface` names the interface whose property table seeds
    /// each child. A child that does not list it falls back to whichever
    /// table its enumeration entry carries, and to an empty seed if it
    /// carries none at all.
    pub async fn attach(model: Arc<Model>, seed_interface: &str) -> Result<Self> {
        model.require_interface(OBJECT_MANAGER_INTERFACE)?;

        let managed: zbus::fdo::ManagedObjects = model.call("GetManagedObjects", &()).await?;
        log::debug!("{} manages {} objects", model.object().path(), managed.len());

        let cache =
            Self { model, seed_interface: seed_interface.to_owned(), children: Mutex::new(HashMap::new()) };
        for (child_path, interfaces) in managed {
            let child_path = child_path.into_inner();
            let child = cache.build_child(child_path.as_str(), interfaces).await?;
            cache.insert(child);
        }
        Ok(cache)
    }

    /// Reflect an object and enumerate its children in one go.
    pub async fn connect(object: BusObject, seed_interface: &str) -> Result<Self> {
        let model = Model::connect(object).await?;
        Self::attach(Arc::new(model), seed_interface).await
    }

    /// Construct a child cache for a managed path, seeded from its
    /// enumeration entry. Used at construction and by specializations
    /// when a membership signal announces a new child.
    pub async fn build_child(
        &self,
        path: &str,
        interfaces: HashMap<OwnedInterfaceName, HashMap<String, OwnedValue>>,
    ) -> Result<Arc<C>> {
        let seed = select_seed(&self.seed_interface, interfaces);
        let object = self.model.object().peer(path)?;
        Ok(Arc::new(C::attach(object, seed).await?))
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn seed_interface(&self) -> &str {
        &self.seed_interface
    }

    pub fn get(&self, path: &str) -> Option<Arc<C>> {
        self.children.lock().unwrap().get(path).cloned() // unwrap: mutex poisoning is okay
    }

    pub fn contains(&self, path: &str) -> bool {
        self.children.lock().unwrap().contains_key(path)
    }

    /// Child paths at the time of the call.
    pub fn paths(&self) -> Vec<String> {
        self.children.lock().unwrap().keys().cloned().collect()
    }

    /// The child mapping at the time of the call.
    pub fn snapshot(&self) -> HashMap<String, Arc<C>> {
        self.children.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.children.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.lock().unwrap().is_empty()
    }

    /// Insert a child, keyed by the path it reports for itself. Returns
    /// the previous child at that path, if any.
    pub fn insert(&self, child: Arc<C>) -> Option<Arc<C>> {
        let path = child.object_path().as_str().to_owned();
        self.children.lock().unwrap().insert(path, child) // unwrap: mutex poisoning is okay
    }

    /// Drop a child from the mapping. Its cache (and subscriptions) end
    /// when the last caller-held reference goes away.
    pub fn remove(&self, path: &str) -> Option<Arc<C>> {
        self.children.lock().unwrap().remove(path) // unwrap: mutex poisoning is okay
    }
}

fn select_seed(
    seed_interface: &str,
    mut interfaces: HashMap<OwnedInterfaceName, HashMap<String, OwnedValue>>,
) -> HashMap<String, OwnedValue> {
    let named = interfaces.keys().find(|name| name.as_str() == seed_interface).cloned();
    match named {
        Some(key) => interfaces.remove(&key).unwrap_or_default(),
        None => interfaces.into_values().next().unwrap_or_default(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use maplit::hashmap;
    use pretty_assertions::assert_eq;
    use zbus::zvariant::Value;

    fn iface_name(name: &str) -> OwnedInterfaceName {
        OwnedInterfaceName::try_from(name).unwrap()
    }

    fn ov<'a>(v: impl Into<Value<'a>>) -> OwnedValue {
        v.into().to_owned()
    }

    #[test]
    fn seed_prefers_the_named_interface() {
        let table = select_seed(
            "org.test.Wanted",
            hashmap! {
                iface_name("org.test.Other") => hashmap! { "n".to_owned() => ov(1u32) },
                iface_name("org.test.Wanted") => hashmap! { "n".to_owned() => ov(2u32) },
            },
        );
        assert_eq!(table["n"], ov(2u32));
    }

    #[test]
    fn seed_falls_back_to_some_table_then_to_empty() {
        let table = select_seed(
            "org.test.Missing",
            hashmap! { iface_name("org.test.Only") => hashmap! { "n".to_owned() => ov(7u32) } },
        );
        assert_eq!(table["n"], ov(7u32));

        let table = select_seed("org.test.Missing", hashmap! {});
        assert!(table.is_empty());
    }
}
