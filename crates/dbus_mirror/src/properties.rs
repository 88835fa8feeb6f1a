//! A local mirror of an object's `org.freedesktop.DBus.Properties` table.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures::StreamExt;
use tokio::sync::broadcast;
use zbus::zvariant::{OwnedValue, Value};

use crate::{BusObject, Error, Model, Result};

pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// One applied change notification: the keys whose values were replaced or
/// added by the merge.
#[derive(Debug, Clone)]
pub struct PropertiesUpdate {
    pub keys: Vec<String>,
}

/// A property table mirrored into memory.
///
/// The table is populated exactly once, either from a caller-supplied seed
/// or from a single `GetAll` scoped to all interfaces, and is never
/// re-fetched. A background task merges every `PropertiesChanged`
/// notification into it; keys named only in the invalidated list keep
/// their last value until a replacement arrives. Dropping the cache aborts
/// the background task, which ends the subscription.
///
/// Reads are served from memory. [`set`][PropertyCache::set] goes to the
/// remote object and leaves the local table alone; the new value becomes
/// visible through reads only once the corresponding notification has been
/// merged.
#[derive(Debug)]
pub struct PropertyCache {
    model: Arc<Model>,
    // Plain std mutex: never held across an await.
    //
    // See <https://docs.rs/tokio/latest/tokio/sync/struct.Mutex.html#which-kind-of-mutex-should-you-use>
    data: Arc<Mutex<HashMap<String, OwnedValue>>>,
    updates: broadcast::Sender<PropertiesUpdate>,
    tasks: tokio::task::JoinSet<()>,
}

impl PropertyCache {
    /// Mirror the properties of an already-reflected object.
    ///
    /// With `seed == None` the initial table comes from one `GetAll` call
    /// with an empty interface filter, exactly as the remote object
    /// declared it. A supplied seed skips that round-trip (the
    /// object-manager cache uses this for the tables delivered inline by
    /// `GetManagedObjects`).
    pub async fn attach(model: Arc<Model>, seed: Option<HashMap<String, OwnedValue>>) -> Result<Self> {
        model.require_interface(PROPERTIES_INTERFACE)?;

        let data = match seed {
            Some(table) => table,
            None => model.call("GetAll", &("",)).await?,
        };

        let proxy = zbus::fdo::PropertiesProxy::builder(model.object().connection())
            .destination(model.object().destination().as_str())?
            .path(model.object().path().as_str())?
            .build()
            .await?;
        let mut changes = proxy.receive_properties_changed().await?;

        let (updates, _) = broadcast::channel(64);
        let mut cache = Self {
            model,
            data: Arc::new(Mutex::new(data)),
            updates,
            tasks: tokio::task::JoinSet::new(),
        };

        cache.tasks.spawn({
            let data = cache.data.clone();
            let updates = cache.updates.clone();
            let path = cache.model.object().path().clone();
            async move {
                while let Some(change) = changes.next().await {
                    let args = match change.args() {
                        Ok(args) => args,
                        Err(e) => {
                            log::warn!("undecodable properties notification on {}: {}", path, e);
                            continue;
                        }
                    };

                    let mut keys = Vec::with_capacity(args.changed_properties().len());
                    {
                        let mut data = data.lock().unwrap(); // unwrap: mutex poisoning is okay
                        for (name, value) in args.changed_properties() {
                            data.insert((*name).to_owned(), value.to_owned());
                            keys.push((*name).to_owned());
                        }
                        // invalidated keys are not evicted; the last known
                        // value stays until a replacement value arrives
                    }
                    if !args.invalidated_properties().is_empty() {
                        log::debug!(
                            "{} invalidated {} properties, keeping cached values",
                            path,
                            args.invalidated_properties().len()
                        );
                    }

                    // invalidated-only notifications merge nothing and
                    // publish nothing
                    if !keys.is_empty() {
                        let _ = updates.send(PropertiesUpdate { keys });
                    }
                }
                log::debug!("properties stream for {} ended", path);
            }
        });

        Ok(cache)
    }

    /// Reflect an object and mirror its properties in one go.
    pub async fn connect(object: BusObject) -> Result<Self> {
        let model = Model::connect(object).await?;
        PropertyCache::attach(Arc::new(model), None).await
    }

    /// Like [`connect`][PropertyCache::connect], with the initial table
    /// supplied by the caller instead of fetched.
    pub async fn connect_seeded(object: BusObject, seed: HashMap<String, OwnedValue>) -> Result<Self> {
        let model = Model::connect(object).await?;
        PropertyCache::attach(Arc::new(model), Some(seed)).await
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// Current value of a property. Absent keys are an error, matching
    /// mapping semantics.
    pub fn get(&self, key: &str) -> Result<OwnedValue> {
        let data = self.data.lock().unwrap(); // unwrap: mutex poisoning is okay
        data.get(key).cloned().ok_or_else(|| Error::UnknownProperty(key.to_owned()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().unwrap().contains_key(key)
    }

    /// Key set at the time of the call.
    pub fn keys(&self) -> Vec<String> {
        self.data.lock().unwrap().keys().cloned().collect()
    }

    /// Full copy of the table at the time of the call.
    pub fn snapshot(&self) -> HashMap<String, OwnedValue> {
        self.data.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().unwrap().is_empty()
    }

    /// Ask the remote object to set a property, letting it resolve the
    /// owning interface (empty interface filter). The local table is not
    /// updated here; if the remote side accepts the write, the new value
    /// arrives through the change notification like any other update.
    pub async fn set(&self, key: &str, value: &Value<'_>) -> Result<()> {
        self.model.call("Set", &("", key, value)).await
    }

    /// Always fails: properties are structural and cannot be deleted
    /// while the remote object exists.
    pub fn remove(&self, _key: &str) -> Result<()> {
        Err(Error::PropertyDeletion)
    }

    /// Subscribe to merge events. Each notification that changes at least
    /// one key is published once; a lagging receiver misses oldest events
    /// first.
    pub fn updates(&self) -> broadcast::Receiver<PropertiesUpdate> {
        self.updates.subscribe()
    }
}
