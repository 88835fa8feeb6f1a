//! The domain manager: its own property bag plus the managed set of
//! domains, tracked live through the manager's membership signals.

use std::sync::Arc;

use dbus_mirror::{BusObject, Model, ObjectManagerCache, PropertyCache};
use futures::StreamExt;
use tokio::sync::broadcast;
use zbus::{zvariant::OwnedObjectPath, SignalStream};

use crate::{names, Domain, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEventKind {
    Starting,
    Started,
    Failed,
    Halting,
    Halted,
    Unknown,
    Added,
    Removed,
}

impl DomainEventKind {
    /// The lifecycle kinds, excluding membership changes.
    pub const STATES: [DomainEventKind; 6] = [
        DomainEventKind::Starting,
        DomainEventKind::Started,
        DomainEventKind::Failed,
        DomainEventKind::Halting,
        DomainEventKind::Halted,
        DomainEventKind::Unknown,
    ];

    /// The signal member that carries this kind.
    pub fn member(self) -> &'static str {
        match self {
            DomainEventKind::Starting => names::STARTING,
            DomainEventKind::Started => names::STARTED,
            DomainEventKind::Failed => names::FAILED,
            DomainEventKind::Halting => names::HALTING,
            DomainEventKind::Halted => names::HALTED,
            DomainEventKind::Unknown => names::UNKNOWN,
            DomainEventKind::Added => names::DOMAIN_ADDED,
            DomainEventKind::Removed => names::DOMAIN_REMOVED,
        }
    }
}

/// A state transition or membership change reported by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEvent {
    pub kind: DomainEventKind,
    pub name: String,
    pub path: OwnedObjectPath,
}

/// The domain manager object, mirrored.
///
/// One introspection round-trip backs both caches: the manager's own
/// property bag and the object-manager enumeration of its domains. The
/// manager subscribes to all eight of its signals; lifecycle signals fan
/// out to subscribers as [`DomainEvent`]s, membership signals
/// additionally keep the child table current.
#[derive(Debug)]
pub struct DomainManager {
    properties: PropertyCache,
    domains: Arc<ObjectManagerCache<Domain>>,
    events: broadcast::Sender<DomainEvent>,
    // Aborts the signal forwarders when the manager is dropped.
    tasks: tokio::task::JoinSet<()>,
}

impl DomainManager {
    /// Connect to the domain manager at its well-known address.
    pub async fn connect(conn: &zbus::Connection) -> Result<Self> {
        Self::connect_to(BusObject::new(conn, names::DOMAIN_MANAGER_BUS, names::DOMAIN_MANAGER_PATH)?).await
    }

    /// Connect to a domain manager at an explicit address.
    pub async fn connect_to(object: BusObject) -> Result<Self> {
        let model = Arc::new(Model::connect(object).await?);
        let properties = PropertyCache::attach(model.clone(), None).await?;
        let domains = Arc::new(ObjectManagerCache::attach(model.clone(), names::DOMAIN_INTERFACE).await?);

        let (events, _) = broadcast::channel(64);
        let mut manager = DomainManager { properties, domains, events, tasks: tokio::task::JoinSet::new() };

        for kind in DomainEventKind::STATES {
            let stream = model.receive_signal(names::DOMAIN_MANAGER_INTERFACE, kind.member()).await?;
            manager.tasks.spawn(forward_state(stream, kind, manager.events.clone()));
        }
        let added = model.receive_signal(names::DOMAIN_MANAGER_INTERFACE, names::DOMAIN_ADDED).await?;
        manager.tasks.spawn(track_added(added, manager.domains.clone(), manager.events.clone()));
        let removed = model.receive_signal(names::DOMAIN_MANAGER_INTERFACE, names::DOMAIN_REMOVED).await?;
        manager.tasks.spawn(track_removed(removed, manager.domains.clone(), manager.events.clone()));

        Ok(manager)
    }

    pub fn properties(&self) -> &PropertyCache {
        &self.properties
    }

    pub fn domains(&self) -> &ObjectManagerCache<Domain> {
        &self.domains
    }

    pub fn get(&self, path: &str) -> Option<Arc<Domain>> {
        self.domains.get(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.domains.paths()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Events from all eight manager signals. Forwarding starts at
    /// construction; a receiver only sees events sent after it
    /// subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }
}

async fn forward_state(mut stream: SignalStream<'static>, kind: DomainEventKind, events: broadcast::Sender<DomainEvent>) {
    while let Some(msg) = stream.next().await {
        match msg.body::<(String, OwnedObjectPath)>() {
            Ok((name, path)) => {
                log::debug!("domain {} reported {}", name, kind.member());
                let _ = events.send(DomainEvent { kind, name, path });
            }
            Err(e) => log::warn!("undecodable {} signal: {}", kind.member(), e),
        }
    }
    log::debug!("{} signal stream ended", kind.member());
}

async fn track_added(
    mut stream: SignalStream<'static>,
    domains: Arc<ObjectManagerCache<Domain>>,
    events: broadcast::Sender<DomainEvent>,
) {
    while let Some(msg) = stream.next().await {
        let (name, path) = match msg.body::<(String, OwnedObjectPath)>() {
            Ok(body) => body,
            Err(e) => {
                log::warn!("undecodable {} signal: {}", names::DOMAIN_ADDED, e);
                continue;
            }
        };
        // the signal carries no property table, so the new mirror fetches
        // its own
        let added = match domains.model().object().peer(path.as_str()) {
            Ok(object) => Domain::connect(object).await,
            Err(e) => Err(e.into()),
        };
        match added {
            Ok(domain) => {
                log::info!("domain {} added at {}", name, path.as_str());
                domains.insert(Arc::new(domain));
                let _ = events.send(DomainEvent { kind: DomainEventKind::Added, name, path });
            }
            Err(e) => log::warn!("could not mirror added domain {}: {}", name, e),
        }
    }
    log::debug!("{} signal stream ended", names::DOMAIN_ADDED);
}

async fn track_removed(
    mut stream: SignalStream<'static>,
    domains: Arc<ObjectManagerCache<Domain>>,
    events: broadcast::Sender<DomainEvent>,
) {
    while let Some(msg) = stream.next().await {
        let (name, path) = match msg.body::<(String, OwnedObjectPath)>() {
            Ok(body) => body,
            Err(e) => {
                log::warn!("undecodable {} signal: {}", names::DOMAIN_REMOVED, e);
                continue;
            }
        };
        if domains.remove(path.as_str()).is_some() {
            log::info!("domain {} removed from {}", name, path.as_str());
        } else {
            log::debug!("removal of unmirrored domain {}", path.as_str());
        }
        let _ = events.send(DomainEvent { kind: DomainEventKind::Removed, name, path });
    }
    log::debug!("{} signal stream ended", names::DOMAIN_REMOVED);
}
