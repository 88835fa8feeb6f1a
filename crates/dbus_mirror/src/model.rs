//! The reflected object model: one remote object, introspected once, with
//! every discovered method invocable through a dispatch table.

use std::collections::HashMap;

use zbus::{fdo::IntrospectableProxy, names::BusName, zvariant::ObjectPath, SignalStream};

use crate::{parse_introspection, Error, Interface, Result};

/// A remote object's address: connection, destination and object path.
///
/// This is the only handle the mirror layer needs; it never owns a
/// well-known name or serves anything itself.
#[derive(Debug, Clone)]
pub struct BusObject {
    conn: zbus::Connection,
    destination: BusName<'static>,
    path: ObjectPath<'static>,
}

impl BusObject {
    pub fn new<'d, 'p, D, P>(conn: &zbus::Connection, destination: D, path: P) -> Result<Self>
    where
        D: TryInto<BusName<'d>>,
        D::Error: Into<zbus::Error>,
        P: TryInto<ObjectPath<'p>>,
        P::Error: Into<zbus::Error>,
    {
        let destination = destination.try_into().map_err(Into::into)?.into_owned();
        let path = path.try_into().map_err(Into::into)?.into_owned();
        Ok(Self { conn: conn.clone(), destination, path })
    }

    pub fn connection(&self) -> &zbus::Connection {
        &self.conn
    }

    pub fn destination(&self) -> &BusName<'static> {
        &self.destination
    }

    pub fn path(&self) -> &ObjectPath<'static> {
        &self.path
    }

    /// Address of another object on the same connection and destination.
    pub fn peer(&self, path: &str) -> Result<Self> {
        BusObject::new(&self.conn, self.destination.as_str(), path)
    }

    /// Fetch the object's introspection document.
    pub async fn introspect(&self) -> Result<String> {
        let xml = IntrospectableProxy::builder(&self.conn)
            .destination(self.destination.as_str())?
            .path(self.path.as_str())?
            .build()
            .await?
            .introspect()
            .await?;
        Ok(xml)
    }

    /// Build a dynamic proxy scoped to one interface of this object.
    pub async fn interface_proxy(&self, interface: &str) -> Result<zbus::Proxy<'static>> {
        let proxy = zbus::Proxy::new(
            &self.conn,
            self.destination.to_string(),
            self.path.to_string(),
            interface.to_string(),
        )
        .await?;
        Ok(proxy)
    }

    /// Issue one method call on the given interface and deserialize the
    /// reply body. Remote-side failures come back verbatim as the
    /// transport error.
    pub async fn call<B, R>(&self, interface: &str, method: &str, body: &B) -> Result<R>
    where
        B: serde::ser::Serialize + zbus::zvariant::DynamicType,
        R: serde::de::DeserializeOwned + zbus::zvariant::Type,
    {
        let reply = self
            .conn
            .call_method(Some(self.destination.as_str()), self.path.as_str(), Some(interface), method, body)
            .await?;
        Ok(reply.body()?)
    }
}

/// A live reflection of one remote object.
///
/// Construction fetches and parses the object's introspection document;
/// afterwards every method declared by any of its interfaces can be called
/// through [`call`][Model::call] without further lookups. The interface
/// table itself is immutable for the life of the model.
#[derive(Debug)]
pub struct Model {
    object: BusObject,
    interfaces: HashMap<String, Interface>,
    // method name -> owning interface; when several interfaces declare the
    // same method name, the one declared later in the document wins.
    dispatch: HashMap<String, String>,
}

impl Model {
    /// Introspect the object and index everything it declares.
    pub async fn connect(object: BusObject) -> Result<Self> {
        let xml = object.introspect().await?;
        let parsed = parse_introspection(&xml)?;
        log::debug!("{} declares {} interfaces", object.path(), parsed.len());
        let (interfaces, dispatch) = index_interfaces(parsed);
        Ok(Self { object, interfaces, dispatch })
    }

    pub fn object(&self) -> &BusObject {
        &self.object
    }

    pub fn interfaces(&self) -> &HashMap<String, Interface> {
        &self.interfaces
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    /// The interface a method name currently dispatches to.
    pub fn owning_interface(&self, method: &str) -> Option<&str> {
        self.dispatch.get(method).map(String::as_str)
    }

    /// Require an interface to be present, as capability caches do at
    /// construction.
    pub fn require_interface(&self, name: &str) -> Result<&Interface> {
        self.interfaces.get(name).ok_or_else(|| Error::UnknownInterface(name.to_owned()))
    }

    /// Call a discovered method by bare name, routed to its owning
    /// interface. Use [`call_on`][Model::call_on] when a name is declared
    /// by more than one interface and the default precedence is not the
    /// one you want.
    pub async fn call<B, R>(&self, method: &str, body: &B) -> Result<R>
    where
        B: serde::ser::Serialize + zbus::zvariant::DynamicType,
        R: serde::de::DeserializeOwned + zbus::zvariant::Type,
    {
        let interface = self.dispatch.get(method).ok_or_else(|| Error::UnknownMethod(method.to_owned()))?;
        self.object.call(interface, method, body).await
    }

    /// Call a method on an explicitly chosen interface, skipping the
    /// dispatch table. The interface must be one the object declared.
    pub async fn call_on<B, R>(&self, interface: &str, method: &str, body: &B) -> Result<R>
    where
        B: serde::ser::Serialize + zbus::zvariant::DynamicType,
        R: serde::de::DeserializeOwned + zbus::zvariant::Type,
    {
        if !self.interfaces.contains_key(interface) {
            return Err(Error::UnknownInterface(interface.to_owned()));
        }
        self.object.call(interface, method, body).await
    }

    /// Subscribe to a signal on one of the object's interfaces. The
    /// returned stream is standalone and keeps delivering after the model
    /// is dropped; drop the stream to unsubscribe.
    pub async fn receive_signal(&self, interface: &str, member: &'static str) -> Result<SignalStream<'static>> {
        let proxy = self.object.interface_proxy(interface).await?;
        Ok(proxy.receive_signal(member).await?)
    }
}

fn index_interfaces(parsed: Vec<Interface>) -> (HashMap<String, Interface>, HashMap<String, String>) {
    let mut interfaces = HashMap::new();
    let mut dispatch = HashMap::new();
    for iface in parsed {
        for method in iface.methods.keys() {
            dispatch.insert(method.clone(), iface.name.clone());
        }
        interfaces.insert(iface.name.clone(), iface);
    }
    (interfaces, dispatch)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::introspect::Method;
    use maplit::hashmap;
    use pretty_assertions::assert_eq;

    fn iface(name: &str, methods: &[&str]) -> Interface {
        Interface {
            name: name.to_owned(),
            methods: methods
                .iter()
                .map(|m| ((*m).to_owned(), Method { name: (*m).to_owned(), inputs: vec![] }))
                .collect(),
            signals: hashmap! {},
        }
    }

    #[test]
    fn every_method_name_is_dispatchable() {
        let (interfaces, dispatch) =
            index_interfaces(vec![iface("org.test.A", &["Foo", "Bar"]), iface("org.test.B", &["Baz"])]);
        assert_eq!(interfaces.len(), 2);
        assert_eq!(dispatch["Foo"], "org.test.A");
        assert_eq!(dispatch["Bar"], "org.test.A");
        assert_eq!(dispatch["Baz"], "org.test.B");
    }

    #[test]
    fn later_interface_owns_a_colliding_method_name() {
        let (_, dispatch) = index_interfaces(vec![
            iface("org.test.First", &["Ping"]),
            iface("org.test.Second", &["Ping", "Other"]),
        ]);
        assert_eq!(dispatch["Ping"], "org.test.Second");
        assert_eq!(dispatch["Other"], "org.test.Second");
    }
}
