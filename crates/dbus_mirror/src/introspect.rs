//! Parsing of `org.freedesktop.DBus.Introspectable` XML into interface
//! descriptions.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::Result;

/// A method declared by a remote interface.
///
/// Only the "in" direction argument types are recorded, in document order.
/// Return types are not modelled; calls through [`Model`][crate::Model]
/// treat every reply as an opaque body for the caller to deserialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    /// Type signatures of the input arguments, in declaration order.
    pub inputs: Vec<String>,
}

/// A signal declared by a remote interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub name: String,
    /// `(argument name, type signature)` pairs in declaration order. An
    /// argument without a name attribute is recorded with an empty name.
    pub args: Vec<(String, String)>,
}

impl Signal {
    /// Look up the type signature of a named argument.
    pub fn arg_type(&self, name: &str) -> Option<&str> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, t)| t.as_str())
    }
}

/// One interface of a remote object, as declared in its introspection
/// document. An interface with no methods or no signals has empty (not
/// absent) tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub methods: HashMap<String, Method>,
    pub signals: HashMap<String, Signal>,
}

#[derive(Deserialize)]
struct XmlNode {
    #[serde(default)]
    interface: Vec<XmlInterface>,

    #[serde(default)]
    node: Vec<XmlNode>,
}

#[derive(Deserialize)]
struct XmlInterface {
    #[serde(rename = "@name")]
    name: String,

    #[serde(default)]
    method: Vec<XmlMember>,

    #[serde(default)]
    signal: Vec<XmlMember>,
}

#[derive(Deserialize)]
struct XmlMember {
    #[serde(rename = "@name")]
    name: String,

    #[serde(default)]
    arg: Vec<XmlArg>,
}

#[derive(Deserialize)]
struct XmlArg {
    #[serde(rename = "@name")]
    name: Option<String>,

    #[serde(rename = "@type")]
    ty: String,

    #[serde(rename = "@direction")]
    direction: Option<String>,
}

/// Parse an introspection document into its interfaces, in document order
/// (interfaces nested under child nodes included, after the parent's own).
///
/// Fails on malformed XML; no partial interface list is returned.
pub fn parse_introspection(xml: &str) -> Result<Vec<Interface>> {
    let root = quick_xml::de::from_str::<XmlNode>(xml)?;
    let mut interfaces = Vec::new();
    collect_interfaces(&root, &mut interfaces);
    Ok(interfaces)
}

fn collect_interfaces(node: &XmlNode, out: &mut Vec<Interface>) {
    for iface in &node.interface {
        out.push(convert_interface(iface));
    }
    for child in &node.node {
        collect_interfaces(child, out);
    }
}

fn convert_interface(iface: &XmlInterface) -> Interface {
    let methods = iface
        .method
        .iter()
        .map(|m| {
            let inputs = m
                .arg
                .iter()
                .filter(|arg| arg.direction.as_deref() == Some("in"))
                .map(|arg| arg.ty.clone())
                .collect();
            (m.name.clone(), Method { name: m.name.clone(), inputs })
        })
        .collect();

    let signals = iface
        .signal
        .iter()
        .map(|s| {
            let args = s.arg.iter().map(|arg| (arg.name.clone().unwrap_or_default(), arg.ty.clone())).collect();
            (s.name.clone(), Signal { name: s.name.clone(), args })
        })
        .collect();

    Interface { name: iface.name.clone(), methods, signals }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    static VM_XML: &str = r#"
        <!DOCTYPE node PUBLIC "-//freedesktop//DTD D-BUS Object Introspection 1.0//EN"
         "http://www.freedesktop.org/standards/dbus/1.0/introspect.dtd">
        <node>
          <interface name="org.qubes.DomainManager1.domains.Domain">
            <method name="Shutdown">
              <arg name="timeout" type="u" direction="in"/>
              <arg name="reason" type="s"/>
              <arg name="success" type="b" direction="out"/>
            </method>
            <method name="Kill"/>
            <signal name="Halted">
              <arg name="name" type="s"/>
              <arg name="path" type="o"/>
            </signal>
          </interface>
          <interface name="org.freedesktop.DBus.Properties">
            <method name="Get">
              <arg name="interface_name" type="s" direction="in"/>
              <arg name="property_name" type="s" direction="in"/>
              <arg name="value" type="v" direction="out"/>
            </method>
            <method name="GetAll">
              <arg name="interface_name" type="s" direction="in"/>
              <arg name="properties" type="a{sv}" direction="out"/>
            </method>
            <signal name="PropertiesChanged">
              <arg name="interface_name" type="s"/>
              <arg name="changed_properties" type="a{sv}"/>
              <arg name="invalidated_properties" type="as"/>
            </signal>
          </interface>
        </node>
    "#;

    #[test]
    fn one_entry_per_declared_interface() {
        let interfaces = parse_introspection(VM_XML).unwrap();
        let names: Vec<_> = interfaces.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["org.qubes.DomainManager1.domains.Domain", "org.freedesktop.DBus.Properties"]);

        // each interface holds only its own members
        assert!(interfaces[0].methods.contains_key("Shutdown"));
        assert!(!interfaces[0].methods.contains_key("GetAll"));
        assert!(interfaces[1].signals.contains_key("PropertiesChanged"));
        assert!(!interfaces[1].signals.contains_key("Halted"));
    }

    #[test]
    fn methods_keep_only_in_arguments_in_order() {
        let interfaces = parse_introspection(VM_XML).unwrap();
        let props = &interfaces[1];
        assert_eq!(props.methods["Get"].inputs, vec!["s".to_string(), "s".to_string()]);
        assert_eq!(props.methods["GetAll"].inputs, vec!["s".to_string()]);

        let domain = &interfaces[0];
        // the direction-less arg is dropped along with the "out" one
        assert_eq!(domain.methods["Shutdown"].inputs, vec!["u".to_string()]);
    }

    #[test]
    fn memberless_method_and_signal_tables_are_empty_not_absent() {
        let interfaces = parse_introspection(r#"<node><interface name="org.test.Empty"/></node>"#).unwrap();
        assert_eq!(interfaces.len(), 1);
        assert!(interfaces[0].methods.is_empty());
        assert!(interfaces[0].signals.is_empty());

        // a parameterless method still gets an (empty) input list
        let interfaces = parse_introspection(VM_XML).unwrap();
        assert_eq!(interfaces[0].methods["Kill"].inputs, Vec::<String>::new());
    }

    #[test]
    fn signal_arguments_keep_declaration_order() {
        let interfaces = parse_introspection(VM_XML).unwrap();
        let halted = &interfaces[0].signals["Halted"];
        assert_eq!(halted.args, vec![("name".to_string(), "s".to_string()), ("path".to_string(), "o".to_string())]);
        assert_eq!(halted.arg_type("path"), Some("o"));
        assert_eq!(halted.arg_type("missing"), None);
    }

    #[test]
    fn interfaces_nested_under_child_nodes_are_found() {
        let xml = r#"
            <node>
              <interface name="org.test.Top"/>
              <node name="child">
                <interface name="org.test.Nested"/>
                <node name="grandchild">
                  <interface name="org.test.Deep"/>
                </node>
              </node>
            </node>
        "#;
        let names: Vec<_> = parse_introspection(xml).unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["org.test.Top", "org.test.Nested", "org.test.Deep"]);
    }

    #[test]
    fn malformed_document_fails_without_partial_result() {
        assert!(parse_introspection("<node><interface></node>").is_err());
        assert!(parse_introspection("definitely not xml").is_err());
    }
}
