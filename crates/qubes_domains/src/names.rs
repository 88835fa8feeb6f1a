//! Well-known bus names, object paths and signal members of the Qubes
//! management surface.

pub const DOMAIN_MANAGER_BUS: &str = "org.qubes.DomainManager1";
pub const DOMAIN_MANAGER_PATH: &str = "/org/qubes/DomainManager1";
/// Interface the manager's own signals are declared on.
pub const DOMAIN_MANAGER_INTERFACE: &str = "org.qubes.DomainManager1";
/// Interface whose property table seeds each domain child cache.
pub const DOMAIN_INTERFACE: &str = "org.qubes.DomainManager1.domains.Domain";
pub const DOMAIN_PATH_PREFIX: &str = "/org/qubes/DomainManager1/domains/";

pub const LABELS_BUS: &str = "org.qubes.Labels1";
pub const LABELS_PATH: &str = "/org/qubes/Labels1";
/// Interface whose property table seeds each label child cache.
pub const LABEL_INTERFACE: &str = "org.qubes.Label";
pub const LABEL_PATH_PREFIX: &str = "/org/qubes/Labels1/labels/";

// Domain lifecycle signals, each carrying `(name: s, path: o)`.
pub const STARTING: &str = "Starting";
pub const STARTED: &str = "Started";
pub const FAILED: &str = "Failed";
pub const HALTING: &str = "Halting";
pub const HALTED: &str = "Halted";
pub const UNKNOWN: &str = "Unknown";

// Membership signals, same argument pair.
pub const DOMAIN_ADDED: &str = "DomainAdded";
pub const DOMAIN_REMOVED: &str = "DomainRemoved";
