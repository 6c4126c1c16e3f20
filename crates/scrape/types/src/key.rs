//! Resource identity: object keys and watched resource kinds

use crate::error::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `namespace/name` identity of a watched object
///
/// Cluster-scoped objects (empty namespace) render as just `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    namespace: String,
    name: String,
}

impl ObjectKey {
    /// Build a key, rejecting an empty name or a `/` inside either part.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let name = name.into();

        if name.is_empty() || name.contains('/') || namespace.contains('/') {
            return Err(TypesError::InvalidKey(format!("{}/{}", namespace, name)));
        }

        Ok(Self { namespace, name })
    }

    /// Parse a `namespace/name` or `name` key.
    pub fn parse(key: &str) -> Result<Self> {
        let mut parts = key.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => Self::new("", name),
            (Some(namespace), Some(name), None) => Self::new(namespace, name),
            _ => Err(TypesError::InvalidKey(key.to_string())),
        }
        .map_err(|_| TypesError::InvalidKey(key.to_string()))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Kinds of monitoring descriptors the operator understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// `monitoring.coreos.com/v1` ServiceMonitor
    ServiceMonitor,
}

impl ResourceKind {
    /// API group of the custom resource
    pub fn group(&self) -> &'static str {
        match self {
            ResourceKind::ServiceMonitor => "monitoring.coreos.com",
        }
    }

    /// API version of the custom resource
    pub fn version(&self) -> &'static str {
        match self {
            ResourceKind::ServiceMonitor => "v1",
        }
    }

    /// Kind as it appears in `TypeMeta`
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceKind::ServiceMonitor => "ServiceMonitor",
        }
    }

    /// Plural resource name used in API paths
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::ServiceMonitor => "servicemonitors",
        }
    }

    /// Resolve a `TypeMeta` kind; unknown kinds yield `None`.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "ServiceMonitor" => Some(ResourceKind::ServiceMonitor),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display() {
        let key = ObjectKey::new("myapp", "dummy").unwrap();
        assert_eq!(key.to_string(), "myapp/dummy");

        let cluster = ObjectKey::new("", "dummy").unwrap();
        assert_eq!(cluster.to_string(), "dummy");
    }

    #[test]
    fn test_key_parse() {
        let key = ObjectKey::parse("myapp/dummy").unwrap();
        assert_eq!(key.namespace(), "myapp");
        assert_eq!(key.name(), "dummy");

        let cluster = ObjectKey::parse("dummy").unwrap();
        assert_eq!(cluster.namespace(), "");
    }

    #[test]
    fn test_key_parse_rejects_malformed() {
        assert!(ObjectKey::parse("a/b/c").is_err());
        assert!(ObjectKey::parse("myapp/").is_err());
        assert!(ObjectKey::parse("").is_err());
    }

    #[test]
    fn test_resource_kind_round_trip() {
        let kind = ResourceKind::from_kind("ServiceMonitor").unwrap();
        assert_eq!(kind, ResourceKind::ServiceMonitor);
        assert_eq!(kind.group(), "monitoring.coreos.com");
        assert!(ResourceKind::from_kind("PodMonitor").is_none());
    }
}
