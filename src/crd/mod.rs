//! # Custom Resource Definitions
//!
//! CRD types for the Swxfll operator.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: cache.swxfll.com/v1alpha1
//! kind: Swxfll
//! metadata:
//!   name: swxfll-sample
//!   namespace: default
//! spec:
//!   size: 3
//!   containerPort: 11211
//! ```

mod status;

pub use status::*;

use serde::{Deserialize, Serialize};

/// Swxfll Custom Resource Definition
///
/// Declares a replicated workload; the operator keeps a Deployment of the
/// same name in sync with it.
#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Swxfll",
    group = "cache.swxfll.com",
    version = "v1alpha1",
    namespaced,
    status = "SwxfllStatus",
    printcolumn = r#"{"name":"Size", "type":"integer", "jsonPath":".spec.size"}, {"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SwxfllSpec {
    /// Number of operand instances
    #[schemars(range(min = 1, max = 5))]
    pub size: i32,
    /// Port the operand container listens on
    #[serde(default)]
    pub container_port: i32,
}

impl Swxfll {
    /// Whether the operator's finalizer is present
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|x| x == crate::constants::FINALIZER))
    }

    /// Whether deletion has been requested
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Current conditions, empty when status is absent
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_crd_names_and_subresource() {
        let crd = Swxfll::crd();
        assert_eq!(crd.spec.group, "cache.swxfll.com");
        assert_eq!(crd.spec.names.plural, "swxflls");
        let version = &crd.spec.versions[0];
        assert_eq!(version.name, "v1alpha1");
        assert!(version
            .subresources
            .as_ref()
            .and_then(|s| s.status.as_ref())
            .is_some());
    }

    #[test]
    fn test_size_schema_bounds() {
        let crd = Swxfll::crd();
        let schema = serde_json::to_value(&crd.spec.versions[0].schema).unwrap();
        let size = &schema["openAPIV3Schema"]["properties"]["spec"]["properties"]["size"];
        assert_eq!(size["minimum"].as_f64(), Some(1.0));
        assert_eq!(size["maximum"].as_f64(), Some(5.0));
    }

    #[test]
    fn test_spec_uses_camel_case() {
        let spec: SwxfllSpec =
            serde_json::from_value(serde_json::json!({"size": 2, "containerPort": 8080})).unwrap();
        assert_eq!(spec.size, 2);
        assert_eq!(spec.container_port, 8080);
    }

    #[test]
    fn test_finalizer_and_deletion_helpers() {
        let mut obj = Swxfll::new("a", SwxfllSpec::default());
        assert!(!obj.has_finalizer());
        assert!(!obj.is_deleting());
        assert!(obj.conditions().is_empty());
        obj.metadata.finalizers = Some(vec![crate::constants::FINALIZER.to_string()]);
        assert!(obj.has_finalizer());
    }
}
