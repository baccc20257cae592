//! # Desired State
//!
//! Derives the Deployment a Swxfll resource should own. Everything here is
//! pure except [`resolve_image`], which reads the configuration source.

use crate::config::ConfigSource;
use crate::constants::*;
use crate::crd::Swxfll;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Capabilities, Container, ContainerPort, PodSecurityContext, PodSpec, PodTemplateSpec,
    SeccompProfile, SecurityContext,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::Resource;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unable to find {key} in the controller configuration; the operand image is not set")]
    MissingImage { key: String },
    #[error("{name} has no uid; cannot set an owner reference")]
    MissingOwnerUid { name: String },
}

/// Resolve the operand image from the configuration source
pub fn resolve_image(source: &dyn ConfigSource, key: &str) -> Result<String, ConfigurationError> {
    source
        .lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigurationError::MissingImage {
            key: key.to_string(),
        })
}

/// Tag part of an image reference, `None` when it has none
///
/// `registry:5000/swxfll` has no tag; a digest suffix is ignored.
pub fn image_tag(image: &str) -> Option<&str> {
    let without_digest = image.split('@').next().unwrap_or(image);
    let last_segment_start = without_digest.rfind('/').map_or(0, |i| i + 1);
    let last_segment = &without_digest[last_segment_start..];
    let (_, tag) = last_segment.rsplit_once(':')?;
    (!tag.is_empty()).then_some(tag)
}

/// Labels for the operand, derived from the resource name and image
pub fn labels_for(name: &str, image: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_NAME.to_string(), "Swxfll".to_string());
    labels.insert(LABEL_INSTANCE.to_string(), name.to_string());
    if let Some(tag) = image_tag(image) {
        labels.insert(LABEL_VERSION.to_string(), tag.to_string());
    }
    labels.insert(LABEL_PART_OF.to_string(), "swxfll-operator".to_string());
    labels.insert(LABEL_CREATED_BY.to_string(), "controller-manager".to_string());
    labels
}

/// Selector labels: the label set without the version, which changes with the image
pub fn selector_labels(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    labels
        .iter()
        .filter(|(k, _)| k.as_str() != LABEL_VERSION)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Build the Deployment owned by `parent`
pub fn synthesize(parent: &Swxfll, image: &str) -> Result<Deployment, ConfigurationError> {
    let name = parent.metadata.name.clone().unwrap_or_default();
    let owner = parent
        .controller_owner_ref(&())
        .ok_or_else(|| ConfigurationError::MissingOwnerUid { name: name.clone() })?;
    let labels = labels_for(&name, image);

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: parent.metadata.namespace.clone(),
            labels: Some(labels.clone()),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(parent.spec.size),
            selector: LabelSelector {
                match_labels: Some(selector_labels(&labels)),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(pod_spec(image, parent.spec.container_port)),
            },
            ..Default::default()
        }),
        status: None,
    })
}

fn pod_spec(image: &str, container_port: i32) -> PodSpec {
    PodSpec {
        security_context: Some(PodSecurityContext {
            run_as_non_root: Some(true),
            seccomp_profile: Some(SeccompProfile {
                type_: "RuntimeDefault".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        containers: vec![Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(image.to_string()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            // The image must define a numeric user for runAsNonRoot
            security_context: Some(SecurityContext {
                run_as_user: Some(1001),
                allow_privilege_escalation: Some(false),
                capabilities: Some(Capabilities {
                    drop: Some(vec!["ALL".to_string()]),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ports: Some(vec![ContainerPort {
                container_port,
                name: Some(CONTAINER_NAME.to_string()),
                ..Default::default()
            }]),
            command: Some(
                ["swxfll", "-m=64", "-o", "modern", "-v"]
                    .iter()
                    .map(|s| (*s).to_string())
                    .collect(),
            ),
            ..Default::default()
        }],
        ..Default::default()
    }
}
