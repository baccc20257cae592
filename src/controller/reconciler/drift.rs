//! # Drift Detection
//!
//! Compares the fields of a Deployment this operator owns (replicas, container
//! port, image, labels) against the desired Deployment, and merges desired
//! values over an observed object without touching anything else.

use crate::constants::{CONTAINER_NAME, OWNED_LABEL_KEYS};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, ContainerPort};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftField {
    Replicas,
    ContainerPort,
    Image,
    Labels,
}

impl fmt::Display for DriftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftField::Replicas => "replicas",
            DriftField::ContainerPort => "containerPort",
            DriftField::Image => "image",
            DriftField::Labels => "labels",
        };
        f.write_str(s)
    }
}

// An unset replica count means one replica
const DEFAULT_REPLICAS: i32 = 1;

fn replicas(dep: &Deployment) -> i32 {
    dep.spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(DEFAULT_REPLICAS)
}

fn containers(dep: &Deployment) -> Option<&Vec<Container>> {
    dep.spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .map(|p| &p.containers)
}

/// The operand container, matched by name only
fn operand_container(dep: &Deployment) -> Option<&Container> {
    containers(dep)?.iter().find(|c| c.name == CONTAINER_NAME)
}

fn operand_port_index(ports: &[ContainerPort]) -> Option<usize> {
    ports
        .iter()
        .position(|p| p.name.as_deref() == Some(CONTAINER_NAME))
        .or((!ports.is_empty()).then_some(0))
}

fn operand_port(container: &Container) -> Option<i32> {
    let ports = container.ports.as_deref()?;
    operand_port_index(ports).map(|i| ports[i].container_port)
}

fn template_labels(dep: &Deployment) -> Option<&BTreeMap<String, String>> {
    dep.spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref())
        .and_then(|m| m.labels.as_ref())
}

fn owned_labels_match(
    observed: Option<&BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
) -> bool {
    OWNED_LABEL_KEYS
        .iter()
        .all(|k| observed.and_then(|l| l.get(*k)) == desired.and_then(|l| l.get(*k)))
}

/// Owned fields where `observed` differs from `desired`, in a fixed order
pub fn detect_drift(observed: &Deployment, desired: &Deployment) -> Vec<DriftField> {
    let mut drift = Vec::new();

    if replicas(observed) != replicas(desired) {
        drift.push(DriftField::Replicas);
    }

    let observed_container = operand_container(observed);
    let desired_container = operand_container(desired);
    if observed_container.and_then(operand_port) != desired_container.and_then(operand_port) {
        drift.push(DriftField::ContainerPort);
    }
    if observed_container.and_then(|c| c.image.as_deref())
        != desired_container.and_then(|c| c.image.as_deref())
    {
        drift.push(DriftField::Image);
    }

    if !owned_labels_match(template_labels(observed), template_labels(desired))
        || !owned_labels_match(
            observed.metadata.labels.as_ref(),
            desired.metadata.labels.as_ref(),
        )
    {
        drift.push(DriftField::Labels);
    }

    drift
}

fn merge_owned_labels(
    target: &mut Option<BTreeMap<String, String>>,
    desired: Option<&BTreeMap<String, String>>,
) {
    let labels = target.get_or_insert_with(BTreeMap::new);
    for key in OWNED_LABEL_KEYS {
        match desired.and_then(|d| d.get(key)) {
            Some(value) => {
                labels.insert(key.to_string(), value.clone());
            }
            None => {
                labels.remove(key);
            }
        }
    }
}

/// `observed` with the owned fields of `desired` written over it
///
/// Metadata (including `resourceVersion`), status and every field this
/// operator does not own are preserved.
pub fn merge_desired(observed: &Deployment, desired: &Deployment) -> Deployment {
    let mut merged = observed.clone();
    let desired_spec = desired.spec.clone().unwrap_or_default();

    merge_owned_labels(&mut merged.metadata.labels, desired.metadata.labels.as_ref());

    let spec = merged.spec.get_or_insert_with(|| desired_spec.clone());
    spec.replicas = desired_spec.replicas;

    let template_meta = spec.template.metadata.get_or_insert_with(Default::default);
    merge_owned_labels(&mut template_meta.labels, template_labels(desired));

    let Some(desired_container) = operand_container(desired) else {
        return merged;
    };
    let pod = spec
        .template
        .spec
        .get_or_insert_with(|| desired_spec.template.spec.clone().unwrap_or_default());

    // Containers under other names belong to someone else
    let Some(index) = pod.containers.iter().position(|c| c.name == CONTAINER_NAME) else {
        pod.containers.push(desired_container.clone());
        return merged;
    };

    let container = &mut pod.containers[index];
    container.image = desired_container.image.clone();
    if let Some(port) = operand_port(desired_container) {
        let ports = container.ports.get_or_insert_with(Vec::new);
        match operand_port_index(ports) {
            Some(i) => ports[i].container_port = port,
            None => ports.extend(desired_container.ports.clone().unwrap_or_default()),
        }
    }

    merged
}
