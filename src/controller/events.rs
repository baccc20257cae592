//! # Events
//!
//! Fire-and-forget Kubernetes Events. Publishing never blocks reconciliation
//! and a failed publish is only logged.

use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

impl From<EventSeverity> for EventType {
    fn from(severity: EventSeverity) -> Self {
        match severity {
            EventSeverity::Normal => EventType::Normal,
            EventSeverity::Warning => EventType::Warning,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, reference: &ObjectReference, severity: EventSeverity, reason: &str, message: String);
}

/// Publishes through a `kube` event recorder on a background task
#[derive(Clone)]
pub struct KubeEventSink {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventSink").finish_non_exhaustive()
    }
}

impl KubeEventSink {
    pub fn new(client: Client, controller: &str) -> Self {
        let reporter = Reporter {
            controller: controller.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

impl EventSink for KubeEventSink {
    fn emit(&self, reference: &ObjectReference, severity: EventSeverity, reason: &str, message: String) {
        let recorder = self.recorder.clone();
        let reference = reference.clone();
        let event = Event {
            type_: severity.into(),
            reason: reason.to_string(),
            note: Some(message),
            action: reason.to_string(),
            secondary: None,
        };
        tokio::spawn(async move {
            if let Err(e) = recorder.publish(&event, &reference).await {
                debug!(
                    "Failed to publish event {} for {:?}/{:?}: {}",
                    event.reason, reference.namespace, reference.name, e
                );
            }
        });
    }
}
