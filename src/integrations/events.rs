//! Domain event publishing over NATS.

use tracing::{debug, warn};
use crate::domain::events::DomainEvent;

#[derive(Clone, Debug, Default)]
pub struct EventPublisher { nats: Option<async_nats::Client> }

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self { nats: None } }

    /// Publishing never fails the caller; errors are logged.
    pub async fn publish(&self, event: &DomainEvent) {
        let subject = format!("storefront.{}", event.subject());
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(error) => { warn!(%error, %subject, "failed to encode event"); return; }
        };
        match &self.nats {
            Some(client) => {
                if let Err(error) = client.publish(subject.clone(), payload.into()).await {
                    warn!(%error, %subject, "failed to publish event");
                }
            }
            None => debug!(%subject, "event (nats disabled)"),
        }
    }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        for event in &events { self.publish(event).await; }
    }
}
