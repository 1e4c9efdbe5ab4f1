//! Event publishers
//!
//! Lifecycle events are POSTed as JSON to a configured webhook. Without a
//! webhook they are only logged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::domain::ports::{EventPublisher, PkgEvent};
use crate::error::DomainError;

pub struct WebhookEventPublisher {
    http: Client,
    url: String,
}

impl WebhookEventPublisher {
    pub fn new(url: String) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            url,
        }
    }
}

#[async_trait]
impl EventPublisher for WebhookEventPublisher {
    async fn notify(&self, event: &PkgEvent) -> Result<(), DomainError> {
        let resp = self
            .http
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| DomainError::external("event", e))?;

        if !resp.status().is_success() {
            return Err(DomainError::external(
                "event",
                format!("webhook returned {}", resp.status()),
            ));
        }

        tracing::debug!(kind = event.kind(), "Published package event");
        Ok(())
    }
}

/// Logs events without delivering them
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn notify(&self, event: &PkgEvent) -> Result<(), DomainError> {
        tracing::debug!(kind = event.kind(), "Event webhook not configured, dropping event");
        Ok(())
    }
}

/// Either publisher, picked at startup
pub enum Publisher {
    Webhook(WebhookEventPublisher),
    Noop(NoopEventPublisher),
}

impl Publisher {
    pub fn from_url(url: Option<String>) -> Self {
        match url {
            Some(url) => Publisher::Webhook(WebhookEventPublisher::new(url)),
            None => Publisher::Noop(NoopEventPublisher),
        }
    }
}

#[async_trait]
impl EventPublisher for Publisher {
    async fn notify(&self, event: &PkgEvent) -> Result<(), DomainError> {
        match self {
            Publisher::Webhook(p) => p.notify(event).await,
            Publisher::Noop(p) => p.notify(event).await,
        }
    }
}
