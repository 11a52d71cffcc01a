use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The recipient answered with something other than `200 OK`.
    Rejected(u16),
    /// The recipient could not be reached (or timed out).
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub url: String,
    pub outcome: DeliveryOutcome,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered)
    }
}

/// Delivers a persisted notification to every recipient.
///
/// Delivery is at most one attempt per recipient. Failures are reported in the
/// returned outcomes and never as an error.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, body: &str) -> Vec<Delivery>;
}

#[async_trait]
impl<F> Forwarder for Arc<F>
where
    F: Forwarder + ?Sized,
{
    async fn forward(&self, body: &str) -> Vec<Delivery> {
        (**self).forward(body).await
    }
}

/// Forwards over HTTP to a fixed list of URLs, all recipients concurrently.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl HttpForwarder {
    pub fn new(client: reqwest::Client, urls: Vec<String>) -> Self {
        Self { client, urls }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    async fn deliver(client: reqwest::Client, url: String, body: String) -> Delivery {
        debug!(url = %url, "forwarding notification");
        let outcome = match client
            .post(&url)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body.clone())
            .send()
            .await
        {
            Ok(resp) if resp.status() == StatusCode::OK => DeliveryOutcome::Delivered,
            Ok(resp) => {
                warn!(
                    url = %url,
                    status = %resp.status(),
                    body = %body,
                    "forward recipient returned non-success status"
                );
                DeliveryOutcome::Rejected(resp.status().as_u16())
            }
            Err(e) => {
                warn!(url = %url, error = %e, body = %body, "unable to forward notification");
                DeliveryOutcome::Unreachable(e.to_string())
            }
        };
        Delivery { url, outcome }
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, body: &str) -> Vec<Delivery> {
        if self.urls.is_empty() {
            return Vec::new();
        }
        debug!(recipients = self.urls.len(), "forwarding notification to recipients");

        let mut tasks = JoinSet::new();
        for (index, url) in self.urls.iter().enumerate() {
            let deliver = Self::deliver(self.client.clone(), url.clone(), body.to_string());
            tasks.spawn(async move { (index, deliver.await) });
        }

        let mut deliveries = Vec::with_capacity(self.urls.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(delivery) => deliveries.push(delivery),
                Err(e) => warn!(error = %e, "forward task failed"),
            }
        }
        deliveries.sort_by_key(|(index, _)| *index);
        deliveries.into_iter().map(|(_, d)| d).collect()
    }
}

/// Forwarder that records every body it is given and reports success.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct RecordingForwarder {
    bodies: Mutex<Vec<String>>,
}

impl RecordingForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every forwarded body, in call order.
    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Forwarded bodies parsed as JSON (unparsable bodies are skipped).
    pub fn messages(&self) -> Vec<serde_json::Value> {
        self.bodies()
            .iter()
            .filter_map(|b| serde_json::from_str(b).ok())
            .collect()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(&self, body: &str) -> Vec<Delivery> {
        if let Ok(mut bodies) = self.bodies.lock() {
            bodies.push(body.to_string());
        }
        vec![Delivery {
            url: "memory://recorder".to_string(),
            outcome: DeliveryOutcome::Delivered,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn no_recipients_means_no_deliveries() {
        let forwarder = HttpForwarder::new(reqwest::Client::new(), Vec::new());
        assert!(forwarder.forward("{}").await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_recipient_is_reported_not_raised() {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        // Port 9 on loopback is closed in test environments.
        let forwarder = HttpForwarder::new(client, vec!["http://127.0.0.1:9/hook".into()]);

        let deliveries = forwarder.forward(r#"{"n":1}"#).await;
        assert_eq!(deliveries.len(), 1);
        assert!(matches!(deliveries[0].outcome, DeliveryOutcome::Unreachable(_)));
    }

    #[tokio::test]
    async fn recorder_keeps_bodies_in_order() {
        let recorder = RecordingForwarder::new();
        recorder.forward(r#"{"n":1}"#).await;
        recorder.forward(r#"{"n":2}"#).await;
        let messages = recorder.messages();
        assert_eq!(messages[0]["n"], 1);
        assert_eq!(messages[1]["n"], 2);
    }
}
