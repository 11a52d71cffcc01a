//! Job status e-mail notifications.
//!
//! E-mail is handed to an external gateway as a templated request and is fire
//! and forget: the caller never waits for the gateway and never sees its
//! failures, which are only logged.

use std::sync::{Arc, Mutex};

use jobrelay_core::{JobRecord, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Template values understood by the e-mail gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailValues {
    pub analysisname: String,
    pub analysisstatus: String,
    pub analysisstartdate: Timestamp,
    pub analysisresultsfolder: String,
    pub analysisdescription: String,
}

/// Request body sent to the e-mail gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailNotification {
    pub to: String,
    pub template: String,
    pub subject: String,
    pub values: EmailValues,
}

impl EmailNotification {
    /// Status-change e-mail for `job`, or `None` when the job has no address.
    pub fn for_job(job: &JobRecord, template: &str) -> Option<Self> {
        let to = job.email_address()?;
        let name = job.display_name();
        Some(Self {
            to: to.to_string(),
            template: template.to_string(),
            subject: format!("{name} status changed."),
            values: EmailValues {
                analysisname: name.to_string(),
                analysisstatus: job.status.clone(),
                analysisstartdate: job.submission_date.clone().unwrap_or_default(),
                analysisresultsfolder: job.result_folder_path(),
                analysisdescription: job.description.clone().unwrap_or_default(),
            },
        })
    }
}

/// Sends e-mail without waiting for the outcome.
pub trait EmailDispatcher: Send + Sync {
    fn dispatch(&self, email: EmailNotification);
}

impl<D> EmailDispatcher for Arc<D>
where
    D: EmailDispatcher + ?Sized,
{
    fn dispatch(&self, email: EmailNotification) {
        (**self).dispatch(email)
    }
}

/// Posts e-mail requests to the gateway on a detached task.
#[derive(Debug, Clone)]
pub struct HttpEmailDispatcher {
    client: reqwest::Client,
    gateway_url: String,
}

impl HttpEmailDispatcher {
    pub fn new(client: reqwest::Client, gateway_url: impl Into<String>) -> Self {
        Self {
            client,
            gateway_url: gateway_url.into(),
        }
    }
}

impl EmailDispatcher for HttpEmailDispatcher {
    fn dispatch(&self, email: EmailNotification) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(to = %email.to, "no async runtime; e-mail dropped");
            return;
        };

        debug!(to = %email.to, url = %self.gateway_url, "sending e-mail notification");
        let request = self.client.post(&self.gateway_url).json(&email);
        let url = self.gateway_url.clone();
        runtime.spawn(async move {
            match request.send().await {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        warn!(
                            url = %url,
                            status = %resp.status(),
                            to = %email.to,
                            "e-mail gateway returned non-success status"
                        );
                    }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, to = %email.to, "unable to reach e-mail gateway");
                }
            }
        });
    }
}

/// Dispatcher for deployments with e-mail turned off.
#[derive(Debug, Default, Copy, Clone)]
pub struct DisabledEmailDispatcher;

impl EmailDispatcher for DisabledEmailDispatcher {
    fn dispatch(&self, email: EmailNotification) {
        debug!(to = %email.to, "e-mail disabled; dropping notification");
    }
}

/// Dispatcher that records every e-mail. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct RecordingEmailDispatcher {
    sent: Mutex<Vec<EmailNotification>>,
}

impl RecordingEmailDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl EmailDispatcher for RecordingEmailDispatcher {
    fn dispatch(&self, email: EmailNotification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email);
        }
    }
}
