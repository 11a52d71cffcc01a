use std::sync::Arc;

use jobrelay_infra::email::{DisabledEmailDispatcher, EmailDispatcher, HttpEmailDispatcher};
use jobrelay_infra::job_status::{EmailPolicy, JobStatusProcessor};
use jobrelay_infra::messages::MessageService;
use jobrelay_infra::notifications::{Forwarder, HttpForwarder, NotificationPipeline};
use jobrelay_infra::object_store::{HttpStoreClient, StoreClient};
use jobrelay_infra::output_folder::OutputFolderService;
use jobrelay_infra::reconciliation::ReconciliationSweep;
use jobrelay_infra::transport::build_http_client;
use jobrelay_infra::AgentConfig;

pub type SharedStore = Arc<dyn StoreClient>;
pub type SharedForwarder = Arc<dyn Forwarder>;
pub type SharedMailer = Arc<dyn EmailDispatcher>;

pub type Processor = JobStatusProcessor<SharedStore, SharedStore, SharedForwarder, SharedMailer>;

/// Everything the handlers need, shared across requests.
pub struct AppServices {
    pub processor: Processor,
    pub messages: MessageService<SharedStore>,
    pub output_folders: OutputFolderService<SharedStore>,
    jobs: SharedStore,
    notifications: SharedStore,
    reconcile_batch_size: usize,
}

impl AppServices {
    pub fn new(
        jobs: SharedStore,
        notifications: SharedStore,
        forwarder: SharedForwarder,
        mailer: SharedMailer,
        email: EmailPolicy,
        reconcile_batch_size: usize,
    ) -> Self {
        let pipeline = NotificationPipeline::new(notifications.clone(), forwarder);
        Self {
            processor: JobStatusProcessor::new(jobs.clone(), pipeline, mailer, email),
            messages: MessageService::new(notifications.clone()),
            output_folders: OutputFolderService::new(jobs.clone()),
            jobs,
            notifications,
            reconcile_batch_size,
        }
    }

    /// Wire HTTP clients for the configured store, recipients and e-mail gateway.
    ///
    /// All outbound calls share one HTTP client carrying the request timeout.
    pub fn from_config(config: &AgentConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config.request_timeout())?;

        let jobs: SharedStore = Arc::new(HttpStoreClient::new(
            client.clone(),
            &config.osm_base_url,
            &config.jobs_bucket,
        ));
        let notifications: SharedStore = Arc::new(HttpStoreClient::new(
            client.clone(),
            &config.osm_base_url,
            &config.notifications_bucket,
        ));
        let forwarder: SharedForwarder =
            Arc::new(HttpForwarder::new(client.clone(), config.msg_forward_urls.clone()));

        let (mailer, email): (SharedMailer, EmailPolicy) = match config.active_email() {
            Some(email) => (
                Arc::new(HttpEmailDispatcher::new(client, &email.gateway_url)),
                EmailPolicy::Enabled {
                    template: email.template.clone(),
                },
            ),
            None => (Arc::new(DisabledEmailDispatcher), EmailPolicy::Disabled),
        };

        Ok(Self::new(
            jobs,
            notifications,
            forwarder,
            mailer,
            email,
            config.reconcile_batch_size,
        ))
    }

    pub fn reconciliation(&self) -> ReconciliationSweep<SharedStore, SharedStore> {
        ReconciliationSweep::new(
            self.jobs.clone(),
            self.notifications.clone(),
            self.reconcile_batch_size,
        )
    }
}
