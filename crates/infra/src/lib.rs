//! Infrastructure layer: object store clients, notification delivery, and the
//! services built on them.

pub mod config;
pub mod email;
pub mod job_status;
pub mod messages;
pub mod notifications;
pub mod object_store;
pub mod output_folder;
pub mod reconciliation;
pub mod transport;

pub use config::{AgentConfig, ConfigError, EmailConfig};
pub use email::{DisabledEmailDispatcher, EmailDispatcher, EmailNotification, HttpEmailDispatcher};
pub use job_status::{EmailPolicy, JobStatusProcessor, ProcessError, ProcessOutcome};
pub use messages::{DeleteRequest, MessageQuery, MessageService, MessageServiceError};
pub use notifications::{Forwarder, HttpForwarder, NotificationPipeline, PipelineError};
pub use object_store::{HttpStoreClient, InMemoryStoreClient, Query, StoreClient, StoreError};
pub use output_folder::{OutputFolderError, OutputFolderRequest, OutputFolderService};
pub use reconciliation::{ReconciliationSweep, SweepError, SweepReport};
