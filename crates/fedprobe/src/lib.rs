//! Health probing for federated messenger deployments.
//!
//! A [`Scheduler`] drives rounds. Each round the [`Aggregator`] runs every
//! enabled check against every configured instance concurrently and folds the
//! partial results into one [`Round`], which is handed to a [`RoundSink`]
//! such as [`ConsoleReporter`].

pub mod checks;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod instance;
pub mod metrics;
pub mod report;
pub mod scheduler;
pub mod transport;

pub use checks::{Check, CheckKind, CheckSet};
pub use config::{Config, ProbeSettings};
pub use engine::Aggregator;
pub use error::{ConfigError, ProbeError};
pub use instance::{Endpoints, InstanceConfig, filter_instances};
pub use metrics::{InstanceResult, Metric, MetricValue, PartialResult, Round};
pub use report::{ConsoleReporter, ReportFormat};
pub use scheduler::{RoundSink, Scheduler, SchedulerState};
pub use transport::{Deadline, HttpRequest, HttpResponse, SshConnector, SshTarget, Transport};
