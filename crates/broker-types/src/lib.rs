pub mod contract;
pub mod error;
pub mod model;

pub use contract::{BrokerAdapter, JobEventListener, ListJobsQuery, Unregister};
pub use error::{AdapterError, AdapterResult};
pub use model::{
    ConnectionDescriptor, Job, JobError, JobEvent, JobEventKind, JobStatus, Metrics, Queue,
};
