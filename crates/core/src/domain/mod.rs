// Domain Layer - Pure data and rules, no I/O

pub mod change;
pub mod error;
pub mod flush;
pub mod http;
pub mod job;

// Re-exports
pub use change::{Change, ChangeEvent, ChangeHandler, ChangeOp, EntityKind};
pub use error::DomainError;
pub use flush::{FlushOutcome, FlushResult, JobError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use job::{DedupeKey, Job, JobId, JobPayload};
