use std::sync::Arc;

use crate::admission::builder::{BuiltJob, JobBuilder};
use crate::api::submission_dto::JobSubmissionDto;
use crate::domain::identity::Identity;
use crate::error::Result;
use crate::persistence::store::JobStore;
use crate::stats::repository::StatisticsRepository;

pub mod admission;
pub mod api;
pub mod banning;
pub mod domain;
pub mod error;
pub mod logger;
pub mod persistence;
pub mod scheduler;
pub mod stats;

/// Admits one submission end to end: validation, classification,
/// replica selection, ban filtering and persistence.
///
/// Convenience entry point for callers that do not hold a
/// [`JobBuilder`] of their own; the transport layer wrapping this core
/// maps the returned `Result` onto its own responses.
pub fn submit_job<S, R>(store: Arc<S>, stats: R, identity: &Identity, request: &JobSubmissionDto) -> Result<BuiltJob>
where
    S: JobStore,
    R: StatisticsRepository,
{
    let builder = JobBuilder::new(store, stats);
    builder.submit(identity, request)
}
