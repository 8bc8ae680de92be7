// Persisted queue envelope
//
// Current layout: {"version": 1, "jobs": [...]}
// Legacy layout (unversioned): a bare JSON array of jobs; read, then
// rewritten in the current layout on the next persist.

use super::constants::SNAPSHOT_VERSION;
use crate::domain::{DomainError, Job};
use serde::Serialize;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    jobs: &'a [Job],
}

pub(crate) fn encode(jobs: &[Job]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&EnvelopeRef {
        version: SNAPSHOT_VERSION,
        jobs,
    })
}

pub(crate) fn decode(raw: &str) -> Result<Vec<Job>, DomainError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| DomainError::MalformedSnapshot(e.to_string()))?;

    let jobs_value = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut envelope) => {
            let version = envelope
                .get("version")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| DomainError::MalformedSnapshot("missing version".to_string()))?;
            if version > u64::from(SNAPSHOT_VERSION) {
                return Err(DomainError::UnsupportedSnapshotVersion(
                    u32::try_from(version).unwrap_or(u32::MAX),
                ));
            }
            envelope
                .remove("jobs")
                .ok_or_else(|| DomainError::MalformedSnapshot("missing jobs".to_string()))?
        }
        other => {
            return Err(DomainError::MalformedSnapshot(format!(
                "unexpected top-level value: {}",
                other
            )))
        }
    };

    let jobs: Vec<Job> = serde_json::from_value(jobs_value)
        .map_err(|e| DomainError::MalformedSnapshot(e.to_string()))?;

    Ok(normalize(jobs))
}

/// Keep ids and dedupe keys unique; later entries win
fn normalize(jobs: Vec<Job>) -> Vec<Job> {
    let mut unique: Vec<Job> = Vec::with_capacity(jobs.len());
    for job in jobs {
        unique.retain(|kept| !kept.is_superseded_by(&job));
        unique.push(job);
    }
    unique
}
