use lazy_static::lazy_static;
use serde_json::Value;

use crate::api::submission_dto::JobParametersDto;

/// Effective job parameters after the defaults merge. Unlike the DTO,
/// nothing here is optional-with-implicit-meaning: every field carries
/// its final value.
#[derive(Debug, Clone, PartialEq)]
pub struct JobParameters {
    pub bring_online: i64,
    pub copy_pin_lifetime: i64,
    pub verify_checksum: bool,
    pub overwrite: bool,
    pub reuse: bool,
    pub multihop: bool,
    pub retry: i32,
    pub priority: i32,
    pub selection_strategy: Option<String>,
    pub job_metadata: Option<Value>,
    pub spacetoken: Option<String>,
    pub source_spacetoken: Option<String>,
}

lazy_static! {
    /// The static defaults table. A submitted field that is absent or
    /// explicitly null takes its value from here.
    pub static ref DEFAULT_PARAMS: JobParameters = JobParameters {
        bring_online: -1,
        copy_pin_lifetime: -1,
        verify_checksum: false,
        overwrite: false,
        reuse: false,
        multihop: false,
        retry: 0,
        priority: 3,
        selection_strategy: None,
        job_metadata: None,
        spacetoken: None,
        source_spacetoken: None,
    };
}

impl JobParameters {
    /// Merges a submitted parameter set onto the defaults table. Each
    /// `Some` overrides one field; `None` (absence and explicit null
    /// alike) re-applies the default.
    pub fn merge(submitted: &JobParametersDto) -> JobParameters {
        let defaults = &*DEFAULT_PARAMS;
        JobParameters {
            bring_online: submitted.bring_online.unwrap_or(defaults.bring_online),
            copy_pin_lifetime: submitted.copy_pin_lifetime.unwrap_or(defaults.copy_pin_lifetime),
            verify_checksum: submitted.verify_checksum.unwrap_or(defaults.verify_checksum),
            overwrite: submitted.overwrite.unwrap_or(defaults.overwrite),
            reuse: submitted.reuse.unwrap_or(defaults.reuse),
            multihop: submitted.multihop.unwrap_or(defaults.multihop),
            retry: submitted.retry.unwrap_or(defaults.retry),
            priority: submitted.priority.unwrap_or(defaults.priority),
            selection_strategy: submitted.selection_strategy.clone().or_else(|| defaults.selection_strategy.clone()),
            job_metadata: submitted.job_metadata.clone().or_else(|| defaults.job_metadata.clone()),
            spacetoken: submitted.spacetoken.clone().or_else(|| defaults.spacetoken.clone()),
            source_spacetoken: submitted.source_spacetoken.clone().or_else(|| defaults.source_spacetoken.clone()),
        }
    }

    /// Whether the job asks for tape staging ahead of the transfer.
    pub fn wants_staging(&self) -> bool {
        self.bring_online > 0 || self.copy_pin_lifetime > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_submission_gives_the_defaults() {
        let merged = JobParameters::merge(&JobParametersDto::default());
        assert_eq!(merged, *DEFAULT_PARAMS);
        assert_eq!(merged.bring_online, -1);
        assert_eq!(merged.priority, 3);
        assert!(!merged.verify_checksum);
    }

    #[test]
    fn test_explicit_null_reapplies_the_default() {
        // An explicit null in the JSON deserializes to None, exactly
        // like absence, so both take the default
        let dto: JobParametersDto = serde_json::from_str(r#"{"priority": null, "retry": null}"#).unwrap();
        let merged = JobParameters::merge(&dto);
        assert_eq!(merged.priority, 3);
        assert_eq!(merged.retry, 0);
    }

    #[test]
    fn test_submitted_fields_override() {
        let dto: JobParametersDto = serde_json::from_str(r#"{"priority": 5, "reuse": true, "bring_online": 28800}"#).unwrap();
        let merged = JobParameters::merge(&dto);
        assert_eq!(merged.priority, 5);
        assert!(merged.reuse);
        assert_eq!(merged.bring_online, 28800);
        assert!(merged.wants_staging());
    }
}
