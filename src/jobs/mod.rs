//! Job Store
//!
//! Loads the static list of job postings, drops records that fail
//! validation, and answers filter queries against what is left.
//!
//! The source is JSON, either `{"jobs": [...]}` or a bare array. Every
//! record needs the fields in [`REQUIRED_FIELDS`]; `url` must be http(s)
//! and `tags` a non-empty list of non-empty strings.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use crate::models::Filter;

/// Fields every job record must carry.
pub const REQUIRED_FIELDS: [&str; 6] = ["id", "title", "company", "location", "url", "tags"];

const BUNDLED_JOBS: &str = include_str!("../../data/jobs.sample.json");

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Failed to read job source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Job source is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How selected tags are compared against job tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagMatch {
    #[default]
    Exact,
    CaseInsensitive,
}

impl TagMatch {
    /// Whether a selected tag names the given job tag. Case folding is the
    /// same Unicode lowercasing the text search uses.
    pub fn matches(self, selected: &str, tag: &str) -> bool {
        match self {
            TagMatch::Exact => selected == tag,
            TagMatch::CaseInsensitive => selected.to_lowercase() == tag.to_lowercase(),
        }
    }
}

impl FromStr for TagMatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(TagMatch::Exact),
            "case-insensitive" | "insensitive" => Ok(TagMatch::CaseInsensitive),
            other => Err(format!("unknown tag match mode: {other}")),
        }
    }
}

impl fmt::Display for TagMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagMatch::Exact => write!(f, "exact"),
            TagMatch::CaseInsensitive => write!(f, "case-insensitive"),
        }
    }
}

/// A job record as it appears in the source, before validation.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct JobRecord {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1))]
    pub company: String,
    #[validate(length(min = 1))]
    pub location: String,
    #[validate(custom(function = "validate_http_url"))]
    pub url: String,
    #[validate(length(min = 1), custom(function = "validate_tags"))]
    pub tags: Vec<String>,
}

fn validate_http_url(url: &str) -> Result<(), ValidationError> {
    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(_) => Err(ValidationError::new("unsupported_protocol")),
        Err(_) => Err(ValidationError::new("invalid_url")),
    }
}

fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().any(|t| t.trim().is_empty()) {
        return Err(ValidationError::new("blank_tag"));
    }
    Ok(())
}

/// An immutable, validated job posting.
///
/// The `*_lc` fields hold lowercase copies used by text search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    pub tags: BTreeSet<String>,
    #[serde(skip)]
    pub title_lc: String,
    #[serde(skip)]
    pub company_lc: String,
    #[serde(skip)]
    pub location_lc: String,
}

impl From<JobRecord> for Job {
    fn from(record: JobRecord) -> Self {
        Self {
            title_lc: record.title.to_lowercase(),
            company_lc: record.company.to_lowercase(),
            location_lc: record.location.to_lowercase(),
            id: record.id,
            title: record.title,
            company: record.company,
            location: record.location,
            url: record.url,
            tags: record.tags.into_iter().collect(),
        }
    }
}

impl Job {
    fn matches_text(&self, query_lc: &str) -> bool {
        query_lc.is_empty()
            || self.title_lc.contains(query_lc)
            || self.company_lc.contains(query_lc)
            || self.location_lc.contains(query_lc)
    }

    fn matches_tags(&self, selected: &BTreeSet<String>, tag_match: TagMatch) -> bool {
        if selected.is_empty() {
            return true;
        }
        selected
            .iter()
            .any(|s| self.tags.iter().any(|t| tag_match.matches(s, t)))
    }
}

/// Check one raw source record, returning the typed record or the reason
/// it was rejected.
pub fn validate_job(value: &serde_json::Value) -> Result<JobRecord, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())?;

    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
        return Err(format!("missing field `{missing}`"));
    }

    let record: JobRecord =
        serde_json::from_value(value.clone()).map_err(|e| format!("malformed record: {e}"))?;
    record
        .validate()
        .map_err(|e| format!("invalid record: {e}"))?;

    Ok(record)
}

pub fn job_is_valid(value: &serde_json::Value) -> bool {
    validate_job(value).is_ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JobSource {
    Wrapped { jobs: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

/// Parse a JSON job source, keeping only valid records in source order.
pub fn parse_jobs(json: &str) -> Result<Vec<Job>, JobError> {
    let raw = match serde_json::from_str::<JobSource>(json)? {
        JobSource::Wrapped { jobs } | JobSource::Bare(jobs) => jobs,
    };

    let total = raw.len();
    let jobs: Vec<Job> = raw
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match validate_job(value) {
            Ok(record) => Some(Job::from(record)),
            Err(reason) => {
                let id = value.get("id").map(|v| v.to_string()).unwrap_or_default();
                warn!(index, id = %id, reason = %reason, "Dropping invalid job record");
                None
            }
        })
        .collect();

    if jobs.len() < total {
        warn!(kept = jobs.len(), dropped = total - jobs.len(), "Job source contained invalid records");
    }

    Ok(jobs)
}

/// Return the jobs matching `filter`, preserving source order.
///
/// Text matches when the lowercased query is a substring of the title,
/// company or location. Tags match when any selected tag is on the job.
pub fn filter_jobs<'a>(jobs: &'a [Job], filter: &Filter, tag_match: TagMatch) -> Vec<&'a Job> {
    let query_lc = filter.query.to_lowercase();
    jobs.iter()
        .filter(|j| j.matches_text(&query_lc))
        .filter(|j| j.matches_tags(&filter.tags, tag_match))
        .collect()
}

/// The validated job list and its tag vocabulary.
#[derive(Debug, Clone)]
pub struct JobStore {
    jobs: Vec<Job>,
    tags: Vec<String>,
    tag_match: TagMatch,
}

impl JobStore {
    pub fn new(jobs: Vec<Job>, tag_match: TagMatch) -> Self {
        let tags = jobs
            .iter()
            .flat_map(|j| j.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            jobs,
            tags,
            tag_match,
        }
    }

    /// The fixture compiled into the binary.
    pub fn bundled(tag_match: TagMatch) -> Result<Self, JobError> {
        Ok(Self::new(parse_jobs(BUNDLED_JOBS)?, tag_match))
    }

    pub fn from_file(path: &Path, tag_match: TagMatch) -> Result<Self, JobError> {
        let json = std::fs::read_to_string(path).map_err(|source| JobError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::new(parse_jobs(&json)?, tag_match);
        info!(path = %path.display(), jobs = store.len(), "Loaded job source");
        Ok(store)
    }

    /// Load from `path` when given, otherwise the bundled fixture.
    pub fn load(path: Option<&Path>, tag_match: TagMatch) -> Result<Self, JobError> {
        match path {
            Some(path) => Self::from_file(path, tag_match),
            None => Self::bundled(tag_match),
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Every tag used by any job, unique and sorted.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn tag_match(&self) -> TagMatch {
        self.tag_match
    }

    pub fn filter(&self, filter: &Filter) -> Vec<&Job> {
        filter_jobs(&self.jobs, filter, self.tag_match)
    }
}
