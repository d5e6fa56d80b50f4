//! Per-pod outcomes and the batch summary shown to the operator

use std::fmt;

use crate::storage::{PodRecord, StorageError};

/// Pipeline stage a warning or failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Probe,
    Statistics,
    Monitor,
    Geolocation,
    Ratings,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Probe => "probe",
            Stage::Statistics => "statistics",
            Stage::Monitor => "monitor",
            Stage::Geolocation => "geolocation",
            Stage::Ratings => "ratings",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

/// A degraded but non-fatal stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageWarning {
    pub stage: Stage,
    pub message: String,
}

/// A storage failure that ended a pod's pass
#[derive(Debug)]
pub struct PodFailure {
    pub stage: Stage,
    pub error: StorageError,
}

#[derive(Debug)]
pub struct PodOutcome {
    pub domain: String,
    /// The record that was written, or why nothing was written
    pub result: Result<PodRecord, PodFailure>,
    pub warnings: Vec<StageWarning>,
}

impl PodOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// `None` when the upstream version could not be fetched this run
    pub master_version: Option<String>,
    pub outcomes: Vec<PodOutcome>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &PodFailure)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.result {
            Ok(_) => None,
            Err(failure) => Some((outcome.domain.as_str(), failure)),
        })
    }

    pub fn outcome(&self, domain: &str) -> Option<&PodOutcome> {
        self.outcomes.iter().find(|outcome| outcome.domain == domain)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} pods processed, {} written, {} failed (master version: {})",
            self.processed(),
            self.succeeded(),
            self.processed() - self.succeeded(),
            self.master_version.as_deref().unwrap_or("unavailable")
        )?;
        for (domain, failure) in self.failures() {
            writeln!(f, "  {domain}: failed at {}: {}", failure.stage, failure.error)?;
        }
        Ok(())
    }
}
