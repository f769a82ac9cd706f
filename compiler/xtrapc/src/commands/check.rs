//! The `check` command: load configuration documents without instrumenting.

use std::path::Path;

use xtrap_instrument::{InstrumentConfig, Manifest, RuleSet};

use crate::DriverError;

/// What a successful check loaded.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckReport {
    pub config: Option<InstrumentConfig>,
    pub rules: Option<usize>,
    pub manifest_packages: Option<usize>,
}

/// Load each given document; the first malformed one is the error.
pub fn check_config(
    config: Option<&Path>,
    rules: Option<&Path>,
    manifest: Option<&Path>,
) -> Result<CheckReport, DriverError> {
    let mut report = CheckReport::default();
    if let Some(path) = config {
        report.config = Some(InstrumentConfig::load(path)?);
    }
    if let Some(path) = rules {
        report.rules = Some(RuleSet::load(path)?.len());
    }
    if let Some(path) = manifest {
        report.manifest_packages = Some(Manifest::load(path)?.packages.len());
    }
    Ok(report)
}
