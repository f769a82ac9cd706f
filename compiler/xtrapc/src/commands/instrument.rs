//! The `instrument` command: rewrite units and emit registration files.

use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use xtrap_instrument::{
    InstrumentConfig, InstrumentOutput, InstrumentStats, Manifest, RuleSet, Session,
};
use xtrap_ir::{print_file, Unit};

use super::{output_path, read_unit, write_file};
use crate::DriverError;

/// Options of one `instrument` run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstrumentOptions {
    pub config: Option<PathBuf>,
    pub rules: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    /// Directory for the printed files; standard output when unset.
    pub out_dir: Option<PathBuf>,
    pub units: Vec<PathBuf>,
}

impl InstrumentOptions {
    /// Parse `--config=`, `--rules=`, `--manifest=`, `-o <dir>` / `--out=`
    /// and unit paths.
    pub fn parse(args: &[String]) -> Result<Self, DriverError> {
        let mut options = InstrumentOptions::default();
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if arg == "-o" {
                let Some(dir) = args.get(i + 1) else {
                    return Err(DriverError::Usage("-o needs a directory".to_string()));
                };
                options.out_dir = Some(PathBuf::from(dir));
                i += 2;
                continue;
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                options.config = Some(PathBuf::from(path));
            } else if let Some(path) = arg.strip_prefix("--rules=") {
                options.rules = Some(PathBuf::from(path));
            } else if let Some(path) = arg.strip_prefix("--manifest=") {
                options.manifest = Some(PathBuf::from(path));
            } else if let Some(dir) = arg.strip_prefix("--out=") {
                options.out_dir = Some(PathBuf::from(dir));
            } else if arg.starts_with('-') {
                return Err(DriverError::Usage(format!("unknown option `{arg}`")));
            } else {
                options.units.push(PathBuf::from(arg));
            }
            i += 1;
        }
        if options.units.is_empty() {
            return Err(DriverError::Usage("no units given".to_string()));
        }
        Ok(options)
    }

    /// Load configuration, rules and manifest into a session.
    pub fn session(&self) -> Result<Session, DriverError> {
        let config = match &self.config {
            Some(path) => InstrumentConfig::load(path)?,
            None => InstrumentConfig::default(),
        };
        let rules = match &self.rules {
            Some(path) => RuleSet::load(path)?,
            None => RuleSet::default(),
        };
        let manifest = self.manifest.as_deref().map(Manifest::load).transpose()?;
        Ok(Session::new(config, rules, manifest))
    }
}

/// Totals over every unit of a run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub units: usize,
    pub skipped_units: usize,
    pub stats: InstrumentStats,
    pub files_written: usize,
}

impl AddAssign<&InstrumentOutput> for Summary {
    fn add_assign(&mut self, output: &InstrumentOutput) {
        self.units += 1;
        if output.package_skip.is_some() {
            self.skipped_units += 1;
        }
        let stats = &mut self.stats;
        stats.collected += output.stats.collected;
        stats.skipped += output.stats.skipped;
        stats.trapped += output.stats.trapped;
        stats.abandoned += output.stats.abandoned;
        stats.registered += output.stats.registered;
        stats.var_reads += output.stats.var_reads;
        stats.batches += output.stats.batches;
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} units ({} skipped): {} declarations, {} trapped, {} registered in {} batches, {} variable reads",
            self.units,
            self.skipped_units,
            self.stats.collected,
            self.stats.trapped,
            self.stats.registered,
            self.stats.batches,
            self.stats.var_reads,
        )
    }
}

/// Instrument independent units in parallel. Results keep input order.
pub fn instrument_units(session: &Session, units: Vec<Unit>) -> Vec<(Unit, InstrumentOutput)> {
    units
        .into_par_iter()
        .map(|mut unit| {
            let output = session.instrument(&mut unit);
            (unit, output)
        })
        .collect()
}

/// Run the whole command: load, instrument, write.
pub fn run_instrument(options: &InstrumentOptions) -> Result<Summary, DriverError> {
    let session = options.session()?;
    let units = options
        .units
        .iter()
        .map(|path| read_unit(path))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(units = units.len(), "units loaded");

    let mut summary = Summary::default();
    for (unit, output) in instrument_units(&session, units) {
        summary += &output;
        summary.files_written += emit_unit(options.out_dir.as_deref(), &unit, &output)?;
    }
    Ok(summary)
}

/// Write or print the files of one instrumented unit; returns how many.
fn emit_unit(
    out_dir: Option<&Path>,
    unit: &Unit,
    output: &InstrumentOutput,
) -> Result<usize, DriverError> {
    let files: Vec<_> = unit.files.iter().chain(&output.synthetic).collect();
    for file in &files {
        match out_dir {
            Some(dir) => write_file(&output_path(dir, unit, file), &unit.package_name, file)?,
            None => {
                println!("// {}", file.path);
                print!("{}", print_file(&unit.package_name, file));
            }
        }
    }
    Ok(files.len())
}
