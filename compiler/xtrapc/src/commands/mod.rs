//! Command handlers for the driver CLI.
//!
//! Shared helpers for reading units and writing printed files live here in
//! the module root.

mod check;
mod instrument;
mod print;

use std::path::{Path, PathBuf};

use xtrap_ir::emitter::FileEmitter;
use xtrap_ir::printer::Printer;
use xtrap_ir::{File, Unit};

use crate::DriverError;

pub use check::{check_config, CheckReport};
pub use instrument::{instrument_units, run_instrument, InstrumentOptions, Summary};
pub use print::print_unit;

/// Read one declaration tree from a JSON file.
pub fn read_unit(path: &Path) -> Result<Unit, DriverError> {
    let text = std::fs::read_to_string(path).map_err(|source| DriverError::ReadUnit {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| DriverError::ParseUnit {
        path: path.to_path_buf(),
        source,
    })
}

/// Where a printed file of `unit` goes under `out_dir`.
pub fn output_path(out_dir: &Path, unit: &Unit, file: &File) -> PathBuf {
    out_dir.join(&unit.package_path).join(file.file_name())
}

/// Print `file` into `path`, creating parent directories.
fn write_file(path: &Path, package: &str, file: &File) -> Result<(), DriverError> {
    let write_error = |source| DriverError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(write_error)?;
    }
    let mut printer = Printer::new(FileEmitter::create(path).map_err(write_error)?);
    printer.file(package, file);
    printer.finish().finish().map_err(write_error)
}
