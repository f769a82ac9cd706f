//! The `print` command: render a unit as source without instrumenting it.

use std::path::Path;

use xtrap_ir::print_file;

use super::read_unit;
use crate::DriverError;

/// Printed text of every file of the unit at `path`, in order.
pub fn print_unit(path: &Path) -> Result<Vec<(String, String)>, DriverError> {
    let unit = read_unit(path)?;
    Ok(unit
        .files
        .iter()
        .map(|file| (file.path.clone(), print_file(&unit.package_name, file)))
        .collect())
}
