//! The per-unit instrumentation pass.
//!
//! Stages, in order:
//!
//! 1. package gate ([`UnitContext::package_skip`]);
//! 2. collection and filtering;
//! 3. variable read rewriting, when enabled for the unit;
//! 4. trap insertion into non-generic functions, then the generic pass;
//! 5. per-file helpers;
//! 6. batched registration units.
//!
//! Records are handled strictly in `(file_index, decl_index)` order, so the
//! same input always yields the same output.

use xtrap_ir::{Decl, File, Unit};

use crate::batch::registration_units;
use crate::codegen::{ensure_runtime_import, file_helpers};
use crate::collect::collect_unit;
use crate::context::{PackageSkip, Session, UnitContext};
use crate::decl::{DeclInfo, FileUnit, PackageNames};
use crate::filter::{Filter, Verdict};
use crate::host::GenericStrategy;
use crate::synth::insert_trap;
use crate::var_trap::{rewrite_file, Rewritten, VarTargets};

/// Counters of one pass, for logging and the driver's summary.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct InstrumentStats {
    pub collected: usize,
    pub skipped: usize,
    pub trapped: usize,
    pub abandoned: usize,
    pub registered: usize,
    pub var_reads: usize,
    pub batches: usize,
}

/// What a pass did to one unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstrumentOutput {
    /// Set when the whole unit was left alone.
    pub package_skip: Option<PackageSkip>,
    /// Records that passed the filter, per file.
    pub files: Vec<FileUnit>,
    /// Extra files to compile with the unit.
    pub synthetic: Vec<File>,
    pub stats: InstrumentStats,
}

impl InstrumentOutput {
    /// All records that get a registration call, in registration order.
    pub fn registered(&self) -> impl Iterator<Item = &DeclInfo> {
        self.files
            .iter()
            .flat_map(|file| &file.decls)
            .filter(|decl| decl.is_registered())
    }
}

impl Session {
    /// Instrument `unit` in place.
    pub fn instrument(&self, unit: &mut Unit) -> InstrumentOutput {
        let span = tracing::debug_span!("instrument", pkg = %unit.package_path);
        let _enter = span.enter();

        let ctx = UnitContext::new(self, unit);
        if let Some(skip) = ctx.package_skip(unit) {
            tracing::debug!(reason = ?skip, "package skipped");
            return InstrumentOutput {
                package_skip: Some(skip),
                ..InstrumentOutput::default()
            };
        }

        let mut stats = InstrumentStats::default();
        let mut files = collect_unit(&ctx, unit);
        let filter = Filter::new(&ctx);
        for file_unit in &mut files {
            let file = &unit.files[file_unit.index];
            stats.collected += file_unit.decls.len();
            file_unit
                .decls
                .retain(|decl| filter.verdict(file, decl) == Verdict::Trap);
        }
        stats.skipped = stats.collected - files.iter().map(|f| f.decls.len()).sum::<usize>();

        let mut rewritten: Vec<Rewritten> = vec![Rewritten::default(); unit.files.len()];
        if ctx.var_trap {
            let targets = VarTargets::from_decls(
                files
                    .iter()
                    .flat_map(|file| &file.decls)
                    .filter(|decl| decl.kind.is_value()),
            );
            let manifest = self.manifest();
            if !targets.is_empty() || manifest.is_some() {
                for (index, file) in unit.files.iter_mut().enumerate() {
                    let names = PackageNames::for_file(index);
                    rewritten[index] = rewrite_file(file, index, &names, &targets, manifest);
                    stats.var_reads += rewritten[index].reads;
                }
            }
        }

        self.insert_traps(unit, &mut files, false, &mut stats);
        if self.host().generic_strategy() != GenericStrategy::Unsupported {
            self.insert_traps(unit, &mut files, true, &mut stats);
        }

        for file_unit in &files {
            let refs = &rewritten[file_unit.index];
            let records: Vec<&DeclInfo> =
                file_unit.decls.iter().filter(|decl| decl.is_registered()).collect();
            if records.is_empty() && refs.reads == 0 {
                continue;
            }
            let names = PackageNames::for_file(file_unit.index);
            let file = &mut unit.files[file_unit.index];
            ensure_runtime_import(self.host(), file, &self.config().runtime_path);
            let helpers = file_helpers(
                self.host(),
                &unit.package_path,
                &file_unit.path,
                &names,
                &records,
                &refs.refs,
            );
            file.decls.extend(helpers);
        }

        let records: Vec<&DeclInfo> = files
            .iter()
            .flat_map(|file| &file.decls)
            .filter(|decl| decl.is_registered())
            .collect();
        stats.registered = records.len();
        stats.batches = records.len().div_ceil(self.config().batch_size.max(1));
        let first_file = unit.files.first().map_or("", |file| file.path.as_str());
        let synthetic = if records.is_empty() {
            Vec::new()
        } else {
            registration_units(
                self.host(),
                &self.config().runtime_path,
                first_file,
                records,
                self.config().batch_size,
            )
        };

        tracing::debug!(
            collected = stats.collected,
            trapped = stats.trapped,
            registered = stats.registered,
            batches = stats.batches,
            "unit instrumented"
        );
        InstrumentOutput {
            package_skip: None,
            files,
            synthetic,
            stats,
        }
    }

    /// Trap every approved function-like record whose generic flag equals
    /// `generic`.
    fn insert_traps(
        &self,
        unit: &mut Unit,
        files: &mut [FileUnit],
        generic: bool,
        stats: &mut InstrumentStats,
    ) {
        let host = self.host();
        for file_unit in files.iter_mut() {
            let names = PackageNames::for_file(file_unit.index);
            let file = &mut unit.files[file_unit.index];
            for decl in &mut file_unit.decls {
                if !decl.kind.is_func() || decl.is_generic() != generic {
                    continue;
                }
                let Some(Decl::Func(func)) = file.decls.get_mut(decl.source_decl) else {
                    continue;
                };
                match insert_trap(host, &names, decl, func) {
                    Ok(()) => stats.trapped += 1,
                    Err(reason) => {
                        tracing::debug!(decl = %decl.identity_name, ?reason, "trap abandoned");
                        stats.abandoned += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
