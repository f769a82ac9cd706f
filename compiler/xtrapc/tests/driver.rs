//! Driver runs over units written to a temporary directory.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use xtrap_ir::{Decl, File, FuncDecl, Stmt, Unit};
use xtrapc::commands::{check_config, instrument_units, print_unit, run_instrument, InstrumentOptions};
use xtrapc::DriverError;

fn unit(package_path: &str, funcs: &[&str]) -> Unit {
    Unit {
        package_path: package_path.to_string(),
        package_name: "app".to_string(),
        stdlib: false,
        files: vec![File {
            path: format!("/src/{package_path}/main.go"),
            imports: Vec::new(),
            decls: funcs
                .iter()
                .map(|name| Decl::Func(FuncDecl::new(*name).with_body(vec![Stmt::ret(Vec::new())])))
                .collect(),
        }],
    }
}

fn write_json(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn write_unit(dir: &Path, name: &str, unit: &Unit) -> PathBuf {
    write_json(dir, name, &serde_json::to_string(unit).unwrap())
}

#[test]
fn instrument_writes_sources_and_registration_files() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let options = InstrumentOptions {
        units: vec![
            write_unit(dir.path(), "a.json", &unit("example.com/a", &["F", "G"])),
            write_unit(dir.path(), "b.json", &unit("example.com/b", &["H"])),
        ],
        out_dir: Some(out.clone()),
        ..InstrumentOptions::default()
    };

    let summary = run_instrument(&options).unwrap();
    assert_eq!(summary.units, 2);
    assert_eq!(summary.stats.trapped, 3);
    assert_eq!(summary.files_written, 4);

    let main = std::fs::read_to_string(out.join("example.com/a/main.go")).unwrap();
    assert!(main.starts_with("package app\n"), "{main}");
    assert!(main.contains("_post, _stop := __xtrap_trap_0("), "{main}");
    let register =
        std::fs::read_to_string(out.join("example.com/b/__xtrap_autogen_register_0.go")).unwrap();
    assert!(register.contains("func init() {"), "{register}");
}

#[test]
fn rules_exclude_declarations() {
    let dir = tempfile::tempdir().unwrap();
    let rules = write_json(dir.path(), "rules.json", r#"{"rules": [{"name": "G", "action": "exclude"}]}"#);
    let options = InstrumentOptions {
        rules: Some(rules),
        units: vec![write_unit(dir.path(), "a.json", &unit("example.com/a", &["F", "G"]))],
        out_dir: Some(dir.path().join("out")),
        ..InstrumentOptions::default()
    };
    let summary = run_instrument(&options).unwrap();
    assert_eq!(summary.stats.trapped, 1);
    assert_eq!(summary.stats.skipped, 1);
}

#[test]
fn malformed_rule_file_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let rules = write_json(dir.path(), "rules.json", "{\"rules\": [");
    let err = check_config(None, Some(&rules), None).unwrap_err();
    assert!(matches!(err, DriverError::Config(_)));
    assert!(err.to_string().contains("rules.json"), "{err}");
}

#[test]
fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_json(dir.path(), "xtrap.json", r#"{"batch_size": 0}"#);
    let err = check_config(Some(&config), None, None).unwrap_err();
    assert!(err.to_string().contains("batch_size"), "{err}");
}

#[test]
fn malformed_unit_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_json(dir.path(), "broken.json", "[]");
    let err = print_unit(&path).unwrap_err();
    assert!(matches!(err, DriverError::ParseUnit { .. }));
}

#[test]
fn parallel_results_keep_input_order() {
    let session = InstrumentOptions::default().session().unwrap();
    let units: Vec<Unit> = (0..16)
        .map(|i| unit(&format!("example.com/p{i}"), &["F"]))
        .collect();
    let paths: Vec<String> = instrument_units(&session, units)
        .into_iter()
        .map(|(unit, _)| unit.package_path)
        .collect();
    let expected: Vec<String> = (0..16).map(|i| format!("example.com/p{i}")).collect();
    assert_eq!(paths, expected);
}
