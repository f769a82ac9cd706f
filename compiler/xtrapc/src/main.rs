//! xtrap driver CLI
//!
//! Instruments JSON declaration trees and prints the rewritten sources.

use std::path::{Path, PathBuf};

use xtrapc::commands::{check_config, print_unit, run_instrument, InstrumentOptions};
use xtrapc::DriverError;

fn main() {
    xtrapc::init_tracing();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];

    match command.as_str() {
        "instrument" => {
            let options = InstrumentOptions::parse(&args[2..]).unwrap_or_else(|err| fail(&err));
            match run_instrument(&options) {
                Ok(summary) => eprintln!("{summary}"),
                Err(err) => fail(&err),
            }
        }
        "print" => {
            if args.len() < 3 {
                eprintln!("Usage: xtrapc print <unit.json>");
                std::process::exit(1);
            }
            let files = print_unit(Path::new(&args[2])).unwrap_or_else(|err| fail(&err));
            for (path, text) in files {
                println!("// {path}");
                print!("{text}");
            }
        }
        "check" => {
            let mut config = None;
            let mut rules = None;
            let mut manifest = None;
            for arg in args.iter().skip(2) {
                if let Some(path) = arg.strip_prefix("--config=") {
                    config = Some(PathBuf::from(path));
                } else if let Some(path) = arg.strip_prefix("--rules=") {
                    rules = Some(PathBuf::from(path));
                } else if let Some(path) = arg.strip_prefix("--manifest=") {
                    manifest = Some(PathBuf::from(path));
                } else {
                    fail(&DriverError::Usage(format!("unknown argument `{arg}`")));
                }
            }
            let report = check_config(config.as_deref(), rules.as_deref(), manifest.as_deref())
                .unwrap_or_else(|err| fail(&err));
            if let Some(config) = report.config {
                println!(
                    "config: batch size {}, runtime `{}`, host {}",
                    config.batch_size, config.runtime_path, config.host_version
                );
            }
            if let Some(rules) = report.rules {
                println!("rules: {rules}");
            }
            if let Some(packages) = report.manifest_packages {
                println!("manifest: {packages} packages");
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "version" | "--version" | "-v" => {
            println!("xtrapc {}", env!("CARGO_PKG_VERSION"));
            println!("trap ABI {}", xtrap_instrument::TRAP_ABI_VERSION);
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn fail(err: &DriverError) -> ! {
    eprintln!("error: {err}");
    if matches!(err, DriverError::Usage(_)) {
        eprintln!();
        eprintln!("Run `xtrapc help` for usage.");
    }
    std::process::exit(1);
}

fn print_usage() {
    println!("xtrapc (declaration instrumentation and trap injection)");
    println!();
    println!("Usage: xtrapc <command> [options]");
    println!();
    println!("Commands:");
    println!("  instrument <unit.json>...  Instrument units and print or write the result");
    println!("  print <unit.json>          Print a unit as source, unchanged");
    println!("  check                      Validate configuration documents");
    println!("  help                       Show this help message");
    println!("  version                    Show version information");
    println!();
    println!("Instrument options:");
    println!("  --config=<file>     Engine configuration (JSON)");
    println!("  --rules=<file>      Rule file (JSON)");
    println!("  --manifest=<file>   Package manifest (JSON)");
    println!("  -o <dir>            Write files under <dir>/<package path>/");
    println!("  --out=<dir>         Same as -o");
    println!();
    println!("Check options:");
    println!("  --config=<file>  --rules=<file>  --manifest=<file>");
    println!();
    println!("Environment:");
    println!("  RUST_LOG=xtrap_instrument=debug   Log per-unit decisions");
    println!("  XTRAP_CHECK_VERSION=off           Silence runtime version checks");
    println!();
    println!("Examples:");
    println!("  xtrapc instrument app.json -o build/xtrap");
    println!("  xtrapc instrument --rules=rules.json a.json b.json");
    println!("  xtrapc check --config=xtrap.json --rules=rules.json");
}
