//! Producer/runtime version check.
//!
//! Generated registration code reports the engine version and record ABI it
//! was produced with. Records from a different ABI may carry fields this
//! runtime does not understand, so a mismatch is worth a warning but never
//! stops the program.

/// Version of this runtime.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Layout version of registration records and trap signatures.
pub const ABI_VERSION: u32 = 1;

/// Environment variable that turns the check off (`false`, `off` or `0`).
pub const CHECK_VERSION_ENV: &str = "XTRAP_CHECK_VERSION";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VersionSkew {
    #[error(
        "instrumented code targets trap ABI {producer} but the runtime provides ABI {runtime}; \
         upgrade the runtime (set XTRAP_CHECK_VERSION=off to silence)"
    )]
    RuntimeTooOld { producer: u32, runtime: u32 },
    #[error(
        "instrumented code targets trap ABI {producer} but the runtime provides ABI {runtime}; \
         re-instrument with a newer xtrapc (set XTRAP_CHECK_VERSION=off to silence)"
    )]
    ProducerTooOld { producer: u32, runtime: u32 },
}

/// Same version string or same ABI number is compatible.
pub fn check_version(producer_version: &str, producer_abi: u32) -> Result<(), VersionSkew> {
    if producer_version == VERSION || producer_abi == ABI_VERSION {
        return Ok(());
    }
    if producer_abi > ABI_VERSION {
        Err(VersionSkew::RuntimeTooOld {
            producer: producer_abi,
            runtime: ABI_VERSION,
        })
    } else {
        Err(VersionSkew::ProducerTooOld {
            producer: producer_abi,
            runtime: ABI_VERSION,
        })
    }
}

pub fn version_check_enabled() -> bool {
    check_enabled_from(std::env::var(CHECK_VERSION_ENV).ok().as_deref())
}

fn check_enabled_from(value: Option<&str>) -> bool {
    !matches!(
        value.map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("false" | "off" | "0")
    )
}
