//! Offline open-password recovery for OOXML encrypted-package workbooks.
//!
//! This crate currently supports:
//! - Extracting the `keyData` verification parameters (`spinCount`, `saltValue`, `hashValue`,
//!   `hashAlgorithm`) from a container's `EncryptionInfo` entry
//! - Dictionary, numeric brute-force, and hybrid candidate streams
//! - PBKDF2-HMAC-SHA1/SHA-2 candidate verification
//! - A cancellable attack loop with throughput/ETA reporting, run on a worker thread
//!
//! Typical use:
//!
//! ```no_run
//! use formula_pwrecover::{
//!     extract_encryption_params, AttackStrategy, CandidatePlan, RecoveryHost, RunOutcome,
//!     StartRequest,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("book.xlsx")?;
//! let Some(params) = extract_encryption_params(&bytes)? else {
//!     println!("not password-protected");
//!     return Ok(());
//! };
//!
//! let mut host = RecoveryHost::default();
//! host.start(StartRequest {
//!     plan: CandidatePlan::new(AttackStrategy::Hybrid),
//!     params,
//! })?;
//! match host.wait(|p| eprintln!("{}/{} {}", p.tested, p.total, p.current)) {
//!     Some(RunOutcome::Found(password)) => println!("password: {password}"),
//!     other => println!("{other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod attack;
pub mod candidates;
pub mod cli;
pub mod encryption_info;
pub mod error;
pub mod host;
pub mod progress;
pub mod verifier;

pub use attack::{Attack, AttackOptions, AttackState, CancelToken, RunOutcome};
pub use candidates::{
    AttackStrategy, CandidatePlan, Candidates, NumericSpace, Wordlist, DEFAULT_NUMERIC_WIDTH,
    MAX_NUMERIC_WIDTH,
};
pub use encryption_info::{
    extract_encryption_params, extract_encryption_params_with_limits, parse_encryption_info_xml,
    EncryptionParams, ExtractLimits, DEFAULT_HASH_ALGORITHM, DEFAULT_SPIN_COUNT,
    ENCRYPTION_INFO_ENTRY,
};
pub use error::{ExtractionError, HostError, RecoveryError, VerificationFault};
pub use host::{HostCommand, HostConfig, HostEvent, RecoveryHost, StartRequest};
pub use progress::{estimate, ProgressSnapshot, ThroughputMeter};
pub use verifier::{derive_key, try_verify, verify, HashAlgorithm, Verifier, DERIVED_KEY_LEN};

/// Result of reading a container, before any attack is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Protection {
    /// No encryption metadata; there is nothing to recover.
    NotProtected,
    Protected(EncryptionParams),
}

/// Read a container file and classify it.
pub fn inspect_container(path: impl AsRef<std::path::Path>) -> Result<Protection, RecoveryError> {
    let bytes = std::fs::read(path)?;
    let protection = match extract_encryption_params(&bytes)? {
        Some(params) => Protection::Protected(params),
        None => Protection::NotProtected,
    };
    Ok(protection)
}
