use thiserror::Error;

/// Errors that end a recovery attempt before any candidate is tested.
///
/// "Not protected", "cancelled" and "no match" are *not* errors; they are reported through
/// `Ok(None)` from the extractor and through [`crate::RunOutcome`] respectively.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("cannot extract encryption parameters: {0}")]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The container could not be read, or its `EncryptionInfo` entry is malformed.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("container is not a readable ZIP archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("failed to read `{entry}`: {source}")]
    Read {
        entry: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{entry}` is too large ({size} bytes, max {max})")]
    EntryTooLarge { entry: String, size: u64, max: u64 },
    #[error("`{entry}` is not valid UTF-8")]
    InvalidUtf8 { entry: String },
    #[error("invalid EncryptionInfo XML: {0}")]
    Xml(String),
    #[error("missing <keyData> element")]
    MissingKeyData,
    #[error("invalid base64 in keyData.{attribute}")]
    InvalidBase64 { attribute: &'static str },
    #[error("invalid keyData.spinCount `{value}`")]
    InvalidSpinCount { value: String },
}

/// A single candidate could not be checked. Always treated as a non-match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationFault {
    #[error("unsupported hash algorithm `{0}`")]
    UnsupportedAlgorithm(String),
    #[error("iteration count must be at least 1")]
    ZeroIterations,
    #[error("PBKDF2 failed: {0}")]
    Kdf(String),
}

/// Failures of the execution host itself (not of a run).
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to spawn recovery worker: {0}")]
    Spawn(#[source] std::io::Error),
}
