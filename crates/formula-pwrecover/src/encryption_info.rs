//! Extraction of the password-verification parameters from a container.
//!
//! The container is a ZIP package carrying an `EncryptionInfo` entry whose XML holds a single
//! `keyData` element:
//!
//! ```xml
//! <encryption>
//!   <keyData spinCount="100000" saltValue="..." hashValue="..." hashAlgorithm="SHA512"/>
//! </encryption>
//! ```
//!
//! `saltValue` and `hashValue` are base64. A container without the entry is simply not
//! protected; a container whose entry cannot be parsed is an error.

use std::io::{Cursor, Read, Seek};

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader as XmlReader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::ExtractionError;

/// Name of the archive entry holding the key-derivation parameters.
pub const ENCRYPTION_INFO_ENTRY: &str = "EncryptionInfo";

/// Iteration count used when `keyData` omits `spinCount`.
pub const DEFAULT_SPIN_COUNT: u32 = 100_000;
/// Hash algorithm used when `keyData` omits `hashAlgorithm`.
pub const DEFAULT_HASH_ALGORITHM: &str = "SHA512";

/// Default cap on the inflated size of the `EncryptionInfo` entry.
const DEFAULT_MAX_ENCRYPTION_INFO_BYTES: u64 = 1024 * 1024; // 1MiB

/// Parameters needed to check a candidate password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionParams {
    /// PBKDF2 iteration count. Always at least 1.
    pub spin_count: u32,
    pub salt: Vec<u8>,
    /// Expected PBKDF2 output for the correct password.
    pub fingerprint: Vec<u8>,
    /// Hash algorithm name exactly as stored (e.g. `SHA512`).
    pub hash_algorithm: String,
}

/// Guardrails applied while reading the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    /// Maximum inflated size of the `EncryptionInfo` entry.
    pub max_encryption_info_bytes: u64,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_encryption_info_bytes: DEFAULT_MAX_ENCRYPTION_INFO_BYTES,
        }
    }
}

/// Extract the verification parameters from raw container bytes.
///
/// Returns `Ok(None)` when the container is not password-protected: either it has no
/// `EncryptionInfo` entry, or the `keyData` element carries no salt/fingerprint.
pub fn extract_encryption_params(
    bytes: &[u8],
) -> Result<Option<EncryptionParams>, ExtractionError> {
    extract_encryption_params_with_limits(bytes, &ExtractLimits::default())
}

/// Like [`extract_encryption_params`], with explicit limits.
pub fn extract_encryption_params_with_limits(
    bytes: &[u8],
    limits: &ExtractLimits,
) -> Result<Option<EncryptionParams>, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let Some(raw) = read_entry_optional(
        &mut archive,
        ENCRYPTION_INFO_ENTRY,
        limits.max_encryption_info_bytes,
    )?
    else {
        log::debug!("no `{ENCRYPTION_INFO_ENTRY}` entry; container is not protected");
        return Ok(None);
    };

    let xml = String::from_utf8(raw).map_err(|_| ExtractionError::InvalidUtf8 {
        entry: ENCRYPTION_INFO_ENTRY.to_string(),
    })?;
    parse_encryption_info_xml(&xml)
}

/// Parse the text of an `EncryptionInfo` entry.
pub fn parse_encryption_info_xml(xml: &str) -> Result<Option<EncryptionParams>, ExtractionError> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        let event = reader
            .read_event()
            .map_err(|err| ExtractionError::Xml(err.to_string()))?;
        match event {
            XmlEvent::Start(e) | XmlEvent::Empty(e) if e.local_name().as_ref() == b"keyData" => {
                return parse_key_data(&e);
            }
            XmlEvent::Eof => return Err(ExtractionError::MissingKeyData),
            _ => {}
        }
    }
}

fn parse_key_data(e: &BytesStart<'_>) -> Result<Option<EncryptionParams>, ExtractionError> {
    let mut spin_count: Option<u32> = None;
    let mut salt = Vec::new();
    let mut fingerprint = Vec::new();
    let mut hash_algorithm: Option<String> = None;

    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|err| ExtractionError::Xml(err.to_string()))?;
        let value = attr.value.as_ref();
        match local_name(attr.key.as_ref()) {
            b"spinCount" => spin_count = Some(parse_spin_count(value)?),
            b"saltValue" => salt = decode_base64(value, "saltValue")?,
            b"hashValue" => fingerprint = decode_base64(value, "hashValue")?,
            b"hashAlgorithm" => {
                let name = String::from_utf8_lossy(value).trim().to_string();
                if !name.is_empty() {
                    hash_algorithm = Some(name);
                }
            }
            _ => {}
        }
    }

    if salt.is_empty() || fingerprint.is_empty() {
        log::debug!("keyData has no salt or fingerprint; container is not protected");
        return Ok(None);
    }

    let params = EncryptionParams {
        spin_count: spin_count.unwrap_or(DEFAULT_SPIN_COUNT),
        salt,
        fingerprint,
        hash_algorithm: hash_algorithm.unwrap_or_else(|| DEFAULT_HASH_ALGORITHM.to_string()),
    };
    log::debug!(
        "extracted keyData: spinCount={} hashAlgorithm={} salt={}B fingerprint={}B",
        params.spin_count,
        params.hash_algorithm,
        params.salt.len(),
        params.fingerprint.len()
    );
    Ok(Some(params))
}

fn parse_spin_count(value: &[u8]) -> Result<u32, ExtractionError> {
    let text = String::from_utf8_lossy(value);
    match text.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ExtractionError::InvalidSpinCount {
            value: text.into_owned(),
        }),
    }
}

fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|b| *b == b':')
        .map(|idx| &name[idx + 1..])
        .unwrap_or(name)
}

fn decode_base64(value: &[u8], attribute: &'static str) -> Result<Vec<u8>, ExtractionError> {
    // Pretty-printed XML may wrap long base64 values, and some producers drop `=` padding.
    let cleaned: Vec<u8> = value
        .iter()
        .copied()
        .filter(|b| !matches!(b, b'\r' | b'\n' | b'\t' | b' '))
        .collect();
    STANDARD
        .decode(&cleaned)
        .or_else(|_| STANDARD_NO_PAD.decode(&cleaned))
        .map_err(|_| ExtractionError::InvalidBase64 { attribute })
}

/// Find an entry by name, tolerating a leading separator and ASCII case differences.
fn find_entry<R: Read + Seek>(archive: &ZipArchive<R>, name: &str) -> Option<usize> {
    fn normalize(entry: &str) -> &str {
        entry.trim_start_matches(['/', '\\'])
    }

    let mut fallback = None;
    for (idx, entry) in archive.file_names().enumerate() {
        if entry == name {
            return Some(idx);
        }
        if fallback.is_none() && normalize(entry).eq_ignore_ascii_case(name) {
            fallback = Some(idx);
        }
    }
    fallback
}

fn read_entry_optional<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    max_bytes: u64,
) -> Result<Option<Vec<u8>>, ExtractionError> {
    let Some(idx) = find_entry(archive, name) else {
        return Ok(None);
    };
    let file = match archive.by_index(idx) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if file.is_dir() {
        return Ok(None);
    }

    let declared = file.size();
    if declared > max_bytes {
        return Err(ExtractionError::EntryTooLarge {
            entry: name.to_string(),
            size: declared,
            max: max_bytes,
        });
    }

    // Don't trust the declared size alone: read at most one byte past the limit.
    let mut buf = Vec::new();
    file.take(max_bytes.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|source| ExtractionError::Read {
            entry: name.to_string(),
            source,
        })?;
    if buf.len() as u64 > max_bytes {
        return Err(ExtractionError::EntryTooLarge {
            entry: name.to_string(),
            size: buf.len() as u64,
            max: max_bytes,
        });
    }
    Ok(Some(buf))
}
