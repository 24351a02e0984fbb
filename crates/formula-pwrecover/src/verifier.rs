//! Candidate verification.
//!
//! A candidate matches when
//!
//! `PBKDF2-HMAC-<hashAlgorithm>(password_utf8, salt, spinCount, 32 bytes) == hashValue`
//!
//! The derivation is the only CPU-heavy step of a run; everything else is bookkeeping.

use hmac::Hmac;
use pbkdf2::pbkdf2;
use subtle::ConstantTimeEq as _;
use zeroize::Zeroizing;

use crate::error::VerificationFault;
use crate::EncryptionParams;

/// Length of the derived verification key (256 bits).
pub const DERIVED_KEY_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Resolve a stored algorithm name (`SHA512`, `sha-512`, ...).
    pub fn from_name(name: &str) -> Result<Self, VerificationFault> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SHA1" | "SHA-1" => Ok(HashAlgorithm::Sha1),
            "SHA256" | "SHA-256" => Ok(HashAlgorithm::Sha256),
            "SHA384" | "SHA-384" => Ok(HashAlgorithm::Sha384),
            "SHA512" | "SHA-512" => Ok(HashAlgorithm::Sha512),
            _ => Err(VerificationFault::UnsupportedAlgorithm(name.to_string())),
        }
    }
}

/// Derive the 32-byte PBKDF2 key for `password`.
pub fn derive_key(
    password: &str,
    salt: &[u8],
    spin_count: u32,
    hash_alg: HashAlgorithm,
) -> Result<Zeroizing<[u8; DERIVED_KEY_LEN]>, VerificationFault> {
    if spin_count == 0 {
        return Err(VerificationFault::ZeroIterations);
    }

    let mut out = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    let password = password.as_bytes();
    let result = match hash_alg {
        HashAlgorithm::Sha1 => pbkdf2::<Hmac<sha1::Sha1>>(password, salt, spin_count, &mut out[..]),
        HashAlgorithm::Sha256 => {
            pbkdf2::<Hmac<sha2::Sha256>>(password, salt, spin_count, &mut out[..])
        }
        HashAlgorithm::Sha384 => {
            pbkdf2::<Hmac<sha2::Sha384>>(password, salt, spin_count, &mut out[..])
        }
        HashAlgorithm::Sha512 => {
            pbkdf2::<Hmac<sha2::Sha512>>(password, salt, spin_count, &mut out[..])
        }
    };
    result.map_err(|err| VerificationFault::Kdf(err.to_string()))?;
    Ok(out)
}

/// Check one candidate. Faults are reported, not swallowed.
pub fn try_verify(candidate: &str, params: &EncryptionParams) -> Result<bool, VerificationFault> {
    let hash_alg = HashAlgorithm::from_name(&params.hash_algorithm)?;
    let derived = derive_key(candidate, &params.salt, params.spin_count, hash_alg)?;
    Ok(ct_eq(&derived[..], &params.fingerprint))
}

/// Check one candidate. Any fault counts as a non-match.
pub fn verify(candidate: &str, params: &EncryptionParams) -> bool {
    match try_verify(candidate, params) {
        Ok(matched) => matched,
        Err(fault) => {
            log::trace!("candidate rejected after verification fault: {fault}");
            false
        }
    }
}

/// Per-run verifier that resolves the hash algorithm once.
#[derive(Debug, Clone)]
pub struct Verifier {
    params: EncryptionParams,
    hash_alg: Result<HashAlgorithm, VerificationFault>,
}

impl Verifier {
    pub fn new(params: EncryptionParams) -> Self {
        let hash_alg = HashAlgorithm::from_name(&params.hash_algorithm);
        if let Err(fault) = &hash_alg {
            log::warn!("{fault}; no candidate can match");
        }
        Self { params, hash_alg }
    }

    pub fn params(&self) -> &EncryptionParams {
        &self.params
    }

    pub fn try_verify(&self, candidate: &str) -> Result<bool, VerificationFault> {
        let hash_alg = self.hash_alg.clone()?;
        let derived = derive_key(candidate, &self.params.salt, self.params.spin_count, hash_alg)?;
        Ok(ct_eq(&derived[..], &self.params.fingerprint))
    }

    pub fn verify(&self, candidate: &str) -> bool {
        match self.try_verify(candidate) {
            Ok(matched) => matched,
            Err(fault) => {
                log::trace!("candidate rejected after verification fault: {fault}");
                false
            }
        }
    }
}

/// Constant-time equality; slices of different length never match.
fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}
