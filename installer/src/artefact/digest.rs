//! Content digests declared for release archives.
//!
//! The release feed publishes MD5 digests (`mdhash`); locally supplied
//! archives may be checked against either MD5 or SHA-256. A
//! [`PackageDigest`] pairs the algorithm with a validated lowercase hex
//! value so comparisons are always like-for-like.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Hash algorithm of a declared digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    /// MD5, as published by the release feed.
    Md5,
    /// SHA-256.
    Sha256,
}

impl DigestAlgorithm {
    /// Expected length of the hex-encoded digest.
    #[must_use]
    pub const fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "MD5"),
            Self::Sha256 => write!(f, "SHA-256"),
        }
    }
}

/// A digest value failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {algorithm} digest: {reason}")]
pub struct DigestError {
    /// Algorithm the value was declared for.
    pub algorithm: DigestAlgorithm,
    /// Description of the validation failure.
    pub reason: String,
}

/// A validated, lowercase hex digest together with its algorithm.
///
/// # Examples
///
/// ```
/// use backdrop_installer::artefact::digest::{DigestAlgorithm, PackageDigest};
///
/// let digest = PackageDigest::parse(DigestAlgorithm::Md5, "D41D8CD98F00B204E9800998ECF8427E")
///     .expect("valid MD5");
/// assert_eq!(digest.hex(), "d41d8cd98f00b204e9800998ecf8427e");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageDigest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl PackageDigest {
    /// Validate `value` as a hex digest for `algorithm`.
    ///
    /// Surrounding whitespace is ignored and upper-case hex is normalised.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError`] when the length is wrong or a character is
    /// not hexadecimal.
    pub fn parse(algorithm: DigestAlgorithm, value: &str) -> Result<Self, DigestError> {
        let trimmed = value.trim();
        if trimmed.len() != algorithm.hex_len() {
            return Err(DigestError {
                algorithm,
                reason: format!(
                    "expected {} hex characters, got {}",
                    algorithm.hex_len(),
                    trimmed.len()
                ),
            });
        }
        if let Some(bad) = trimmed.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(DigestError {
                algorithm,
                reason: format!("non-hex character '{bad}'"),
            });
        }
        Ok(Self {
            algorithm,
            hex: trimmed.to_ascii_lowercase(),
        })
    }

    /// Digest algorithm.
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Lowercase hex value.
    #[must_use]
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for PackageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Compute the `algorithm` digest of the file at `path`.
///
/// # Errors
///
/// Returns the I/O error when the file cannot be read.
pub fn compute_digest(path: &Path, algorithm: DigestAlgorithm) -> std::io::Result<PackageDigest> {
    let hex = match algorithm {
        DigestAlgorithm::Md5 => hash_file::<Md5>(path)?,
        DigestAlgorithm::Sha256 => hash_file::<Sha256>(path)?,
    };
    Ok(PackageDigest { algorithm, hex })
}

fn hash_file<D: Digest>(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = D::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(buffer.get(..bytes_read).unwrap_or_default());
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect())
}
