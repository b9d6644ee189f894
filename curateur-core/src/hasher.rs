use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha1::Digest;

const CHUNK_SIZE: usize = 1024 * 1024; // 1 MiB

/// Content hash algorithm used for ROM identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Crc32,
    Md5,
    Sha1,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crc32 => "crc32",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity tuple computed from a ROM's primary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomIdentity {
    /// Byte length of the primary file.
    pub size: u64,
    /// Uppercase hex content hash, or `None` when the file exceeds the
    /// configured size cap (lookups then fall back to name + size).
    pub hash: Option<String>,
    /// Algorithm the hash was computed with.
    pub algorithm: HashAlgorithm,
}

/// Compute the identity of a primary file by streaming it in fixed-size
/// chunks. Files larger than `size_cap` bytes are not hashed; a cap of 0
/// disables hashing entirely.
///
/// Pure and reentrant: identical bytes always yield identical output.
pub fn compute_identity(
    path: &Path,
    algorithm: HashAlgorithm,
    size_cap: u64,
) -> std::io::Result<RomIdentity> {
    let size = path.metadata()?.len();

    if size_cap == 0 || size > size_cap {
        return Ok(RomIdentity {
            size,
            hash: None,
            algorithm,
        });
    }

    let mut file = File::open(path)?;
    let mut buf = vec![0u8; CHUNK_SIZE];

    let hash = match algorithm {
        HashAlgorithm::Crc32 => {
            let mut hasher = crc32fast::Hasher::new();
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            format!("{:08X}", hasher.finalize())
        }
        HashAlgorithm::Md5 => {
            let mut ctx = md5::Context::new();
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                ctx.consume(&buf[..n]);
            }
            format!("{:X}", ctx.compute())
        }
        HashAlgorithm::Sha1 => {
            let mut sha = sha1::Sha1::new();
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                sha.update(&buf[..n]);
            }
            format!("{:X}", sha.finalize())
        }
    };

    Ok(RomIdentity {
        size,
        hash: Some(hash),
        algorithm,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(data: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(data).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn crc32_check_value() {
        // CRC-32 of "123456789" is the standard check value CBF43926.
        let f = write_temp(b"123456789");
        let id = compute_identity(f.path(), HashAlgorithm::Crc32, u64::MAX).unwrap();
        assert_eq!(id.size, 9);
        assert_eq!(id.hash.as_deref(), Some("CBF43926"));
    }

    #[test]
    fn md5_known_vector() {
        let f = write_temp(b"abc");
        let id = compute_identity(f.path(), HashAlgorithm::Md5, u64::MAX).unwrap();
        assert_eq!(id.hash.as_deref(), Some("900150983CD24FB0D6963F7D28E17F72"));
    }

    #[test]
    fn sha1_known_vector() {
        let f = write_temp(b"abc");
        let id = compute_identity(f.path(), HashAlgorithm::Sha1, u64::MAX).unwrap();
        assert_eq!(
            id.hash.as_deref(),
            Some("A9993E364706816ABA3E25717850C26C9CD0D89D")
        );
    }

    #[test]
    fn cap_boundary() {
        let f = write_temp(b"0123456789");
        // Cap exactly at file size: hash computed.
        let at = compute_identity(f.path(), HashAlgorithm::Crc32, 10).unwrap();
        assert!(at.hash.is_some());
        // Cap one byte below: hash skipped, size still reported.
        let below = compute_identity(f.path(), HashAlgorithm::Crc32, 9).unwrap();
        assert!(below.hash.is_none());
        assert_eq!(below.size, 10);
    }

    #[test]
    fn zero_cap_disables_hashing() {
        let f = write_temp(b"xy");
        let id = compute_identity(f.path(), HashAlgorithm::Crc32, 0).unwrap();
        assert!(id.hash.is_none());
    }

    #[test]
    fn identity_is_deterministic() {
        let f = write_temp(b"deterministic payload");
        let a = compute_identity(f.path(), HashAlgorithm::Sha1, u64::MAX).unwrap();
        let b = compute_identity(f.path(), HashAlgorithm::Sha1, u64::MAX).unwrap();
        assert_eq!(a, b);
    }
}
