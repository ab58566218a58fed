//! Digest helpers for source fingerprints and record sharding

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Compute the hex SHA-256 digest of a file
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    sha256_reader(&mut file)
}

/// Compute the hex SHA-256 digest of any readable source
pub fn sha256_reader<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Raw 128-bit MD5 digest of a byte slice
pub fn md5_digest(data: &[u8]) -> [u8; 16] {
    md5::compute(data).0
}

/// Map a key onto one of 256 shards.
///
/// The last four bytes of the MD5 digest are read as a big-endian `i32`; the
/// shard is its absolute value modulo 256. `i32::MIN` has no positive
/// counterpart and maps to shard 0.
pub fn shard_of(key: &[u8]) -> u8 {
    let digest = md5_digest(key);
    let tail = [digest[12], digest[13], digest[14], digest[15]];
    let value = i32::from_be_bytes(tail);
    (value.unsigned_abs() % 256) as u8
}
