use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::models::error::AudioError;

/// Compute the SHA-256 hex digest of a file, streaming it in 64 KiB reads.
pub fn sha256_file(path: &Path) -> Result<String, AudioError> {
    let file = File::open(path)
        .map_err(|e| AudioError::FileAccess(format!("failed to open {} for checksum: {}", path.display(), e)))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; 64 * 1024];

    loop {
        let n = reader
            .read(&mut chunk)
            .map_err(|e| AudioError::FileAccess(format!("failed to read file for checksum: {}", e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }

    Ok(hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
