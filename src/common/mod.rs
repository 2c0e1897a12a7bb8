use std::{fs::File, io::Read, path::Path};

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

pub mod polygon;

/// Error unless the file already exists.
pub fn require_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("File does not exist: {}", path.display());
    }
    if !path.is_file() {
        bail!("Path exists but is not a file: {}", path.display());
    }
    Ok(())
}

/// Computes the SHA-256 digest of the remainder of an open file,
/// starting at the current position, without loading it all at once.
pub fn sha256_remainder(file: &mut File) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1 << 16];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().into())
}
