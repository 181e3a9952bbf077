//! SPIR-V shader loading.
//!
//! Shaders are consumed as pre-compiled SPIR-V blobs. Loading validates the
//! word alignment and magic number so a truncated or misnamed file fails
//! here rather than deep inside pipeline creation.

use crate::error::{GpuError, Result};
use std::path::Path;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Convert raw bytes to SPIR-V words, validating alignment and magic.
pub fn bytes_to_spirv(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.is_empty() {
        return Err(GpuError::ShaderLoad("Empty shader data".to_string()));
    }
    if bytes.len() % 4 != 0 {
        return Err(GpuError::ShaderLoad(format!(
            "Shader size {} is not a multiple of 4",
            bytes.len()
        )));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words[0] != SPIRV_MAGIC {
        return Err(GpuError::ShaderLoad(format!(
            "Invalid SPIR-V magic number: {:#010x}",
            words[0]
        )));
    }

    Ok(words)
}

/// Load a SPIR-V shader from a file.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| GpuError::ShaderLoad(format!("{}: {e}", path.display())))?;
    bytes_to_spirv(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_spirv_header() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&SPIRV_MAGIC.to_le_bytes());
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());
        let words = bytes_to_spirv(&bytes).unwrap();
        assert_eq!(words[0], SPIRV_MAGIC);
        assert_eq!(words.len(), 2);
    }

    #[test]
    fn rejects_unaligned_data() {
        let bytes = [0x03, 0x02, 0x23];
        assert!(bytes_to_spirv(&bytes).is_err());
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = 0xdead_beefu32.to_le_bytes();
        assert!(bytes_to_spirv(&bytes).is_err());
    }

    #[test]
    fn rejects_empty_data() {
        assert!(bytes_to_spirv(&[]).is_err());
    }
}
