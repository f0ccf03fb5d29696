//! Extraction of the generated image from the provider's archive response.

use crate::error::{truncate_for_diagnostics, GatewayError, Result};
use std::io::{Cursor, Read};
use zip::ZipArchive;

/// Name of the archive entry holding the generated image.
pub const IMAGE_ENTRY_NAME: &str = "image_0.png";

/// Local-file-header magic of the archive format.
const ARCHIVE_MAGIC: [u8; 2] = [0x50, 0x4B];

/// Smallest body that can possibly be an archive.
const MIN_ARCHIVE_LEN: usize = 4;

/// Checks length and signature without attempting to parse the archive.
pub fn validate_signature(bytes: &[u8]) -> Result<()> {
    if bytes.len() < MIN_ARCHIVE_LEN {
        return Err(GatewayError::ArchiveTooShort(bytes.len()));
    }
    if bytes[..2] != ARCHIVE_MAGIC {
        let preview = String::from_utf8_lossy(&bytes[..bytes.len().min(100)]);
        tracing::warn!(
            preview = %truncate_for_diagnostics(&preview),
            "provider response is not an archive"
        );
        return Err(GatewayError::NotAnArchive);
    }
    Ok(())
}

/// Extracts [`IMAGE_ENTRY_NAME`] from the archive bytes.
///
/// The first matching entry wins. An archive without that entry yields
/// [`GatewayError::MissingImage`].
pub fn extract_image(bytes: &[u8]) -> Result<Vec<u8>> {
    extract_entry(bytes, IMAGE_ENTRY_NAME)
}

/// Extracts the first entry named `entry_name`.
pub fn extract_entry(bytes: &[u8], entry_name: &str) -> Result<Vec<u8>> {
    validate_signature(bytes)?;

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| GatewayError::MalformedArchive(e.to_string()))?;
    tracing::debug!(entries = archive.len(), "archive opened");

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| GatewayError::MalformedArchive(format!("entry {}: {}", i, e)))?;
        if entry.name() != entry_name {
            continue;
        }

        let mut data = Vec::with_capacity((entry.size() as usize).min(bytes.len()));
        entry
            .read_to_end(&mut data)
            .map_err(|e| GatewayError::MalformedArchive(format!("{}: {}", entry_name, e)))?;
        tracing::debug!(entry = entry_name, size = data.len(), "image extracted");
        return Ok(data);
    }

    Err(GatewayError::MissingImage(entry_name.to_string()))
}
