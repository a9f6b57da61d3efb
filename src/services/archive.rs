use std::io::{Cursor, Write};

use base64::Engine;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::models::job::JobOutput;

#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("zip write failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("zip write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("thumbnail is not valid base64: {0}")]
    Thumbnail(#[from] base64::DecodeError),
}

/// Entries for one job's artifact bundle. `folder` prefixes every entry
/// name, used by the all-completed archive to keep one directory per video
/// code. The thumbnail entry is present only when one was produced.
pub fn bundle_entries(
    video_code: &str,
    output: &JobOutput,
    folder: Option<&str>,
) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let prefix = folder.map(|f| format!("{f}/")).unwrap_or_default();
    let mut entries = vec![
        ArchiveEntry {
            name: format!("{prefix}{video_code}-content.txt"),
            bytes: output.content.clone().into_bytes(),
        },
        ArchiveEntry {
            name: format!("{prefix}{video_code}-seo.txt"),
            bytes: output.seo.clone().into_bytes(),
        },
        ArchiveEntry {
            name: format!("{prefix}{video_code}-prom_video.txt"),
            bytes: output.video_prompt.clone().into_bytes(),
        },
    ];
    if !output.thumbnail.is_empty() {
        entries.push(ArchiveEntry {
            name: format!("{prefix}{video_code}-thumbnail.jpg"),
            bytes: base64::engine::general_purpose::STANDARD.decode(&output.thumbnail)?,
        });
    }
    Ok(entries)
}

/// Assemble entries into an in-memory zip archive.
pub fn build_zip(entries: &[ArchiveEntry]) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for entry in entries {
        writer.start_file(entry.name.as_str(), options)?;
        writer.write_all(&entry.bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}
