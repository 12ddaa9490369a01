use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::domain::Accession;
use crate::error::ResolverError;
use crate::store::COMPLETION_MARKER;

const ANNOTATION_EXTENSIONS: [&str; 2] = [".gbk", ".json"];
const KNOWNCLUSTERBLAST: &str = "knownclusterblast";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extraction {
    AlreadyComplete,
    Extracted { entries: usize },
}

/// Pulls the annotation files and the knownclusterblast tree out of an
/// antiSMASH archive. Older archives nest everything under `<accession>/`,
/// newer ones do not, so both prefixes are accepted.
pub struct ArchiveExtractor {
    accession: Accession,
}

impl ArchiveExtractor {
    pub fn new(accession: Accession) -> Self {
        Self { accession }
    }

    pub fn wants(&self, entry_name: &str) -> bool {
        if ANNOTATION_EXTENSIONS
            .iter()
            .any(|ext| entry_name.ends_with(ext))
        {
            return true;
        }
        let nested = format!("{}/{KNOWNCLUSTERBLAST}", self.accession);
        entry_name.starts_with(&nested) || entry_name.starts_with(KNOWNCLUSTERBLAST)
    }

    pub fn extract(&self, archive_path: &Path, output_dir: &Path) -> Result<Extraction, ResolverError> {
        let marker = output_dir.join(COMPLETION_MARKER);
        if marker.exists() {
            debug!(output = %output_dir.display(), "extraction already completed");
            return Ok(Extraction::AlreadyComplete);
        }

        let file = fs::File::open(archive_path).map_err(|err| {
            ResolverError::Extraction(format!("open zip {}: {err}", archive_path.display()))
        })?;
        let mut archive =
            ZipArchive::new(file).map_err(|err| ResolverError::Extraction(err.to_string()))?;
        fs::create_dir_all(output_dir).map_err(ResolverError::fs)?;

        let mut entries = 0usize;
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|err| ResolverError::Extraction(err.to_string()))?;
            if !self.wants(entry.name()) {
                continue;
            }
            let entry_path = match entry.enclosed_name() {
                Some(path) => output_dir.join(path),
                None => {
                    return Err(ResolverError::Extraction(format!(
                        "zip entry path traversal detected: {}",
                        entry.name()
                    )));
                }
            };

            if entry.is_dir() {
                fs::create_dir_all(&entry_path).map_err(ResolverError::fs)?;
                continue;
            }

            if let Some(parent) = entry_path.parent() {
                fs::create_dir_all(parent).map_err(ResolverError::fs)?;
            }
            let mut outfile = fs::File::create(&entry_path).map_err(ResolverError::fs)?;
            io::copy(&mut entry, &mut outfile)
                .map_err(|err| ResolverError::Extraction(err.to_string()))?;
            entries += 1;
        }

        fs::File::create(&marker).map_err(ResolverError::fs)?;
        debug!(output = %output_dir.display(), entries, "extraction finished");
        Ok(Extraction::Extracted { entries })
    }
}
