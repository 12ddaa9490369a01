use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::domain::Accession;
use crate::error::ResolverError;

pub const LEDGER_FILE: &str = "genome_status.txt";
pub const JOURNAL_FILE: &str = "genome_status.journal";
pub const COMPLETION_MARKER: &str = "completed";

/// On-disk layout of one dataset plus the archive integrity rules.
///
/// ```text
/// <download_root>/genome_status.txt
/// <download_root>/genome_status.journal
/// <download_root>/<accession>.zip
/// <extract_root>/antismash/<accession>/completed
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveCacheStore {
    download_root: Utf8PathBuf,
    extract_root: Utf8PathBuf,
}

impl ArchiveCacheStore {
    pub fn for_dataset(cache_root: &Utf8Path, dataset: &str) -> Self {
        Self {
            download_root: cache_root.join("downloads").join(dataset),
            extract_root: cache_root.join("extracted").join(dataset),
        }
    }

    pub fn new_with_paths(download_root: Utf8PathBuf, extract_root: Utf8PathBuf) -> Self {
        Self {
            download_root,
            extract_root,
        }
    }

    pub fn download_root(&self) -> &Utf8Path {
        &self.download_root
    }

    pub fn extract_root(&self) -> &Utf8Path {
        &self.extract_root
    }

    pub fn archive_path(&self, accession: &Accession) -> Utf8PathBuf {
        self.download_root.join(format!("{accession}.zip"))
    }

    pub fn extraction_dir(&self, accession: &Accession) -> Utf8PathBuf {
        self.extract_root.join("antismash").join(accession.as_str())
    }

    pub fn ledger_path(&self) -> Utf8PathBuf {
        self.download_root.join(LEDGER_FILE)
    }

    pub fn journal_path(&self) -> Utf8PathBuf {
        self.download_root.join(JOURNAL_FILE)
    }

    pub fn ensure_roots(&self) -> Result<(), ResolverError> {
        fs::create_dir_all(self.download_root.as_std_path()).map_err(ResolverError::fs)?;
        fs::create_dir_all(self.extract_root.as_std_path()).map_err(ResolverError::fs)
    }

    /// True when `path` holds an archive whose central directory opens.
    /// A file that exists but does not open is deleted.
    pub fn validate_or_evict(path: &Utf8Path) -> Result<bool, ResolverError> {
        if !path.as_std_path().is_file() {
            return Ok(false);
        }
        match check_archive(path.as_std_path()) {
            Ok(()) => Ok(true),
            Err(err) => {
                info!(path = %path, error = %err, "invalid archive found, will download again");
                fs::remove_file(path.as_std_path()).map_err(ResolverError::fs)?;
                Ok(false)
            }
        }
    }

    /// Runs `fill` against a staging file next to `destination`, then moves the
    /// result into place only if it opens as an archive.
    pub fn write_verified<F>(&self, destination: &Utf8Path, fill: F) -> Result<u64, ResolverError>
    where
        F: FnOnce(&Path) -> Result<u64, ResolverError>,
    {
        let parent = destination
            .parent()
            .ok_or_else(|| ResolverError::fs("invalid destination path"))?;
        fs::create_dir_all(parent.as_std_path()).map_err(ResolverError::fs)?;
        let staging = tempfile::Builder::new()
            .prefix("kira-gr-download")
            .suffix(".part")
            .tempfile_in(parent.as_std_path())
            .map_err(ResolverError::fs)?;

        let written = fill(staging.path())?;
        check_archive(staging.path())?;
        debug!(destination = %destination, bytes = written, "archive verified");

        staging
            .persist(destination.as_std_path())
            .map_err(|err| ResolverError::fs(err.error))?;
        Ok(written)
    }
}

pub fn check_archive(path: &Path) -> Result<(), ResolverError> {
    let integrity = |reason: String| ResolverError::Integrity {
        path: path.display().to_string(),
        reason,
    };
    let file = fs::File::open(path).map_err(|err| integrity(err.to_string()))?;
    ZipArchive::new(file).map_err(|err| integrity(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;

    fn tiny_zip(path: &Path) {
        let file = fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file("a.gbk", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"LOCUS").unwrap();
        writer.finish().unwrap();
    }

    fn store() -> (tempfile::TempDir, ArchiveCacheStore) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = ArchiveCacheStore::for_dataset(&root, "MSV000078836");
        store.ensure_roots().unwrap();
        (temp, store)
    }

    #[test]
    fn layout_paths() {
        let (_temp, store) = store();
        let acc: Accession = "GCF_000203835.1".parse().unwrap();
        assert!(
            store
                .archive_path(&acc)
                .ends_with("downloads/MSV000078836/GCF_000203835.1.zip")
        );
        assert!(
            store
                .extraction_dir(&acc)
                .ends_with("extracted/MSV000078836/antismash/GCF_000203835.1")
        );
        assert!(store.ledger_path().ends_with("genome_status.txt"));
    }

    #[test]
    fn malformed_archive_is_evicted() {
        let (_temp, store) = store();
        let acc: Accession = "GCF_1".parse().unwrap();
        let path = store.archive_path(&acc);
        fs::write(path.as_std_path(), b"<html>not a zip</html>").unwrap();
        assert!(!ArchiveCacheStore::validate_or_evict(&path).unwrap());
        assert!(!path.as_std_path().exists());

        tiny_zip(path.as_std_path());
        assert!(ArchiveCacheStore::validate_or_evict(&path).unwrap());
    }

    #[test]
    fn write_verified_rejects_garbage() {
        let (_temp, store) = store();
        let acc: Accession = "GCF_2".parse().unwrap();
        let dest = store.archive_path(&acc);

        let err = store
            .write_verified(&dest, |staging| {
                fs::write(staging, b"garbage").unwrap();
                Ok(7)
            })
            .unwrap_err();
        assert_matches!(err, ResolverError::Integrity { .. });
        assert!(!dest.as_std_path().exists());

        let written = store
            .write_verified(&dest, |staging| {
                tiny_zip(staging);
                Ok(fs::metadata(staging).unwrap().len())
            })
            .unwrap();
        assert!(written > 0);
        assert!(ArchiveCacheStore::validate_or_evict(&dest).unwrap());
    }
}
