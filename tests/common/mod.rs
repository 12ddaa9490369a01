#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use kira_genome_resolver::error::ResolverError;
use kira_genome_resolver::remote::{AgentProfile, RemoteClient};
use kira_genome_resolver::store::ArchiveCacheStore;

/// Serves canned pages and archive bodies by exact URL. Unknown URLs answer 404.
#[derive(Default)]
pub struct MockRemote {
    pages: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    statuses: HashMap<String, u16>,
    pub page_calls: Mutex<Vec<(String, AgentProfile)>>,
    pub download_calls: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn with_file(mut self, url: impl Into<String>, body: Vec<u8>) -> Self {
        self.files.insert(url.into(), body);
        self
    }

    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.statuses.insert(url.into(), status);
        self
    }

    pub fn page_count(&self) -> usize {
        self.page_calls.lock().unwrap().len()
    }

    pub fn download_count(&self) -> usize {
        self.download_calls.lock().unwrap().len()
    }

    pub fn total_calls(&self) -> usize {
        self.page_count() + self.download_count()
    }

    fn status_error(&self, url: &str) -> Option<ResolverError> {
        self.statuses.get(url).map(|status| ResolverError::Status {
            status: *status,
            url: url.to_string(),
        })
    }
}

impl RemoteClient for MockRemote {
    fn fetch_page(&self, url: &str, agent: AgentProfile) -> Result<String, ResolverError> {
        self.page_calls
            .lock()
            .unwrap()
            .push((url.to_string(), agent));
        if let Some(err) = self.status_error(url) {
            return Err(err);
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ResolverError::NotFound(url.to_string()))
    }

    fn download(&self, url: &str, destination: &Path) -> Result<u64, ResolverError> {
        self.download_calls.lock().unwrap().push(url.to_string());
        if let Some(err) = self.status_error(url) {
            return Err(err);
        }
        let body = self
            .files
            .get(url)
            .ok_or_else(|| ResolverError::NotFound(url.to_string()))?;
        fs::write(destination, body).map_err(ResolverError::fs)?;
        Ok(body.len() as u64)
    }
}

pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn antismash_archive(accession: &str) -> Vec<u8> {
    let gbk = format!("{accession}.gbk");
    let json = format!("{accession}.json");
    zip_bytes(&[
        (gbk.as_str(), b"LOCUS".as_slice()),
        (json.as_str(), b"{}".as_slice()),
        ("index.html", b"<html></html>".as_slice()),
        ("knownclusterblast/region1.txt", b"hits".as_slice()),
    ])
}

pub fn docsum_page(gi: &str) -> String {
    format!(
        r#"<div class="rprt"><dl class="rprtid"><dt>Accession: </dt><dd>X</dd>
        <dt>GI: </dt> <dd>{gi}</dd></dl></div>"#
    )
}

pub fn assembly_page(accession: &str) -> String {
    format!(r#"<div><p class="title"><a href="/assembly/{accession}/">ASM</a></p></div>"#)
}

pub fn jgi_page(genbank: &str) -> String {
    format!(
        r#"<table><tr><td><a href="https://www.ncbi.nlm.nih.gov/nuccore/{genbank}">{genbank}</a></td></tr></table>"#
    )
}

pub fn catalog_page(href: &str) -> String {
    format!(r#"<a href="index.html">overview</a> <a href="{href}">Download all results</a>"#)
}

pub fn temp_store(temp: &TempDir) -> ArchiveCacheStore {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    ArchiveCacheStore::for_dataset(&root, "MSV000079284")
}
