use std::fmt;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::ResolverError;

pub const DEFAULT_CONFIG_FILE: &str = "kira-gr.json";

/// Browser-like agent; the JGI portal answers 403 to anything else.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:86.0) Gecko/20100101 Firefox/86.0";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub cache_root: Option<Utf8PathBuf>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub force_reresolve: bool,
}

/// URL templates. Placeholders: `{id}` for lookups, `{accession}` and `{filename}` for catalogs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Endpoints {
    #[serde(default = "default_genbank_lookup")]
    pub genbank_lookup: String,
    #[serde(default = "default_assembly_lookup")]
    pub assembly_lookup: String,
    #[serde(default = "default_jgi_lookup")]
    pub jgi_lookup: String,
    #[serde(default = "default_catalogs")]
    pub catalogs: Vec<CatalogEndpoint>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CatalogEndpoint {
    pub name: String,
    pub page: String,
    pub download: String,
}

impl CatalogEndpoint {
    pub fn page_url(&self, accession: &str) -> String {
        self.page.replace("{accession}", accession)
    }

    pub fn download_url(&self, accession: &str, filename: &str) -> String {
        self.download
            .replace("{accession}", accession)
            .replace("{filename}", filename)
    }
}

impl fmt::Display for CatalogEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Endpoints {
    pub fn genbank_url(&self, id: &str) -> String {
        self.genbank_lookup.replace("{id}", id)
    }

    pub fn assembly_url(&self, gi: &str) -> String {
        self.assembly_lookup.replace("{id}", gi)
    }

    pub fn jgi_url(&self, id: &str) -> String {
        self.jgi_lookup.replace("{id}", id)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            genbank_lookup: default_genbank_lookup(),
            assembly_lookup: default_assembly_lookup(),
            jgi_lookup: default_jgi_lookup(),
            catalogs: default_catalogs(),
        }
    }
}

fn default_genbank_lookup() -> String {
    "https://www.ncbi.nlm.nih.gov/nuccore/{id}?report=docsum".to_string()
}

fn default_assembly_lookup() -> String {
    "https://www.ncbi.nlm.nih.gov/assembly?LinkName=nuccore_assembly&from_uid={id}".to_string()
}

fn default_jgi_lookup() -> String {
    "https://img.jgi.doe.gov/cgi-bin/m/main.cgi?section=TaxonDetail&page=taxonDetail&taxon_oid={id}"
        .to_string()
}

fn default_catalogs() -> Vec<CatalogEndpoint> {
    vec![
        CatalogEndpoint {
            name: "antismash-db".to_string(),
            page: "https://antismash-db.secondarymetabolites.org/output/{accession}/".to_string(),
            download: "https://antismash-db.secondarymetabolites.org/output/{accession}/{filename}"
                .to_string(),
        },
        CatalogEndpoint {
            name: "antismash-dbv2".to_string(),
            page: "https://antismash-dbv2.secondarymetabolites.org/output/{accession}/".to_string(),
            download:
                "https://antismash-dbv2.secondarymetabolites.org/output/{accession}/{filename}"
                    .to_string(),
        },
    ]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_browser_user_agent")]
    pub browser_user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: None,
            browser_user_agent: default_browser_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> usize {
    3
}

fn default_browser_user_agent() -> String {
    BROWSER_USER_AGENT.to_string()
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolverConfig, ResolverError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolverConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ResolverError::ConfigRead(config_path.clone()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<ResolverConfig, ResolverError> {
        let config: ResolverConfig = serde_json::from_str(content)
            .map_err(|err| ResolverError::ConfigParse(err.to_string()))?;
        if config.endpoints.catalogs.is_empty() {
            return Err(ResolverError::ConfigParse(
                "at least one catalog endpoint is required".to_string(),
            ));
        }
        Ok(config)
    }
}

impl ResolverConfig {
    pub fn cache_root(&self) -> Result<Utf8PathBuf, ResolverError> {
        if let Some(root) = &self.cache_root {
            return Ok(root.clone());
        }
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.home_dir().join(".cache").join("kira-genome-resolver"),
                )
                .ok()
            })
            .ok_or_else(|| ResolverError::fs("unable to resolve cache directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_partial_config_keeps_defaults() {
        let config = ConfigLoader::parse(
            r#"{"cache_root": "/tmp/kira-gr", "http": {"timeout_secs": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.cache_root.as_deref().map(|p| p.as_str()), Some("/tmp/kira-gr"));
        assert_eq!(config.http.timeout_secs, 5);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.endpoints, Endpoints::default());
        assert!(!config.force_reresolve);
    }

    #[test]
    fn render_templates() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.genbank_url("BAGG00000000.1"),
            "https://www.ncbi.nlm.nih.gov/nuccore/BAGG00000000.1?report=docsum"
        );
        assert_eq!(
            endpoints.catalogs[1].download_url("GCF_000203835.1", "GCF_000203835.1.zip"),
            "https://antismash-dbv2.secondarymetabolites.org/output/GCF_000203835.1/GCF_000203835.1.zip"
        );
    }
}
