use tracing::{debug, info, warn};

use crate::config::Endpoints;
use crate::domain::{
    Accession, BestIdentifier, GenomeIdentifierBundle, normalize_genbank_accession,
};
use crate::error::ResolverError;
use crate::remote::{AgentProfile, RemoteClient};
use crate::scrape;

/// Turns an identifier bundle into a RefSeq-style accession.
pub struct AccessionResolver<'a, C: RemoteClient> {
    client: &'a C,
    endpoints: &'a Endpoints,
}

impl<'a, C: RemoteClient> AccessionResolver<'a, C> {
    pub fn new(client: &'a C, endpoints: &'a Endpoints) -> Self {
        Self { client, endpoints }
    }

    pub fn resolve(&self, bundle: &GenomeIdentifierBundle) -> Result<Accession, ResolverError> {
        match bundle.best_available() {
            BestIdentifier::RefSeq(id) => id.parse(),
            BestIdentifier::GenBank(id) => self.resolve_genbank(&id),
            BestIdentifier::Jgi(id) => self.resolve_jgi(&id),
            BestIdentifier::None => {
                warn!(bundle = %bundle, "unable to resolve genome identifier");
                Err(ResolverError::UnresolvableBundle(bundle.to_string()))
            }
        }
    }

    /// GenBank accession -> GI number (nuccore docsum) -> assembly accession.
    pub fn resolve_genbank(&self, genbank_id: &str) -> Result<Accession, ResolverError> {
        let normalized = normalize_genbank_accession(genbank_id);
        info!(
            genbank = genbank_id,
            normalized = %normalized,
            "resolving RefSeq accession from GenBank accession"
        );

        let result = self.lookup_genbank(&normalized);
        if let Err(err) = &result {
            warn!(genbank = %normalized, error = %err, "failed resolving GenBank accession");
        }
        result
    }

    fn lookup_genbank(&self, normalized: &str) -> Result<Accession, ResolverError> {
        let page = self
            .client
            .fetch_page(&self.endpoints.genbank_url(normalized), AgentProfile::Default)?;
        let gi = scrape::scrape_gi_number(&page)?;
        debug!(genbank = normalized, gi = %gi, "found sequence GI");

        let page = self
            .client
            .fetch_page(&self.endpoints.assembly_url(&gi), AgentProfile::Default)?;
        let accession = scrape::scrape_assembly_accession(&page)?;
        accession.parse()
    }

    /// JGI taxon id -> GenBank accession linked from the taxon page -> GenBank path.
    pub fn resolve_jgi(&self, jgi_id: &str) -> Result<Accession, ResolverError> {
        info!(jgi = jgi_id, "resolving GenBank accession from JGI taxon page");
        let page = self
            .client
            .fetch_page(&self.endpoints.jgi_url(jgi_id), AgentProfile::Browser)
            .inspect_err(|err| warn!(jgi = jgi_id, error = %err, "JGI lookup failed"))?;
        let genbank = scrape::scrape_nuccore_link_text(&page).ok_or_else(|| {
            warn!(jgi = jgi_id, "JGI taxon page has no nuccore link");
            ResolverError::Parse(format!("no nuccore link on JGI taxon page {jgi_id}"))
        })?;
        self.resolve_genbank(&genbank)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<(String, AgentProfile)>>,
    }

    impl RemoteClient for RecordingClient {
        fn fetch_page(&self, url: &str, agent: AgentProfile) -> Result<String, ResolverError> {
            self.calls.lock().unwrap().push((url.to_string(), agent));
            Err(ResolverError::Http("offline".to_string()))
        }

        fn download(&self, url: &str, _destination: &Path) -> Result<u64, ResolverError> {
            Err(ResolverError::NotFound(url.to_string()))
        }
    }

    #[test]
    fn refseq_needs_no_network() {
        let client = RecordingClient::default();
        let endpoints = Endpoints::default();
        let resolver = AccessionResolver::new(&client, &endpoints);
        let bundle = GenomeIdentifierBundle {
            refseq: Some("GCF_000203835.1".to_string()),
            genbank: Some("BAFR00000000.1".to_string()),
            jgi: None,
        };
        let acc = resolver.resolve(&bundle).unwrap();
        assert_eq!(acc.as_str(), "GCF_000203835.1");
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_bundle_fails_without_network() {
        let client = RecordingClient::default();
        let endpoints = Endpoints::default();
        let resolver = AccessionResolver::new(&client, &endpoints);
        let err = resolver
            .resolve(&GenomeIdentifierBundle::default())
            .unwrap_err();
        assert_matches!(err, ResolverError::UnresolvableBundle(_));
        assert!(client.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn jgi_lookup_uses_browser_agent() {
        let client = RecordingClient::default();
        let endpoints = Endpoints::default();
        let resolver = AccessionResolver::new(&client, &endpoints);
        let err = resolver
            .resolve(&GenomeIdentifierBundle::jgi("2515154177"))
            .unwrap_err();
        assert_matches!(err, ResolverError::Http(_));
        let calls = client.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.ends_with("taxon_oid=2515154177"));
        assert_eq!(calls[0].1, AgentProfile::Browser);
    }
}
