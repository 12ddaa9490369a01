use std::time::Instant;

use camino::Utf8Path;
use tracing::{debug, info, warn};

use crate::candidates::first_match;
use crate::config::{CatalogEndpoint, Endpoints};
use crate::error::ResolverError;
use crate::locator::LocatedAsset;
use crate::remote::RemoteClient;
use crate::store::ArchiveCacheStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    CacheHit,
    Downloaded { bytes: u64, catalog: String },
}

pub struct ArchiveFetcher<'a, C: RemoteClient> {
    client: &'a C,
    endpoints: &'a Endpoints,
    store: &'a ArchiveCacheStore,
}

impl<'a, C: RemoteClient> ArchiveFetcher<'a, C> {
    pub fn new(client: &'a C, endpoints: &'a Endpoints, store: &'a ArchiveCacheStore) -> Self {
        Self {
            client,
            endpoints,
            store,
        }
    }

    /// Download candidates are tried in catalog order; only a 404 moves on to the next one.
    pub fn fetch(
        &self,
        asset: &LocatedAsset,
        destination: &Utf8Path,
    ) -> Result<FetchOutcome, ResolverError> {
        debug!(path = %destination, "checking for existing antiSMASH archive");
        if ArchiveCacheStore::validate_or_evict(destination)? {
            info!(path = %destination, "found cached archive");
            return Ok(FetchOutcome::CacheHit);
        }

        let accession = asset.accession.as_str();
        let filename = asset.remote_filename.as_str();
        let start = Instant::now();
        let mut used: Option<CatalogEndpoint> = None;
        let bytes = self.store.write_verified(destination, |staging| {
            let found = first_match(
                self.endpoints.catalogs.iter(),
                |catalog| {
                    let url = catalog.download_url(accession, filename);
                    info!(url = %url, "downloading from antiSMASH");
                    self.client.download(&url, staging)
                },
                ResolverError::is_not_found,
            );
            match found {
                Ok((catalog, bytes)) => {
                    used = Some(catalog.clone());
                    Ok(bytes)
                }
                Err(exhausted) => {
                    warn!(accession, reasons = %exhausted, "antiSMASH download failed");
                    Err(exhausted
                        .into_last_error()
                        .unwrap_or_else(|| ResolverError::NotFound(filename.to_string())))
                }
            }
        })?;

        let catalog = used.map(|catalog| catalog.name).unwrap_or_default();
        info!(
            accession,
            bytes,
            catalog = %catalog,
            latency_ms = start.elapsed().as_millis() as u64,
            "archive downloaded"
        );
        Ok(FetchOutcome::Downloaded { bytes, catalog })
    }
}
