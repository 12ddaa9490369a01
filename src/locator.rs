use std::fmt;

use tracing::{debug, info, warn};

use crate::candidates::first_match;
use crate::config::{CatalogEndpoint, Endpoints};
use crate::domain::Accession;
use crate::error::ResolverError;
use crate::remote::{AgentProfile, RemoteClient};
use crate::scrape;

/// Where an archive lives. `accession` is the spelling the catalog knows it by,
/// which may carry a `.1` suffix the caller did not supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedAsset {
    pub accession: Accession,
    pub remote_filename: String,
    pub catalog: String,
}

#[derive(Debug, Clone)]
pub struct CatalogProbe<'a> {
    pub catalog: &'a CatalogEndpoint,
    pub accession: Accession,
}

impl CatalogProbe<'_> {
    pub fn page_url(&self) -> String {
        self.catalog.page_url(self.accession.as_str())
    }
}

impl fmt::Display for CatalogProbe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.catalog.name, self.accession)
    }
}

/// Catalog order outermost, then the bare accession before its `.1` variant.
pub fn probe_candidates<'a>(endpoints: &'a Endpoints, accession: &Accession) -> Vec<CatalogProbe<'a>> {
    let variants = [accession.clone(), accession.with_version_suffix()];
    endpoints
        .catalogs
        .iter()
        .flat_map(|catalog| {
            variants.iter().map(move |variant| CatalogProbe {
                catalog,
                accession: variant.clone(),
            })
        })
        .collect()
}

pub struct AssetLocator<'a, C: RemoteClient> {
    client: &'a C,
    endpoints: &'a Endpoints,
}

impl<'a, C: RemoteClient> AssetLocator<'a, C> {
    pub fn new(client: &'a C, endpoints: &'a Endpoints) -> Self {
        Self { client, endpoints }
    }

    pub fn locate(&self, accession: &Accession) -> Option<LocatedAsset> {
        let candidates = probe_candidates(self.endpoints, accession);
        let found = first_match(
            candidates,
            |probe| {
                let url = probe.page_url();
                info!(probe = %probe, url = %url, "antiSMASH DB lookup");
                let page = self.client.fetch_page(&url, AgentProfile::Default)?;
                scrape::scrape_archive_link(&page)
                    .ok_or_else(|| ResolverError::Parse(format!("no .zip link on {url}")))
            },
            |_| true,
        );

        match found {
            Ok((probe, href)) => {
                let remote_filename = href.rsplit('/').next().unwrap_or(&href).to_string();
                info!(
                    accession = %probe.accession,
                    filename = %remote_filename,
                    "antiSMASH lookup succeeded"
                );
                Some(LocatedAsset {
                    accession: probe.accession,
                    remote_filename,
                    catalog: probe.catalog.name.clone(),
                })
            }
            Err(exhausted) => {
                for (probe, err) in &exhausted.failures {
                    debug!(probe = %probe, error = %err, "catalog probe failed");
                }
                warn!(accession = %accession, reasons = %exhausted, "no antiSMASH archive located");
                None
            }
        }
    }
}
