use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ResolverError;

/// Identifier fields attached to one genome in the upstream project document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenomeIdentifierBundle {
    #[serde(
        rename = "RefSeq_accession",
        default,
        deserialize_with = "optional_identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub refseq: Option<String>,
    #[serde(
        rename = "GenBank_accession",
        default,
        deserialize_with = "optional_identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub genbank: Option<String>,
    #[serde(
        rename = "JGI_Genome_ID",
        default,
        deserialize_with = "optional_identifier",
        skip_serializing_if = "Option::is_none"
    )]
    pub jgi: Option<String>,
}

/// The first usable identifier of a bundle, tagged with its namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestIdentifier {
    RefSeq(String),
    GenBank(String),
    Jgi(String),
    None,
}

impl BestIdentifier {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BestIdentifier::RefSeq(id) | BestIdentifier::GenBank(id) | BestIdentifier::Jgi(id) => {
                Some(id)
            }
            BestIdentifier::None => None,
        }
    }

    pub fn namespace(&self) -> &'static str {
        match self {
            BestIdentifier::RefSeq(_) => "refseq",
            BestIdentifier::GenBank(_) => "genbank",
            BestIdentifier::Jgi(_) => "jgi",
            BestIdentifier::None => "none",
        }
    }
}

impl GenomeIdentifierBundle {
    pub fn refseq(id: impl Into<String>) -> Self {
        Self {
            refseq: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn genbank(id: impl Into<String>) -> Self {
        Self {
            genbank: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn jgi(id: impl Into<String>) -> Self {
        Self {
            jgi: Some(id.into()),
            ..Self::default()
        }
    }

    /// RefSeq > GenBank > JGI. Used both as the ledger key and for dispatch.
    pub fn best_available(&self) -> BestIdentifier {
        if let Some(id) = present(&self.refseq) {
            BestIdentifier::RefSeq(id.to_string())
        } else if let Some(id) = present(&self.genbank) {
            BestIdentifier::GenBank(id.to_string())
        } else if let Some(id) = present(&self.jgi) {
            BestIdentifier::Jgi(id.to_string())
        } else {
            BestIdentifier::None
        }
    }
}

impl fmt::Display for GenomeIdentifierBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RefSeq={} GenBank={} JGI={}",
            self.refseq.as_deref().unwrap_or("-"),
            self.genbank.as_deref().unwrap_or("-"),
            self.jgi.as_deref().unwrap_or("-")
        )
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn optional_identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// One genome entry of the upstream project document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeRecord {
    #[serde(rename = "genome_ID")]
    pub genome_id: GenomeIdentifierBundle,
    #[serde(default)]
    pub genome_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenomeRecord {
    pub fn new(label: impl Into<String>, genome_id: GenomeIdentifierBundle) -> Self {
        Self {
            genome_id,
            genome_label: label.into(),
            resolved_id: None,
            extra: Map::new(),
        }
    }
}

/// The batch input: either a bare list of genome records or a project document
/// carrying them under `genomes`. Everything else in the document is kept.
#[derive(Debug, Clone)]
pub struct GenomeDocument {
    envelope: Option<Map<String, Value>>,
    pub genomes: Vec<GenomeRecord>,
}

impl GenomeDocument {
    pub fn parse(content: &str) -> Result<Self, ResolverError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|err| ResolverError::InvalidInput(err.to_string()))?;
        match value {
            Value::Array(_) => Ok(Self {
                envelope: None,
                genomes: serde_json::from_value(value)
                    .map_err(|err| ResolverError::InvalidInput(err.to_string()))?,
            }),
            Value::Object(mut map) => {
                let genomes = map.remove("genomes").ok_or_else(|| {
                    ResolverError::InvalidInput("document has no genomes array".to_string())
                })?;
                let genomes = serde_json::from_value(genomes)
                    .map_err(|err| ResolverError::InvalidInput(err.to_string()))?;
                Ok(Self {
                    envelope: Some(map),
                    genomes,
                })
            }
            _ => Err(ResolverError::InvalidInput(
                "expected a JSON array or object".to_string(),
            )),
        }
    }

    pub fn to_json(&self) -> Result<String, ResolverError> {
        let genomes = serde_json::to_value(&self.genomes)
            .map_err(|err| ResolverError::InvalidInput(err.to_string()))?;
        let value = match &self.envelope {
            Some(map) => {
                let mut map = map.clone();
                map.insert("genomes".to_string(), genomes);
                Value::Object(map)
            }
            None => genomes,
        };
        serde_json::to_string_pretty(&value)
            .map_err(|err| ResolverError::InvalidInput(err.to_string()))
    }
}

/// A canonical accession as used for cache paths and catalog lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Accession(String);

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The variant with a `.1` version appended, probed when the bare form is unknown.
    pub fn with_version_suffix(&self) -> Accession {
        Accession(format!("{}.1", self.0))
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Accession {
    type Err = ResolverError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized != "."
            && normalized != ".."
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-'));
        if !is_valid {
            return Err(ResolverError::Parse(format!(
                "not a usable accession: {value:?}"
            )));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// GenBank accessions come as `BAFR00000000.1`, `NZ_BAGG00000000.1` or `NC_016887.1`.
/// Prefixed WGS masters are reduced to the 12-character block; other prefixed ids
/// are lower-cased, which is the form the nucleotide lookup accepts.
pub fn normalize_genbank_accession(raw: &str) -> String {
    let raw = raw.trim();
    let Some((_, tail)) = raw.rsplit_once('_') else {
        return raw.to_string();
    };
    let block = tail.split('.').next().unwrap_or(tail);
    if block.chars().count() == 12 {
        tail.to_string()
    } else {
        raw.to_lowercase()
    }
}
