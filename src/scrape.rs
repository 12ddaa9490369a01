//! Pattern-based extraction from the NCBI, JGI and antiSMASH HTML pages.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ResolverError;

static RPRTID_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<dl\b[^>]*\bclass\s*=\s*["'][^"']*\brprtid\b[^"']*["'][^>]*>(.*?)</dl>"#)
        .unwrap()
});
static DEFINITION_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(?:dt|dd)\b[^>]*>(.*?)</(?:dt|dd)>").unwrap());
static TITLE_PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<p\b[^>]*\bclass\s*=\s*["'][^"']*\btitle\b[^"']*["'][^>]*>(.*?)</p>"#)
        .unwrap()
});
static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["'][^>]*>(.*?)</a>"#).unwrap()
});
static NUCCORE_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://www\.ncbi\.nlm\.nih\.gov/nuccore/").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

/// The sequence GI listed after the `GI:` label on a nuccore docsum page.
pub fn scrape_gi_number(html: &str) -> Result<String, ResolverError> {
    let list = RPRTID_LIST
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| ResolverError::Parse("no rprtid definition list".to_string()))?;
    let items = DEFINITION_ITEM
        .captures_iter(list.as_str())
        .filter_map(|caps| caps.get(1).map(|m| html_text(m.as_str())))
        .collect::<Vec<_>>();
    items
        .iter()
        .position(|item| item == "GI:")
        .and_then(|idx| items.get(idx + 1))
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| ResolverError::Parse("no GI: entry in rprtid list".to_string()))
}

/// The assembly accession linked from the result title, without its version.
pub fn scrape_assembly_accession(html: &str) -> Result<String, ResolverError> {
    let title = TITLE_PARAGRAPH
        .captures(html)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| ResolverError::Parse("no title paragraph".to_string()))?;
    let href = ANCHOR_HREF
        .captures(title.as_str())
        .and_then(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str()))
        .ok_or_else(|| ResolverError::Parse("title paragraph has no link".to_string()))?;
    let segment = href
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let accession = segment.split('.').next().unwrap_or_default();
    if accession.is_empty() {
        return Err(ResolverError::Parse(format!(
            "empty accession in title link {href}"
        )));
    }
    Ok(accession.to_string())
}

/// Visible text of the first anchor pointing at an NCBI nuccore record.
pub fn scrape_nuccore_link_text(html: &str) -> Option<String> {
    ANCHOR_HREF
        .captures_iter(html)
        .find(|caps| {
            caps.get(1)
                .map(|href| NUCCORE_HREF.is_match(href.as_str()))
                .unwrap_or(false)
        })
        .and_then(|caps| caps.get(2).map(|text| html_text(text.as_str())))
        .filter(|text| !text.is_empty())
}

/// Target of the first anchor whose href ends in `.zip`.
pub fn scrape_archive_link(html: &str) -> Option<String> {
    ANCHOR_HREF
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|href| decode_entities(href.as_str().trim())))
        .find(|href| href.ends_with(".zip"))
}

pub fn html_text(fragment: &str) -> String {
    decode_entities(TAG.replace_all(fragment, "").trim())
        .trim()
        .to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCSUM: &str = r#"
        <div class="rprt"><p class="title"><a href="/nuccore/BAGG00000000.1">Streptomyces sp.</a></p>
        <dl class="rprtid"><dt>Accession: </dt><dd>BAGG00000000.1</dd>
        <dt>GI: </dt> <dd><b>383929201</b></dd></dl></div>"#;

    #[test]
    fn gi_from_docsum() {
        assert_eq!(scrape_gi_number(DOCSUM).unwrap(), "383929201");
    }

    #[test]
    fn gi_missing_is_parse_error() {
        let html = r#"<dl class="rprtid"><dt>Accession:</dt><dd>X</dd></dl>"#;
        assert!(matches!(
            scrape_gi_number(html),
            Err(ResolverError::Parse(_))
        ));
        assert!(scrape_gi_number("<html></html>").is_err());
    }

    #[test]
    fn assembly_accession_strips_version() {
        let html = r#"<div><p class="title"><a href="/assembly/GCF_000203835.1/">ASM20383v1</a></p></div>"#;
        assert_eq!(scrape_assembly_accession(html).unwrap(), "GCF_000203835");
    }

    #[test]
    fn nuccore_anchor_text() {
        let html = r#"<table><tr><td><a href="https://img.jgi.doe.gov/x">IMG</a></td>
            <td><a target="_blank" href="https://www.ncbi.nlm.nih.gov/nuccore/AZWU00000000">
            AZWU00000000 </a></td></tr></table>"#;
        assert_eq!(
            scrape_nuccore_link_text(html).as_deref(),
            Some("AZWU00000000")
        );
        assert_eq!(scrape_nuccore_link_text("<a href=\"/x\">y</a>"), None);
    }

    #[test]
    fn first_zip_link_wins() {
        let html = r#"<a href="index.html">overview</a>
            <a href="NC_003888.3.zip">Download all results</a>
            <a href="other.zip">other</a>"#;
        assert_eq!(scrape_archive_link(html).as_deref(), Some("NC_003888.3.zip"));
        assert_eq!(scrape_archive_link("<a href=\"a.zip.html\">x</a>"), None);
    }
}
