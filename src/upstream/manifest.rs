//! Manifest Parser (C2, spec.md §4.2).
//!
//! Pure, deterministic, and order-preserving: no I/O lives here, only the
//! line-oriented decode of the per-supplier manifest text into
//! [`ManifestEntry`] records.

use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub url: String,
    pub hash: String,
    pub sku: String,
    pub supplier_code: String,
}

/// Parse one supplier's manifest text. Each non-empty line is
/// `<url>|<hex-hash>`. Lines whose url ends in `/CAT.csv`, or that lack a `|`
/// separator, are silently skipped. Input order is preserved.
pub fn parse_manifest(text: &str) -> Vec<ManifestEntry> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<ManifestEntry> {
    let line = line.trim();
    let (url, hash) = line.split_once('|')?;
    let url = url.trim();
    let hash = hash.trim();

    if url.ends_with("/CAT.csv") {
        return None;
    }
    if url.is_empty() || hash.is_empty() {
        return None;
    }

    let sku = basename_without_extension(url);
    let supplier_code = leading_path_segment(url)?;

    Some(ManifestEntry {
        url: url.to_string(),
        hash: hash.to_string(),
        sku,
        supplier_code,
    })
}

fn basename_without_extension(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = Path::new(path)
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// The first path segment of the URL, i.e. the supplier code. Handles both
/// absolute URLs (`https://host/SUPP/file.json`) and bare relative paths
/// (`SUPP/file.json`).
fn leading_path_segment(url: &str) -> Option<String> {
    let without_scheme = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);

    let path_start = without_scheme.find('/').map(|i| i + 1).unwrap_or(0);
    let path = &without_scheme[path_start..];

    path.split('/').find(|seg| !seg.is_empty()).map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_line() {
        let entries = parse_manifest("SUPP001/F123.json|abcdef0123456789\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "SUPP001/F123.json");
        assert_eq!(entries[0].hash, "abcdef0123456789");
        assert_eq!(entries[0].sku, "F123");
        assert_eq!(entries[0].supplier_code, "SUPP001");
    }

    #[test]
    fn skips_cat_csv_lines() {
        let entries = parse_manifest("SUPP001/CAT.csv|deadbeef\nSUPP001/F1.json|aaaa\n");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sku, "F1");
    }

    #[test]
    fn skips_lines_without_pipe() {
        let entries = parse_manifest("not-a-valid-line\nSUPP001/F1.json|aaaa\n");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn skips_empty_lines() {
        let entries = parse_manifest("\n\nSUPP001/F1.json|aaaa\n\n");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn preserves_input_order() {
        let text = "A/1.json|h1\nA/2.json|h2\nA/3.json|h3\n";
        let entries = parse_manifest(text);
        assert_eq!(
            entries.iter().map(|e| e.sku.clone()).collect::<Vec<_>>(),
            vec!["1", "2", "3"]
        );
    }

    #[test]
    fn handles_absolute_urls() {
        let entries = parse_manifest("https://promidata.example.com/SUPP42/ABC.json|hash1\n");
        assert_eq!(entries[0].supplier_code, "SUPP42");
        assert_eq!(entries[0].sku, "ABC");
    }

    #[test]
    fn empty_manifest_yields_empty_vec() {
        assert!(parse_manifest("").is_empty());
        assert!(parse_manifest("   \n  \n").is_empty());
    }
}
