//! Document loading
//!
//! Loads .txt files verbatim and .md files with markdown syntax stripped so
//! embeddings see clean prose. Files are loaded in sorted filename order for
//! deterministic builds.

use crate::errors::IngestionError;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A raw document; immutable once loaded
#[derive(Debug, Clone)]
pub struct Document {
    /// Source identifier (file name)
    pub source: String,

    /// Full document text
    pub content: String,
}

/// Load all .txt and .md documents from a directory
pub fn load_documents(data_dir: &Path) -> Result<Vec<Document>, IngestionError> {
    if !data_dir.is_dir() {
        return Err(IngestionError::ConfigError(format!(
            "data directory does not exist: {}",
            data_dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(data_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("txt") | Some("md")
            )
        })
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = std::fs::read_to_string(&path)?;
        let is_markdown = path.extension().and_then(|e| e.to_str()) == Some("md");
        let content = if is_markdown { strip_markdown(&raw) } else { raw };

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        debug!(source = %source, chars = content.chars().count(), "Document loaded");
        documents.push(Document { source, content });
    }

    info!(count = documents.len(), dir = %data_dir.display(), "Documents loaded");
    Ok(documents)
}

/// Strip markdown formatting syntax, keeping the prose
pub fn strip_markdown(text: &str) -> String {
    // Fenced code block markers (keep the code itself)
    let fences = Regex::new(r"(?m)^```[^\n]*$").unwrap();
    // ATX headers
    let headers = Regex::new(r"(?m)^#{1,6}\s+").unwrap();
    // Links: [label](url) -> label
    let links = Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap();
    // Emphasis markers
    let emphasis = Regex::new(r"[*_]{1,3}([^*_]+)[*_]{1,3}").unwrap();
    // Inline code
    let inline_code = Regex::new(r"`([^`]*)`").unwrap();

    let text = fences.replace_all(text, "");
    let text = headers.replace_all(&text, "");
    let text = links.replace_all(&text, "$1");
    let text = emphasis.replace_all(&text, "$1");
    let text = inline_code.replace_all(&text, "$1");
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markdown_headers_and_emphasis() {
        let md = "# Title\n\nSome **bold** and *italic* text with `code`.";
        let plain = strip_markdown(md);
        assert_eq!(plain, "Title\n\nSome bold and italic text with code.");
    }

    #[test]
    fn test_strip_markdown_links() {
        let md = "See [the docs](https://example.com/docs) for details.";
        assert_eq!(strip_markdown(md), "See the docs for details.");
    }

    #[test]
    fn test_load_documents_sorted_and_stripped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "plain text").unwrap();
        std::fs::write(dir.path().join("a.md"), "# Heading\nbody").unwrap();
        std::fs::write(dir.path().join("ignored.pdf"), "binary").unwrap();

        let docs = load_documents(dir.path()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "a.md");
        assert_eq!(docs[0].content, "Heading\nbody");
        assert_eq!(docs[1].source, "b.txt");
        assert_eq!(docs[1].content, "plain text");
    }

    #[test]
    fn test_missing_directory_is_config_error() {
        let err = load_documents(Path::new("/nonexistent/ragrelay")).unwrap_err();
        assert!(matches!(err, IngestionError::ConfigError(_)));
    }
}
