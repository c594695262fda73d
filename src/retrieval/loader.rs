//! Source document loading.

use std::path::Path;

use walkdir::WalkDir;

use super::IngestError;

/// Text extracted from one source unit (a PDF page or a text file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub source_id: String,
    pub text: String,
}

/// Recursively load every file under `root` whose extension is in `extensions`.
///
/// PDFs yield one document per page (`<path>#page=<n>`); `txt` and `md` files
/// yield one document each. Files are visited in path order and blank
/// documents are skipped.
pub fn load_documents(root: &Path, extensions: &[String]) -> Result<Vec<SourceDocument>, IngestError> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| IngestError::Io(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
        else {
            continue;
        };
        if !extensions.iter().any(|allowed| allowed == &ext) {
            continue;
        }

        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        match ext.as_str() {
            "pdf" => {
                let text = pdf_extract::extract_text(path)
                    .map_err(|e| IngestError::Pdf(format!("{}: {}", relative, e)))?;
                documents.extend(pdf_pages(&relative, &text));
            }
            _ => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| IngestError::Io(format!("{}: {}", relative, e)))?;
                if !text.trim().is_empty() {
                    documents.push(SourceDocument {
                        source_id: relative,
                        text,
                    });
                }
            }
        }
    }

    tracing::info!("Loaded {} documents from {}", documents.len(), root.display());
    Ok(documents)
}

/// Split extracted PDF text on form feeds into per-page documents.
fn pdf_pages(relative: &str, text: &str) -> Vec<SourceDocument> {
    text.split('\x0c')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| SourceDocument {
            source_id: format!("{}#page={}", relative, i + 1),
            text: page.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_matching_extensions_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("india/himachal")).unwrap();
        std::fs::write(dir.path().join("india/himachal/manali.txt"), "Hadimba temple").unwrap();
        std::fs::write(dir.path().join("goa.md"), "Beaches").unwrap();
        std::fs::write(dir.path().join("notes.csv"), "ignored").unwrap();
        std::fs::write(dir.path().join("blank.txt"), "   \n").unwrap();

        let docs = load_documents(dir.path(), &["txt".to_string(), "md".to_string()]).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.source_id.as_str()).collect();

        assert_eq!(docs.len(), 2);
        assert!(ids.contains(&"goa.md"));
        assert!(ids.iter().any(|id| id.ends_with("manali.txt")));
    }

    #[test]
    fn pdf_text_is_split_into_pages() {
        let pages = pdf_pages("guide.pdf", "Page one\x0c \x0cPage three");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].source_id, "guide.pdf#page=1");
        assert_eq!(pages[1].source_id, "guide.pdf#page=3");
    }
}
