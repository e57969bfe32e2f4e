//! Open template managers, one per id

use crate::manager::{validate_template_id, TemplateManager};
use draftforge_common::errors::{AppError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub type SharedManager = Arc<Mutex<TemplateManager>>;

/// Raw template files, for previews
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSource {
    pub id: String,
    pub html: String,
    pub schema: serde_json::Value,
}

/// Serializes mutations per template while letting different templates
/// proceed in parallel.
pub struct TemplateStore {
    templates_dir: PathBuf,
    output_dir: PathBuf,
    exports_dir: PathBuf,
    managers: RwLock<HashMap<String, SharedManager>>,
}

impl TemplateStore {
    /// Exports land in `{output_dir}/exports`
    pub fn new(templates_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            templates_dir: templates_dir.into(),
            exports_dir: output_dir.join("exports"),
            output_dir,
            managers: RwLock::new(HashMap::new()),
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Manager for `id`, opening it on first use
    pub async fn get(&self, id: &str) -> Result<SharedManager> {
        if let Some(manager) = self.managers.read().await.get(id) {
            return Ok(manager.clone());
        }

        let manager = TemplateManager::open(id, &self.templates_dir, &self.output_dir).await?;
        // Another task may have opened the same id meanwhile; first insert wins
        let mut managers = self.managers.write().await;
        let shared = managers
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(manager)));
        Ok(shared.clone())
    }

    /// Ids of every `*.html` template that has a sibling schema
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.templates_dir).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_template_id(stem).is_ok() && path.with_extension("json").is_file() {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Unrendered HTML and schema of a template
    pub async fn source(&self, id: &str) -> Result<TemplateSource> {
        validate_template_id(id)?;
        let not_found = |e: std::io::Error| AppError::TemplateNotFound {
            id: id.to_string(),
            reason: e.to_string(),
        };
        let html = tokio::fs::read_to_string(self.templates_dir.join(format!("{}.html", id)))
            .await
            .map_err(not_found)?;
        let raw = tokio::fs::read_to_string(self.templates_dir.join(format!("{}.json", id)))
            .await
            .map_err(not_found)?;
        let schema = serde_json::from_str(&raw).map_err(|e| AppError::TemplateNotFound {
            id: id.to_string(),
            reason: format!("malformed schema: {}", e),
        })?;

        Ok(TemplateSource {
            id: id.to_string(),
            html,
            schema,
        })
    }

    /// Export a template to `{exports_dir}/{id}.pdf`
    pub async fn export(&self, id: &str) -> Result<PathBuf> {
        let manager = self.get(id).await?;
        let dest = self.exports_dir.join(format!("{}.pdf", id));
        let guard = manager.lock().await;
        guard.export_pdf(dest).await
    }

    pub async fn open_count(&self) -> usize {
        self.managers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, TemplateStore) {
        let root = tempfile::tempdir().unwrap();
        let templates = root.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(
            templates.join("brief.html"),
            "<main><p>{{budget}}</p></main>",
        )
        .unwrap();
        std::fs::write(
            templates.join("brief.json"),
            r#"{"budget": {"contenu_initiale": "TBD", "contenu": "{{budget}}", "ia_prompt": "Budget"}}"#,
        )
        .unwrap();
        std::fs::write(templates.join("orphan.html"), "<main></main>").unwrap();
        std::fs::write(templates.join("notes.txt"), "x").unwrap();

        let store = TemplateStore::new(templates, root.path().join("output"));
        (root, store)
    }

    #[tokio::test]
    async fn test_list_requires_schema() {
        let (_root, store) = store();
        assert_eq!(store.list().await.unwrap(), ["brief"]);
    }

    #[tokio::test]
    async fn test_get_reuses_manager() {
        let (_root, store) = store();
        let a = store.get("brief").await.unwrap();
        a.lock().await.inject("budget", "42").await.unwrap();

        let b = store.get("brief").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.lock().await.render(), "<main><p>42</p></main>");
        assert_eq!(store.open_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let (_root, store) = store();
        assert!(matches!(
            store.get("missing").await,
            Err(AppError::TemplateNotFound { .. })
        ));
        assert!(matches!(
            store.get("../brief").await,
            Err(AppError::Validation { .. })
        ));
        assert_eq!(store.open_count().await, 0);
    }

    #[tokio::test]
    async fn test_source() {
        let (_root, store) = store();
        let source = store.source("brief").await.unwrap();
        assert!(source.html.contains("{{budget}}"));
        assert_eq!(source.schema["budget"]["contenu_initiale"], "TBD");
    }

    #[tokio::test]
    async fn test_concurrent_mutations_serialize() {
        let (_root, store) = store();
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let manager = store.get("brief").await.unwrap();
                let mut guard = manager.lock().await;
                guard
                    .add_section(&format!("Section {}", i), "x")
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let manager = store.get("brief").await.unwrap();
        assert_eq!(manager.lock().await.state().dynamic_sections.len(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_open_shares_manager() {
        let (_root, store) = store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.get("brief").await.unwrap() })
            })
            .collect();
        let mut managers = Vec::new();
        for handle in handles {
            managers.push(handle.await.unwrap());
        }

        assert!(managers.iter().all(|m| Arc::ptr_eq(m, &managers[0])));
        assert_eq!(store.open_count().await, 1);
    }

    #[tokio::test]
    async fn test_export_writes_pdf() {
        let (root, store) = store();
        let path = store.export("brief").await.unwrap();
        assert_eq!(path, root.path().join("output").join("exports").join("brief.pdf"));
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF-"));
    }
}
