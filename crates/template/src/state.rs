//! Persisted template state (`{id}.state.json`)

use draftforge_common::errors::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// A section added at runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicSection {
    pub titre: String,
    pub contenu: String,
}

/// Everything that distinguishes a working document from its template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateState {
    #[serde(default)]
    pub filled_data: IndexMap<String, String>,
    #[serde(default)]
    pub removed_sections: BTreeSet<String>,
    #[serde(default)]
    pub dynamic_sections: IndexMap<String, DynamicSection>,
}

impl TemplateState {
    /// Load from `path`, or an empty state if the file does not exist
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Pretty JSON, written to a sibling temp file then renamed into place
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        write_atomic(path, json.as_bytes()).await
    }
}

pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
