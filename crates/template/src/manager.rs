//! Template state manager
//!
//! Every mutation works on a copy of the state. The copy is rendered, the
//! output artifact is written, and saving `{id}.state.json` commits it.
//! A failed mutation leaves the live state and the state file as they were.

use crate::export;
use crate::render::render_document;
use crate::schema::TemplateSchema;
use crate::slug::slugify;
use crate::state::{write_atomic, DynamicSection, TemplateState};
use draftforge_common::errors::{AppError, Result};
use draftforge_common::metrics;
use std::path::{Path, PathBuf};

/// Template ids are plain file stems: `[A-Za-z0-9_.-]+`, never `..`
pub fn validate_template_id(id: &str) -> Result<()> {
    let charset_ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !charset_ok || id.contains("..") {
        return Err(AppError::validation(
            "template_id",
            format!("invalid template id '{}'", id),
        ));
    }
    Ok(())
}

pub struct TemplateManager {
    id: String,
    original_html: String,
    schema: TemplateSchema,
    state: TemplateState,
    rendered: String,
    state_path: PathBuf,
    output_path: PathBuf,
}

impl TemplateManager {
    /// Load `{id}.html` + `{id}.json` and any saved state, then render and
    /// write the output artifact.
    pub async fn open(
        id: &str,
        templates_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        validate_template_id(id)?;
        let templates_dir = templates_dir.as_ref();
        let output_dir = output_dir.as_ref();

        let original_html = tokio::fs::read_to_string(templates_dir.join(format!("{}.html", id)))
            .await
            .map_err(|e| AppError::TemplateNotFound {
                id: id.to_string(),
                reason: format!("html source: {}", e),
            })?;
        let raw_schema = tokio::fs::read_to_string(templates_dir.join(format!("{}.json", id)))
            .await
            .map_err(|e| AppError::TemplateNotFound {
                id: id.to_string(),
                reason: format!("schema: {}", e),
            })?;
        let schema = TemplateSchema::parse(&raw_schema).map_err(|e| AppError::TemplateNotFound {
            id: id.to_string(),
            reason: format!("malformed schema: {}", e),
        })?;

        let state_path = output_dir.join(format!("{}.state.json", id));
        let output_path = output_dir.join(format!("{}.generated.html", id));
        let state = TemplateState::load(&state_path).await?;

        let rendered = render_document(&original_html, &schema, &state);
        write_atomic(&output_path, rendered.as_bytes()).await?;

        tracing::info!(
            template_id = id,
            filled = state.filled_data.len(),
            dynamic = state.dynamic_sections.len(),
            removed = state.removed_sections.len(),
            "Template opened"
        );

        Ok(Self {
            id: id.to_string(),
            original_html,
            schema,
            state,
            rendered,
            state_path,
            output_path,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current merged HTML
    pub fn render(&self) -> &str {
        &self.rendered
    }

    pub fn state(&self) -> &TemplateState {
        &self.state
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Schema sections followed by dynamic sections, in insertion order
    pub fn section_names(&self) -> Vec<String> {
        self.schema
            .names()
            .chain(self.state.dynamic_sections.keys())
            .cloned()
            .collect()
    }

    /// Generation instruction for a section; dynamic sections use their title
    pub fn ia_prompt(&self, section: &str) -> Result<String> {
        if let Some(dynamic) = self.state.dynamic_sections.get(section) {
            return Ok(dynamic.titre.clone());
        }
        self.schema
            .get(section)
            .map(|spec| spec.ia_prompt.clone())
            .ok_or_else(|| AppError::UnknownSection {
                section: section.to_string(),
            })
    }

    /// Fill a section. Dynamic sections win over schema sections of the same key.
    pub async fn inject(&mut self, section: &str, content: &str) -> Result<()> {
        let mut next = self.state.clone();
        self.fill(&mut next, section, content)?;

        self.commit(next).await?;
        metrics::record_template_mutation("inject");
        tracing::debug!(template_id = %self.id, section, "Section injected");
        Ok(())
    }

    /// Fill several sections in one commit. An unknown key rejects the whole batch.
    pub async fn inject_all<'a, I>(&mut self, sections: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut next = self.state.clone();
        let mut count = 0;
        for (section, content) in sections {
            self.fill(&mut next, section, content)?;
            count += 1;
        }

        self.commit(next).await?;
        metrics::record_template_mutation("inject");
        tracing::debug!(template_id = %self.id, sections = count, "Sections injected");
        Ok(count)
    }

    fn fill(&self, next: &mut TemplateState, section: &str, content: &str) -> Result<()> {
        if let Some(dynamic) = next.dynamic_sections.get_mut(section) {
            dynamic.contenu = content.to_string();
        } else if self.schema.contains(section) {
            next.filled_data
                .insert(section.to_string(), content.to_string());
        } else {
            return Err(AppError::UnknownSection {
                section: section.to_string(),
            });
        }
        Ok(())
    }

    /// Add (or overwrite) a runtime section and return its key
    pub async fn add_section(&mut self, titre: &str, content: &str) -> Result<String> {
        let key = slugify(titre)?;

        let mut next = self.state.clone();
        next.dynamic_sections.insert(
            key.clone(),
            DynamicSection {
                titre: titre.to_string(),
                contenu: content.to_string(),
            },
        );
        next.removed_sections.remove(&key);

        self.commit(next).await?;
        metrics::record_template_mutation("add_section");
        tracing::debug!(template_id = %self.id, key = %key, "Section added");
        Ok(key)
    }

    /// Hide a section. Unknown keys are recorded too; never fails on them.
    pub async fn remove_section(&mut self, key: &str) -> Result<()> {
        let mut next = self.state.clone();
        next.removed_sections.insert(key.to_string());
        next.dynamic_sections.shift_remove(key);

        self.commit(next).await?;
        metrics::record_template_mutation("remove_section");
        tracing::debug!(template_id = %self.id, key, "Section removed");
        Ok(())
    }

    /// Seed every unfilled schema section with its initial content
    pub async fn initialize_defaults(&mut self) -> Result<()> {
        let mut next = self.state.clone();
        for (name, spec) in self.schema.iter() {
            if !spec.contenu_initiale.is_empty() && !next.filled_data.contains_key(name) {
                next.filled_data
                    .insert(name.clone(), spec.contenu_initiale.clone());
            }
        }

        self.commit(next).await?;
        metrics::record_template_mutation("initialize");
        Ok(())
    }

    /// Convert the written output artifact into a PDF at `dest`
    pub async fn export_pdf(&self, dest: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = dest.as_ref();
        let html = match tokio::fs::read_to_string(&self.output_path).await {
            Ok(html) => html,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::ExportSourceMissing {
                    path: self.output_path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = export::render_pdf(&html, &self.id)?;
        write_atomic(dest, &bytes).await.map_err(|e| AppError::ExportFailed {
            message: format!("writing {}: {}", dest.display(), e),
        })?;

        metrics::record_template_mutation("export");
        tracing::info!(template_id = %self.id, dest = %dest.display(), bytes = bytes.len(), "PDF exported");
        Ok(dest.to_path_buf())
    }

    async fn commit(&mut self, next: TemplateState) -> Result<()> {
        let rendered = render_document(&self.original_html, &self.schema, &next);
        write_atomic(&self.output_path, rendered.as_bytes()).await?;
        if let Err(e) = next.save(&self.state_path).await {
            // `open` re-renders from the state file, so a stale artifact only
            // lives until then; put the previous one back anyway
            if let Err(restore) = write_atomic(&self.output_path, self.rendered.as_bytes()).await {
                tracing::warn!(template_id = %self.id, error = %restore, "Failed to restore output artifact");
            }
            return Err(e);
        }

        self.state = next;
        self.rendered = rendered;
        Ok(())
    }
}
