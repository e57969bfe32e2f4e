//! Search criteria

use draftforge_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

fn default_max() -> usize {
    2
}

/// Structured search input.
///
/// `title`, `client` and `document_type` are exact-match filters (any value
/// within a field, every populated field). `summary`, `keywords` and
/// `sector` make up the semantic document query. `query` drives chunk
/// retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchCriteria {
    #[serde(default)]
    pub title: Vec<String>,

    #[serde(default)]
    pub client: Vec<String>,

    #[serde(default)]
    pub document_type: Vec<String>,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub keywords: Vec<String>,

    #[serde(default)]
    pub sector: Vec<String>,

    #[validate(length(min = 1, max = 2000))]
    #[serde(default)]
    pub query: String,

    #[validate(range(min = 1, max = 50))]
    #[serde(default = "default_max")]
    pub maxdoc: usize,

    #[validate(range(min = 1, max = 50))]
    #[serde(default = "default_max")]
    pub maxchunks: usize,
}

impl SearchCriteria {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            title: Vec::new(),
            client: Vec::new(),
            document_type: Vec::new(),
            summary: None,
            keywords: Vec::new(),
            sector: Vec::new(),
            query: query.into(),
            maxdoc: default_max(),
            maxchunks: default_max(),
        }
    }

    /// Reject malformed criteria before any upstream call
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: e.field_errors().keys().next().map(|k| k.to_string()),
        })?;

        if self.query.trim().is_empty() {
            return Err(AppError::validation("query", "query must not be blank"));
        }
        Ok(())
    }

    /// Exact-filter groups as (property, values), skipping empty fields
    pub fn exact_groups(&self) -> Vec<(&'static str, Vec<&str>)> {
        [
            ("title", &self.title),
            ("client", &self.client),
            ("document_type", &self.document_type),
        ]
        .into_iter()
        .map(|(property, values)| {
            let values: Vec<&str> = values
                .iter()
                .map(String::as_str)
                .filter(|v| !v.trim().is_empty())
                .collect();
            (property, values)
        })
        .filter(|(_, values)| !values.is_empty())
        .collect()
    }

    /// Semantic document query: summary, keywords then sector, space-joined
    pub fn semantic_query(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .summary
            .iter()
            .chain(self.keywords.iter())
            .chain(self.sector.iter())
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let criteria: SearchCriteria =
            serde_json::from_str(r#"{"query": "planning", "client": ["ACME"]}"#).unwrap();
        assert_eq!(criteria.maxdoc, 2);
        assert_eq!(criteria.maxchunks, 2);
        tokio_test::assert_ok!(criteria.check());
    }

    #[test]
    fn test_blank_query_rejected() {
        let err = SearchCriteria::new("   ").check().unwrap_err();
        assert!(matches!(err, AppError::Validation { field: Some(ref f), .. } if f == "query"));

        tokio_test::assert_err!(SearchCriteria::new("").check());
    }

    #[test]
    fn test_bounds_rejected() {
        let mut criteria = SearchCriteria::new("planning");
        criteria.maxdoc = 0;
        tokio_test::assert_err!(criteria.check());

        let mut criteria = SearchCriteria::new("planning");
        criteria.maxchunks = 51;
        tokio_test::assert_err!(criteria.check());
    }

    #[test]
    fn test_semantic_query_order() {
        let mut criteria = SearchCriteria::new("q");
        criteria.sector = vec!["Consulting".into()];
        criteria.keywords = vec!["Technical proposal".into(), "".into()];
        criteria.summary = Some("Offer summary".into());
        assert_eq!(
            criteria.semantic_query().as_deref(),
            Some("Offer summary Technical proposal Consulting")
        );

        assert_eq!(SearchCriteria::new("q").semantic_query(), None);
    }

    #[test]
    fn test_exact_groups_skip_empty() {
        let mut criteria = SearchCriteria::new("q");
        criteria.client = vec!["ACME".into(), "Globex".into()];
        criteria.title = vec![" ".into()];
        let groups = criteria.exact_groups();
        assert_eq!(groups, vec![("client", vec!["ACME", "Globex"])]);
    }
}
