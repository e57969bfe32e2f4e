//! DraftForge template state
//!
//! A template is an HTML file with literal placeholders plus a JSON schema
//! naming its sections. [`TemplateManager`] tracks which sections were
//! filled, removed or added at runtime, persists that state after every
//! change and keeps a rendered copy on disk. [`TemplateStore`] serializes
//! access per template id.

pub mod export;
pub mod manager;
pub mod registry;
pub mod render;
pub mod schema;
pub mod slug;
pub mod state;

pub use manager::TemplateManager;
pub use registry::TemplateStore;
pub use schema::{SectionSpec, TemplateSchema};
pub use state::{DynamicSection, TemplateState};
