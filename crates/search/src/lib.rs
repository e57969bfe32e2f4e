//! DraftForge retrieval
//!
//! - [`SearchCriteria`]: structured search input
//! - [`RetrievalEngine`]: exact filter, semantic ranking, scoped chunk retrieval
//! - [`Indexer`]: corpus ingestion (document vector + chunked page text)

pub mod criteria;
pub mod ingest;
pub mod retrieval;

pub use criteria::SearchCriteria;
pub use ingest::{DocumentUpload, IngestReport, Indexer, PageText};
pub use retrieval::{RetrievalEngine, SearchNotice, SearchOutcome};

#[cfg(test)]
pub(crate) mod testing;
