//! API handlers module

pub mod corpus;
pub mod generate;
pub mod health;
pub mod inject;
pub mod search;
pub mod stream;
pub mod templates;
