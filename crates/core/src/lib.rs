//! Auto-categorization engine: rule, keyword, ML and entity strategies fused
//! into one weighted, explained confidence per category.

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod definitions;
pub mod engine;
pub mod ensemble;
pub mod entities;
pub mod error;
pub mod events;
pub mod explain;
pub mod keywords;
pub mod ml;
pub mod models;
pub mod pipeline;
pub mod rules;
pub mod vectorstore;
pub mod weights;

pub use engine::{AutoCategorizer, Collaborators};
pub use error::CategorizeError;
