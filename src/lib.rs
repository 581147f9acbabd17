//! Classifies links pulled from job-search mail, recovers what metadata the
//! URL and message allow, and stores the job-related ones once per owner.

pub mod categorizer;
pub mod classifier;
pub mod config;
pub mod db;
pub mod email;
pub mod extractor;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod signals;
pub mod tables;

pub use categorizer::Categorizer;
pub use classifier::Classifier;
pub use extractor::Extractor;
pub use normalize::normalize;
pub use pipeline::{BatchOptions, Pipeline};
pub use tables::Tables;
