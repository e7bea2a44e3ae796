//! Clinical Engine Library
//!
//! A clinical decision support pipeline: free-text symptom extraction,
//! diagnostic plan generation, concurrent evidence gathering against external
//! knowledge sources, and synthesis into a ranked diagnosis with supporting
//! evidence, differentials, and optional clinical trial matches.
//!
//! The caller supplies the external collaborators (guideline search, trial
//! search, optional diagnosis inference) as trait implementations; the engine
//! owns planning, bounded-concurrency execution, progressive reporting, and
//! degrade-on-failure behavior at every stage.

pub mod clients;
pub mod config;
pub mod engine;
pub mod error;
