//! # Needed Items
//!
//! Extracts the items a field worker says are needed ("LANケーブルが必要",
//! "脚立を用意する") from free-form Japanese work reports, so that a to-do
//! list can be pre-filled when a report is saved.

pub mod aggregation;
pub mod extraction_errors;
pub mod localization;
pub mod morphology;
pub mod need_config;
pub mod need_patterns;
pub mod need_types;
pub mod report_autofill;
pub mod text_processing;
