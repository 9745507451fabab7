pub mod children;
pub mod cli;
pub mod collections;
pub mod config;
pub mod detect;
pub mod error;
pub mod format;
pub mod index;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod sampling;
pub mod sort;
pub mod validate;
