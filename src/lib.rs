//! signatrix — streaming indicator engine and condition expression evaluator.
//!
//! Candles stream into per-subscription indicator instances; their results
//! flow through the pipeline adapter into evaluation contexts, against which
//! the condition engine walks typed expression trees and emits evaluation
//! results for the signal-generation layer.

pub mod common;
pub mod config;
pub mod evaluator;
pub mod indicators;
pub mod logging;
pub mod models;
pub mod pipeline;

pub use evaluator::engine::ConditionEvaluator;
pub use indicators::IndicatorError;
pub use pipeline::adapter::IndicatorPipeline;
