//! Rate-limited incident report generation for CNA documentation.
//!
//! An axum gateway in front of an OpenAI-compatible completion service.
//! Report generation is bounded per client IP by a fixed-window
//! [`rate_limit::AdmissionController`]; generation itself runs on a pool of
//! queue workers.

pub mod client_ip;
pub mod completion;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod prompts;
pub mod rate_limit;
pub mod state;
pub mod storage;
pub mod worker;
