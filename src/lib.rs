//! Exam Data Manager
//!
//! This crate keeps the roster of exam staff in a document store, ingests
//! exam-duty fee spreadsheets in the background, fills in missing fees
//! through a chat-completions model and serves everything over HTTP.

#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod fee;
pub mod ingest;
pub mod jobs;
pub mod models;
pub mod repository;
pub mod storage;
