//! Fee estimation for rows without an amount.
//!
//! [`FeeService`] decides which records need a fee, de-duplicates and batches
//! the questions, and hands them to a [`FeeEstimator`]. [`ChatFeeEstimator`]
//! answers them with an OpenAI-compatible chat model.

mod estimator;
mod service;

pub use estimator::{
    ChatFeeEstimator, DEFAULT_FEE_PROMPT, FeeError, FeeEstimator, FeeQuery, parse_fee_reply,
};
pub use service::{FeeService, FeeSummary};
