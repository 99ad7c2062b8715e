// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

/// Crate-wide error taxonomy.
///
/// Fatal errors always carry the offending values in their message so callers
/// can report them without re-deriving context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BcpError {
    /// Invalid caller-supplied value: bad change-point count, insufficient
    /// series length, malformed artifact, out-of-range sampler setting.
    InvalidInput(String),
    /// The sampler failed to produce posterior draws. Never retried.
    Sampling(String),
    /// Posterior draws violated the shape contract expected by the
    /// summarizer. Signals a builder/sampler mismatch, never swallowed.
    Summarization(String),
    /// Non-finite value in an internal computation.
    NumericalIssue(String),
    /// I/O or clock failure while persisting artifacts.
    ResourceLimit(String),
}

impl BcpError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn sampling(msg: impl Into<String>) -> Self {
        Self::Sampling(msg.into())
    }

    pub fn summarization(msg: impl Into<String>) -> Self {
        Self::Summarization(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    pub fn resource_limit(msg: impl Into<String>) -> Self {
        Self::ResourceLimit(msg.into())
    }
}

impl fmt::Display for BcpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::Sampling(msg) => write!(f, "sampling failed: {msg}"),
            Self::Summarization(msg) => write!(f, "summarization contract violation: {msg}"),
            Self::NumericalIssue(msg) => write!(f, "numerical issue: {msg}"),
            Self::ResourceLimit(msg) => write!(f, "resource limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for BcpError {}
