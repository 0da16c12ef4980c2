//! Promotion decision and the one-bit gate handed from evaluation to registration

use std::fmt;

use crate::errors::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionGate {
    Promote,
    Reject,
}

impl PromotionGate {
    pub fn is_promote(self) -> bool {
        self == PromotionGate::Promote
    }

    /// Persisted form: `1` or `0`, no trailing newline
    pub fn encode(self) -> &'static str {
        match self {
            PromotionGate::Promote => "1",
            PromotionGate::Reject => "0",
        }
    }

    pub fn as_metric(self) -> f64 {
        match self {
            PromotionGate::Promote => 1.0,
            PromotionGate::Reject => 0.0,
        }
    }

    /// Parse a persisted gate. One trailing newline is accepted; anything
    /// else is corrupt.
    pub fn decode(content: &[u8], location: &str) -> Result<Self> {
        let body = content
            .strip_suffix(b"\r\n")
            .or_else(|| content.strip_suffix(b"\n"))
            .unwrap_or(content);
        match body {
            b"1" => Ok(PromotionGate::Promote),
            b"0" => Ok(PromotionGate::Reject),
            _ => Err(PipelineError::CorruptGate {
                location: location.to_string(),
                content: String::from_utf8_lossy(content).into_owned(),
            }),
        }
    }
}

impl fmt::Display for PromotionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromotionGate::Promote => f.write_str("promote"),
            PromotionGate::Reject => f.write_str("reject"),
        }
    }
}

/// Promote when there is no prior model or the new one is strictly better.
/// Ties keep the registered model.
pub fn decide(f1_current: f64, f1_last: Option<f64>) -> PromotionGate {
    match f1_last {
        None => PromotionGate::Promote,
        Some(last) if f1_current > last => PromotionGate::Promote,
        Some(_) => PromotionGate::Reject,
    }
}
