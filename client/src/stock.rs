//! Stock-code inventory accounting for seller submissions
//!
//! A seller pastes one code (key, credential, account) per line. A block is
//! either single-use (one sale per code) or shared-reusable (each code can be
//! sold up to `usage_cap` times).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of codes accepted in a single block.
pub const MAX_CODES: usize = 1000;
/// Bounds for the shared-reusable usage cap.
pub const MIN_USAGE_CAP: u32 = 2;
pub const MAX_USAGE_CAP: u32 = 50;

/// Stock validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("duplicate codes present")]
    Duplicates,
    #[error("at least one code required")]
    Empty,
    #[error("too many codes")]
    TooMany,
    #[error("usage cap must be between 2 and 50")]
    UsageCapOutOfRange,
}

/// How the codes in a block are sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stockMode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockMode {
    SingleUse,
    SharedReusable {
        #[serde(rename = "usageCap")]
        usage_cap: u32,
    },
}

impl StockMode {
    fn units_per_code(&self) -> u32 {
        match self {
            StockMode::SingleUse => 1,
            StockMode::SharedReusable { usage_cap } => *usage_cap,
        }
    }
}

/// A validated block of stock codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockBlock {
    codes: Vec<String>,
    mode: StockMode,
}

impl StockBlock {
    /// Parse and validate a pasted block.
    ///
    /// Lines are split on `\n` and `\r`, trimmed, and blank lines dropped.
    /// Comparison for duplicates is case-sensitive.
    pub fn parse(text: &str, mode: StockMode) -> Result<Self, StockError> {
        let codes = split_codes(text);

        let unique: HashSet<&str> = codes.iter().map(String::as_str).collect();
        if unique.len() != codes.len() {
            return Err(StockError::Duplicates);
        }
        if codes.is_empty() {
            return Err(StockError::Empty);
        }
        if codes.len() > MAX_CODES {
            return Err(StockError::TooMany);
        }
        if let StockMode::SharedReusable { usage_cap } = mode {
            if !(MIN_USAGE_CAP..=MAX_USAGE_CAP).contains(&usage_cap) {
                return Err(StockError::UsageCapOutOfRange);
            }
        }

        Ok(Self { codes, mode })
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn mode(&self) -> StockMode {
        self.mode
    }

    pub fn code_count(&self) -> usize {
        self.codes.len()
    }

    /// Total number of sales this block can satisfy.
    pub fn sellable_units(&self) -> u64 {
        self.codes.len() as u64 * u64::from(self.mode.units_per_code())
    }

    pub fn into_codes(self) -> Vec<String> {
        self.codes
    }
}

/// Per-keystroke summary of a block, as shown next to the text area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSummary {
    pub valid: bool,
    pub message: String,
    pub code_count: usize,
    pub sellable_units: u64,
}

/// Evaluate a block without keeping the parsed codes.
///
/// On failure `code_count` still reports the non-blank lines found and
/// `sellable_units` is zero.
pub fn summarize(text: &str, mode: StockMode) -> StockSummary {
    match StockBlock::parse(text, mode) {
        Ok(block) => StockSummary {
            valid: true,
            message: format!(
                "{} codes, {} sellable units",
                block.code_count(),
                block.sellable_units()
            ),
            code_count: block.code_count(),
            sellable_units: block.sellable_units(),
        },
        Err(e) => StockSummary {
            valid: false,
            message: e.to_string(),
            code_count: split_codes(text).len(),
            sellable_units: 0,
        },
    }
}

fn split_codes(text: &str) -> Vec<String> {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
