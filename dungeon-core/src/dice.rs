//! Dice formula parsing and rolling.
//!
//! Catalog entries describe damage and healing as compact formula strings:
//! `"2d6"` rolls two six-sided dice, `"3"` is a flat value, and `"40%"`
//! resolves to 40% (rounded up) of a caller-supplied reference value, such
//! as the defender's current stat.

use crate::random::RandomSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice formula parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("invalid die size in {0}")]
    InvalidDieSize(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FormulaKind {
    /// `NdM`: N independent uniform rolls in `[1, M]`, summed.
    Roll { count: u32, sides: u32 },
    /// A literal value.
    Flat(i64),
    /// `p%`: ceil(p/100 * reference).
    Percent(u32),
}

/// A parsed dice formula. Serializes back to its source string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceFormula {
    kind: FormulaKind,
    original: String,
}

impl DiceFormula {
    /// Parse a formula string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let original = notation.trim().to_lowercase();
        if original.is_empty() {
            return Err(DiceError::InvalidNotation(notation.to_string()));
        }

        let kind = if let Some(d_pos) = original.find('d') {
            let count_str = &original[..d_pos];
            let sides_str = &original[d_pos + 1..];

            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(original.clone()))?
            };
            let sides: u32 = sides_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(original.clone()))?;

            if count == 0 || sides == 0 {
                return Err(DiceError::InvalidDieSize(original.clone()));
            }

            FormulaKind::Roll { count, sides }
        } else if let Some(percent_str) = original.strip_suffix('%') {
            let percent: u32 = percent_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(original.clone()))?;
            FormulaKind::Percent(percent)
        } else {
            let value: i64 = original
                .parse()
                .map_err(|_| DiceError::InvalidNotation(original.clone()))?;
            FormulaKind::Flat(value)
        };

        Ok(Self { kind, original })
    }

    /// Shorthand for a flat value.
    pub fn flat(value: i64) -> Self {
        Self {
            kind: FormulaKind::Flat(value),
            original: value.to_string(),
        }
    }

    /// Whether this formula resolves against a reference value.
    pub fn needs_reference(&self) -> bool {
        matches!(self.kind, FormulaKind::Percent(_))
    }

    /// Resolve the formula to an integer. Percentage formulas are taken
    /// against `reference`; the other kinds ignore it.
    pub fn resolve(&self, reference: i64, rng: &mut dyn RandomSource) -> i64 {
        match self.kind {
            FormulaKind::Flat(value) => value,
            FormulaKind::Percent(percent) => {
                ((percent as f64 / 100.0) * reference as f64).ceil() as i64
            }
            FormulaKind::Roll { count, sides } => (0..count).map(|_| rng.die(sides)).sum(),
        }
    }

    /// Resolve a formula that carries no reference value.
    pub fn roll(&self, rng: &mut dyn RandomSource) -> i64 {
        self.resolve(0, rng)
    }
}

impl Default for DiceFormula {
    fn default() -> Self {
        Self::flat(1)
    }
}

impl FromStr for DiceFormula {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceFormula::parse(s)
    }
}

impl TryFrom<String> for DiceFormula {
    type Error = DiceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        DiceFormula::parse(&s)
    }
}

impl From<DiceFormula> for String {
    fn from(formula: DiceFormula) -> Self {
        formula.original
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}
