//! SOC code structure and parent resolution.
//!
//! A SOC code looks like `NN-NNNN`: a two-digit major group prefix and a
//! four-digit suffix whose trailing zeros encode how coarse the code is.
//!
//! | Code      | Level | Meaning                              |
//! |-----------|-------|--------------------------------------|
//! | `15-0000` | 1     | major group                          |
//! | `15-1000` | 2     | minor group                          |
//! | `15-1200` | 3     | broad occupation or renumbered minor |
//! | `15-1250` | 4     | detailed                             |
//! | `15-1252` | 5     | most detailed                        |

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::types::Dataset;

/// Raised when a string is not shaped like `NN-NNNN`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("SOC code '{0}' must be 7 characters long")]
    Length(String),
    #[error("SOC code '{0}' must have the form NN-NNNN")]
    Shape(String),
}

/// A validated SOC classification code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SocCode(String);

impl SocCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-digit major group prefix, e.g. `"15"` for `15-1252`.
    pub fn major_group(&self) -> &str {
        &self.0[..2]
    }

    fn suffix(&self) -> &str {
        &self.0[3..]
    }

    /// Hierarchy depth derived from the trailing zeros of the suffix.
    pub fn level(&self) -> u8 {
        let zeros = self.suffix().bytes().rev().take_while(|b| *b == b'0').count();
        (5 - zeros) as u8
    }

    pub fn is_top_level(&self) -> bool {
        self.suffix() == "0000"
    }

    fn with_suffix(&self, suffix: &str) -> SocCode {
        SocCode(format!("{}-{}", self.major_group(), suffix))
    }
}

impl FromStr for SocCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 7 {
            return Err(CodeError::Length(s.to_string()));
        }
        let bytes = s.as_bytes();
        let well_formed = bytes[2] == b'-'
            && bytes[..2].iter().all(u8::is_ascii_digit)
            && bytes[3..].iter().all(u8::is_ascii_digit);
        if !well_formed {
            return Err(CodeError::Shape(s.to_string()));
        }
        Ok(SocCode(s.to_string()))
    }
}

impl TryFrom<String> for SocCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SocCode> for String {
    fn from(code: SocCode) -> Self {
        code.0
    }
}

impl fmt::Display for SocCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which minor-group form to pick for a broad code when neither candidate
/// is known to exist.
///
/// SOC 2018 renumbered some minor groups from `NN-N000` (legacy) to
/// `NN-NN00`, so both shapes appear in mixed-era datasets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParentFallback {
    #[default]
    Legacy,
    Renumbered,
}

impl FromStr for ParentFallback {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(ParentFallback::Legacy),
            "renumbered" => Ok(ParentFallback::Renumbered),
            other => Err(anyhow::anyhow!("unknown parent fallback '{other}'")),
        }
    }
}

/// Returns the parent of `code`, or `None` for a major group.
///
/// For broad codes (`NN-NNN0`) the minor-group parent is ambiguous. When
/// `known` is supplied the candidate present in it wins, renumbered form
/// first; otherwise `policy` decides.
pub fn parent_of(
    code: &SocCode,
    known: Option<&HashSet<SocCode>>,
    policy: ParentFallback,
) -> Option<SocCode> {
    let suffix = code.suffix();
    if code.is_top_level() {
        return None;
    }
    if suffix.ends_with("00") {
        return Some(code.with_suffix("0000"));
    }
    if suffix.ends_with('0') {
        let renumbered = code.with_suffix(&format!("{}00", &suffix[..2]));
        let legacy = code.with_suffix(&format!("{}000", &suffix[..1]));
        if renumbered == legacy {
            return Some(legacy);
        }
        if let Some(known) = known {
            if known.contains(&renumbered) {
                return Some(renumbered);
            }
            if known.contains(&legacy) {
                return Some(legacy);
            }
        }
        trace!(%code, ?policy, "ambiguous minor group parent, using fallback");
        return Some(match policy {
            ParentFallback::Legacy => legacy,
            ParentFallback::Renumbered => renumbered,
        });
    }
    Some(code.with_suffix(&format!("{}0", &suffix[..3])))
}

/// Walks up from `code` until an ancestor present in `available` is found.
///
/// Bridges intermediate levels that were suppressed from a dataset.
pub fn nearest_available_ancestor(
    code: &SocCode,
    available: &HashSet<SocCode>,
    policy: ParentFallback,
) -> Option<SocCode> {
    let mut ancestor = parent_of(code, Some(available), policy);
    while let Some(candidate) = ancestor {
        if available.contains(&candidate) {
            return Some(candidate);
        }
        ancestor = parent_of(&candidate, Some(available), policy);
    }
    None
}

/// Parent of `code` disambiguated against every occupation in the snapshot.
pub fn resolve_parent(
    dataset: &Dataset,
    code: &SocCode,
    policy: ParentFallback,
) -> Option<SocCode> {
    let known: HashSet<SocCode> = dataset
        .occupations
        .iter()
        .map(|o| o.soc_code.clone())
        .collect();
    parent_of(code, Some(&known), policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> SocCode {
        s.parse().unwrap()
    }

    fn set(codes: &[&str]) -> HashSet<SocCode> {
        codes.iter().map(|c| code(c)).collect()
    }

    #[test]
    fn test_rejects_malformed_codes() {
        assert!(matches!("15-125".parse::<SocCode>(), Err(CodeError::Length(_))));
        assert!(matches!("151-252".parse::<SocCode>(), Err(CodeError::Shape(_))));
        assert!(matches!("AB-1252".parse::<SocCode>(), Err(CodeError::Shape(_))));
    }

    #[test]
    fn test_level_from_trailing_zeros() {
        assert_eq!(code("15-0000").level(), 1);
        assert_eq!(code("15-1000").level(), 2);
        assert_eq!(code("15-1200").level(), 3);
        assert_eq!(code("15-1250").level(), 4);
        assert_eq!(code("15-1252").level(), 5);
    }

    #[test]
    fn test_top_level_has_no_parent() {
        assert_eq!(parent_of(&code("11-0000"), None, ParentFallback::Legacy), None);
    }

    #[test]
    fn test_parent_steps() {
        let p = ParentFallback::Legacy;
        assert_eq!(parent_of(&code("15-1252"), None, p), Some(code("15-1250")));
        assert_eq!(parent_of(&code("15-1000"), None, p), Some(code("15-0000")));
        assert_eq!(parent_of(&code("15-1200"), None, p), Some(code("15-0000")));
        assert_eq!(parent_of(&code("11-1010"), None, p), Some(code("11-1000")));
    }

    #[test]
    fn test_ambiguous_parent_defaults_to_policy() {
        assert_eq!(
            parent_of(&code("15-1250"), None, ParentFallback::Legacy),
            Some(code("15-1000"))
        );
        assert_eq!(
            parent_of(&code("15-1250"), None, ParentFallback::Renumbered),
            Some(code("15-1200"))
        );
    }

    #[test]
    fn test_ambiguous_parent_prefers_known_code() {
        let known = set(&["15-0000", "15-1200"]);
        assert_eq!(
            parent_of(&code("15-1250"), Some(&known), ParentFallback::Legacy),
            Some(code("15-1200"))
        );

        let known = set(&["15-0000", "15-1000"]);
        assert_eq!(
            parent_of(&code("15-1250"), Some(&known), ParentFallback::Renumbered),
            Some(code("15-1000"))
        );
    }

    #[test]
    fn test_parent_chain_terminates() {
        for policy in [ParentFallback::Legacy, ParentFallback::Renumbered] {
            for start in ["15-1252", "15-1250", "15-1200", "29-1141", "11-9199"] {
                let mut current = Some(code(start));
                let mut steps = 0;
                while let Some(c) = current {
                    current = parent_of(&c, None, policy);
                    steps += 1;
                    assert!(steps <= 5, "chain from {start} did not terminate");
                }
            }
        }
    }

    #[test]
    fn test_nearest_ancestor_skips_missing_levels() {
        let available = set(&["11-0000", "11-1011"]);
        assert_eq!(
            nearest_available_ancestor(&code("11-1011"), &available, ParentFallback::Legacy),
            Some(code("11-0000"))
        );
    }

    #[test]
    fn test_nearest_ancestor_exhausted() {
        let available = set(&["13-0000"]);
        assert_eq!(
            nearest_available_ancestor(&code("11-1011"), &available, ParentFallback::Legacy),
            None
        );
    }

    #[test]
    fn test_serde_rejects_malformed_code() {
        let ok: Result<SocCode, _> = serde_json::from_str("\"11-1011\"");
        assert!(ok.is_ok());
        let bad: Result<SocCode, _> = serde_json::from_str("\"11_1011\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_parse_fallback_policy() {
        assert_eq!("Legacy".parse::<ParentFallback>().unwrap(), ParentFallback::Legacy);
        assert_eq!(
            "renumbered".parse::<ParentFallback>().unwrap(),
            ParentFallback::Renumbered
        );
        assert!("newest".parse::<ParentFallback>().is_err());
    }
}
