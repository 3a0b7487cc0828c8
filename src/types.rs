use std::str::FromStr;
use serde::Deserialize;

/// Case sensitivity used for all path comparisons in the access hierarchies.
///
/// Fixed at plan construction to reflect the host filesystem; every
/// hierarchy created for one plan shares the same value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

impl Default for CaseSensitivity {
    fn default() -> Self {
        CaseSensitivity::Sensitive
    }
}

impl CaseSensitivity {
    /// Compare two path segments under this sensitivity.
    pub fn segments_equal(self, a: &str, b: &str) -> bool {
        match self {
            CaseSensitivity::Sensitive => a == b,
            CaseSensitivity::Insensitive => a.eq_ignore_ascii_case(b),
        }
    }
}

impl FromStr for CaseSensitivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sensitive" => Ok(CaseSensitivity::Sensitive),
            "insensitive" => Ok(CaseSensitivity::Insensitive),
            other => Err(format!(
                "invalid case sensitivity: {other} (expected \"sensitive\" or \"insensitive\")"
            )),
        }
    }
}
