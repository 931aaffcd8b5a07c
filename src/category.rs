// 🏷️ Service taxonomy - fine categories and their mega-categories
//
// Category labels are what ends up in the persisted "Raw Data" sheet, so
// `as_str` / `from_label` must round-trip exactly.

use crate::error::{Result, RevenueError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Pensat,
    Epilat,
    Oxygenera,
    Laminare,
    Microneedling,
    ProBrows,
    #[serde(rename = "Pure Solution")]
    PureSolution,
    Peeling,
    Tratament,
    Other,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::Pensat,
        Category::Epilat,
        Category::Oxygenera,
        Category::Laminare,
        Category::Microneedling,
        Category::ProBrows,
        Category::PureSolution,
        Category::Peeling,
        Category::Tratament,
        Category::Other,
    ];

    /// Label as written to the store and report tables
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pensat => "Pensat",
            Category::Epilat => "Epilat",
            Category::Oxygenera => "Oxygenera",
            Category::Laminare => "Laminare",
            Category::Microneedling => "Microneedling",
            Category::ProBrows => "ProBrows",
            Category::PureSolution => "Pure Solution",
            Category::Peeling => "Peeling",
            Category::Tratament => "Tratament",
            Category::Other => "Other",
        }
    }

    /// Parse a stored label. Older sheets carry "DermaPen" as its own
    /// category; it is folded into Microneedling.
    pub fn from_label(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case("DermaPen") {
            return Ok(Category::Microneedling);
        }
        if trimmed.eq_ignore_ascii_case("PureSolution") {
            return Ok(Category::PureSolution);
        }

        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| RevenueError::UnknownCategory(label.to_string()))
    }

    /// Static many-to-one mapping; anything unmapped is "Altele"
    pub fn mega_category(&self) -> MegaCategory {
        match self {
            Category::Pensat | Category::ProBrows | Category::Laminare => MegaCategory::Sprancene,
            Category::Epilat => MegaCategory::Epilare,
            Category::Oxygenera
            | Category::Microneedling
            | Category::Peeling
            | Category::Tratament
            | Category::PureSolution => MegaCategory::Tratamente,
            Category::Other => MegaCategory::Altele,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MEGA CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MegaCategory {
    #[serde(rename = "Sprâncene")]
    Sprancene,
    Epilare,
    Tratamente,
    Altele,
}

impl MegaCategory {
    pub const ALL: [MegaCategory; 4] = [
        MegaCategory::Sprancene,
        MegaCategory::Epilare,
        MegaCategory::Tratamente,
        MegaCategory::Altele,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MegaCategory::Sprancene => "Sprâncene",
            MegaCategory::Epilare => "Epilare",
            MegaCategory::Tratamente => "Tratamente",
            MegaCategory::Altele => "Altele",
        }
    }

    /// Unknown labels fall back to "Altele" rather than failing; the mega
    /// column is always re-derivable from the category.
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case("Sprancene") {
            return MegaCategory::Sprancene;
        }
        MegaCategory::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == trimmed)
            .unwrap_or(MegaCategory::Altele)
    }
}

impl fmt::Display for MegaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.as_str()).unwrap(), category);
        }
    }

    #[test]
    fn test_legacy_dermapen_label() {
        assert_eq!(Category::from_label("DermaPen").unwrap(), Category::Microneedling);
    }

    #[test]
    fn test_unknown_label_is_error() {
        assert!(Category::from_label("Massage").is_err());
    }

    #[test]
    fn test_mega_mapping() {
        assert_eq!(Category::ProBrows.mega_category(), MegaCategory::Sprancene);
        assert_eq!(Category::Laminare.mega_category(), MegaCategory::Sprancene);
        assert_eq!(Category::Epilat.mega_category(), MegaCategory::Epilare);
        assert_eq!(Category::PureSolution.mega_category(), MegaCategory::Tratamente);
        assert_eq!(Category::Other.mega_category(), MegaCategory::Altele);
    }

    #[test]
    fn test_mega_from_label_fallback() {
        assert_eq!(MegaCategory::from_label("Sprâncene"), MegaCategory::Sprancene);
        assert_eq!(MegaCategory::from_label("???"), MegaCategory::Altele);
    }
}
