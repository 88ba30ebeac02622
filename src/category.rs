//! Document categories a user can declare before uploading.

use crate::error::DocError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    /// CPF card or Receita Federal printout
    TaxId,
    /// CNH
    DriversLicense,
    /// RG
    NationalId,
}

impl DocumentCategory {
    pub const ALL: [DocumentCategory; 3] = [
        DocumentCategory::TaxId,
        DocumentCategory::DriversLicense,
        DocumentCategory::NationalId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaxId => "tax_id",
            Self::DriversLicense => "drivers_license",
            Self::NationalId => "national_id",
        }
    }

    /// Short code used on Brazilian forms.
    pub fn short_code(&self) -> &'static str {
        match self {
            Self::TaxId => "CPF",
            Self::DriversLicense => "CNH",
            Self::NationalId => "RG",
        }
    }
}

impl fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentCategory {
    type Err = DocError;

    /// Accepts the snake_case name, a dashed variant, or the short code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        match normalized.as_str() {
            "tax_id" | "taxid" | "cpf" => Ok(Self::TaxId),
            "drivers_license" | "driverslicense" | "cnh" => Ok(Self::DriversLicense),
            "national_id" | "nationalid" | "rg" => Ok(Self::NationalId),
            "" => Err(DocError::MissingCategory),
            _ => Err(DocError::UnknownCategory(s.trim().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_names_and_codes() {
        assert_eq!("tax_id".parse::<DocumentCategory>().unwrap(), DocumentCategory::TaxId);
        assert_eq!("CNH".parse::<DocumentCategory>().unwrap(), DocumentCategory::DriversLicense);
        assert_eq!(
            "national-id".parse::<DocumentCategory>().unwrap(),
            DocumentCategory::NationalId
        );
    }

    #[test]
    fn test_blank_is_missing_not_unknown() {
        assert!(matches!(
            "  ".parse::<DocumentCategory>(),
            Err(DocError::MissingCategory)
        ));
        assert!(matches!(
            "passport".parse::<DocumentCategory>(),
            Err(DocError::UnknownCategory(c)) if c == "passport"
        ));
    }

    #[test]
    fn test_display_round_trips() {
        for category in DocumentCategory::ALL {
            assert_eq!(category.to_string().parse::<DocumentCategory>().unwrap(), category);
        }
    }
}
