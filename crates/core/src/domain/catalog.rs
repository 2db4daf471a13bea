use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Material quality tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductGrade {
    Standard,
    Mid,
    Premium,
}

impl ProductGrade {
    pub const ALL: [ProductGrade; 3] = [Self::Standard, Self::Mid, Self::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Mid => "mid",
            Self::Premium => "premium",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Standard => "일반",
            Self::Mid => "중급",
            Self::Premium => "고급",
        }
    }

    /// Suffix appended to a derived quote number; the standard tier has none.
    pub fn quote_number_suffix(&self) -> Option<&'static str> {
        match self {
            Self::Standard => None,
            Self::Mid | Self::Premium => Some(self.label()),
        }
    }

    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "일반" | "standard" => Ok(Self::Standard),
            "중급" | "mid" => Ok(Self::Mid),
            "고급" | "premium" => Ok(Self::Premium),
            other => Err(DomainError::validation(format!(
                "unsupported grade `{other}` (expected 일반|중급|고급)"
            ))),
        }
    }
}

impl fmt::Display for ProductGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized tag linking quote items to grade-specific catalog entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialFamily {
    Flooring,
    Tile,
    Wallpaper,
    Paint,
    Lighting,
    Door,
    BathroomPackage,
    Demolition,
    WasteDisposal,
}

impl MaterialFamily {
    pub const ALL: [MaterialFamily; 9] = [
        Self::Flooring,
        Self::Tile,
        Self::Wallpaper,
        Self::Paint,
        Self::Lighting,
        Self::Door,
        Self::BathroomPackage,
        Self::Demolition,
        Self::WasteDisposal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flooring => "flooring",
            Self::Tile => "tile",
            Self::Wallpaper => "wallpaper",
            Self::Paint => "paint",
            Self::Lighting => "lighting",
            Self::Door => "door",
            Self::BathroomPackage => "bathroom_package",
            Self::Demolition => "demolition",
            Self::WasteDisposal => "waste_disposal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|family| family.as_str() == value.trim())
    }

    /// Free-text keywords that identify the family in item names and categories.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Flooring => &["마루", "장판"],
            Self::Tile => &["타일"],
            Self::Wallpaper => &["도배", "벽지"],
            Self::Paint => &["도장", "페인트"],
            Self::Lighting => &["조명", "전등"],
            Self::Door => &["도어", "문짝"],
            Self::BathroomPackage => &["욕실 리모델링", "욕실 패키지"],
            Self::Demolition => &["철거"],
            Self::WasteDisposal => &["폐기물"],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaborCost {
    pub labor_type: String,
    pub daily_rate: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPrice {
    pub category: String,
    pub sub_category: Option<String>,
    pub product_name: String,
    pub unit: String,
    pub unit_price: Decimal,
    pub product_grade: ProductGrade,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeCost {
    pub cost_name: String,
    pub category: String,
    pub unit: String,
    pub unit_price: Decimal,
    pub labor_ratio: Decimal,
}

#[cfg(test)]
mod tests {
    use super::{MaterialFamily, ProductGrade};

    #[test]
    fn grade_parses_korean_labels_and_codes() {
        assert_eq!(ProductGrade::parse("고급").expect("premium"), ProductGrade::Premium);
        assert_eq!(ProductGrade::parse(" Mid ").expect("mid"), ProductGrade::Mid);
        assert_eq!(ProductGrade::parse("일반").expect("standard"), ProductGrade::Standard);
        assert!(ProductGrade::parse("최고급").is_err());
    }

    #[test]
    fn only_standard_grade_omits_the_quote_number_suffix() {
        assert_eq!(ProductGrade::Standard.quote_number_suffix(), None);
        assert_eq!(ProductGrade::Mid.quote_number_suffix(), Some("중급"));
        assert_eq!(ProductGrade::Premium.quote_number_suffix(), Some("고급"));
    }

    #[test]
    fn family_codes_round_trip() {
        for family in MaterialFamily::ALL {
            assert_eq!(MaterialFamily::parse(family.as_str()), Some(family));
        }
        assert_eq!(MaterialFamily::parse("roofing"), None);
    }
}
