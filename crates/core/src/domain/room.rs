use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Bedroom,
    Living,
    Kitchen,
    Bathroom,
    Balcony,
    Utility,
    Hallway,
    Other,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bedroom => "bedroom",
            Self::Living => "living",
            Self::Kitchen => "kitchen",
            Self::Bathroom => "bathroom",
            Self::Balcony => "balcony",
            Self::Utility => "utility",
            Self::Hallway => "hallway",
            Self::Other => "other",
        }
    }

    /// Rooms that receive wood flooring.
    pub fn is_living_space(&self) -> bool {
        matches!(self, Self::Bedroom | Self::Living)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoomAnalysis {
    pub name: String,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub width: Decimal,
    pub height: Decimal,
    pub area: Decimal,
    pub wall_height: Decimal,
}

/// Collaborator-supplied measurements; every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Calculations {
    pub floor_area: Option<Decimal>,
    pub wall_area: Option<Decimal>,
    pub ceiling_area: Option<Decimal>,
    pub wall_length: Option<Decimal>,
    pub window_count: Option<u32>,
    pub door_count: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QuantityTableRow {
    pub category: String,
    pub sub_category: Option<String>,
    pub item_name: String,
    pub quantity: Decimal,
    pub unit: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Fixtures {
    pub toilets: Option<u32>,
    pub sinks: Option<u32>,
    pub bathtubs: Option<u32>,
    pub showers: Option<u32>,
}

/// Validated output of the floor-plan analyzer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FloorplanAnalysis {
    pub rooms: Vec<RoomAnalysis>,
    #[serde(default)]
    pub calculations: Calculations,
    pub fixtures: Option<Fixtures>,
    /// When present, replaces geometric estimation entirely.
    pub quantities: Option<Vec<QuantityTableRow>>,
    pub confidence: Decimal,
}

impl FloorplanAnalysis {
    pub fn is_low_confidence(&self, threshold: Decimal) -> bool {
        self.confidence < threshold
    }
}
