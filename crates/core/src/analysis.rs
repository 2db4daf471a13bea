//! Boundary for floor-plan analyzer output.
//!
//! Analyzer responses are untrusted. They are parsed against the closed
//! `FloorplanAnalysis` shape and then range-checked; anything else is rejected.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::room::{Calculations, FloorplanAnalysis};
use crate::errors::{ApplicationError, DomainError};

/// External vision collaborator. No implementation ships with the core.
#[async_trait]
pub trait FloorplanAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<FloorplanAnalysis, ApplicationError>;
}

/// Treats its input as an already-produced analyzer response.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordedResponseAnalyzer;

#[async_trait]
impl FloorplanAnalyzer for RecordedResponseAnalyzer {
    async fn analyze(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<FloorplanAnalysis, ApplicationError> {
        if mime_type != "application/json" {
            return Err(DomainError::validation(format!(
                "recorded analyzer responses must be application/json, got `{mime_type}`"
            ))
            .into());
        }
        let json = std::str::from_utf8(image)
            .map_err(|error| DomainError::validation(format!("analysis is not UTF-8: {error}")))?;
        Ok(parse_analysis(json)?)
    }
}

pub fn parse_analysis(json: &str) -> Result<FloorplanAnalysis, DomainError> {
    let analysis = serde_json::from_str::<FloorplanAnalysis>(json)
        .map_err(|error| DomainError::validation(format!("malformed analysis: {error}")))?;
    validate_analysis(&analysis)?;
    Ok(analysis)
}

pub fn validate_analysis(analysis: &FloorplanAnalysis) -> Result<(), DomainError> {
    if analysis.confidence < Decimal::ZERO || analysis.confidence > Decimal::ONE {
        return Err(DomainError::validation(format!(
            "analysis confidence {} is outside 0..=1",
            analysis.confidence
        )));
    }

    for (index, room) in analysis.rooms.iter().enumerate() {
        if room.name.trim().is_empty() {
            return Err(DomainError::validation(format!("room #{index} has an empty name")));
        }
        for (field, value) in [
            ("width", room.width),
            ("height", room.height),
            ("area", room.area),
            ("wallHeight", room.wall_height),
        ] {
            non_negative(&format!("room `{}` {field}", room.name), value)?;
        }
    }

    let Calculations { floor_area, wall_area, ceiling_area, wall_length, .. } =
        &analysis.calculations;
    for (field, value) in [
        ("floorArea", floor_area),
        ("wallArea", wall_area),
        ("ceilingArea", ceiling_area),
        ("wallLength", wall_length),
    ] {
        if let Some(value) = value {
            non_negative(&format!("calculations {field}"), *value)?;
        }
    }

    if let Some(rows) = &analysis.quantities {
        for row in rows {
            if row.item_name.trim().is_empty() || row.category.trim().is_empty() {
                return Err(DomainError::validation(
                    "quantity rows need a category and an item name",
                ));
            }
            non_negative(&format!("quantity `{}`", row.item_name), row.quantity)?;
        }
    }

    Ok(())
}

fn non_negative(label: &str, value: Decimal) -> Result<(), DomainError> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!("{label} must not be negative, got {value}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{parse_analysis, FloorplanAnalyzer, RecordedResponseAnalyzer};
    use crate::domain::room::RoomType;
    use crate::errors::{ApplicationError, DomainError};

    const VALID: &str = r#"{
        "rooms": [
            {"name": "거실", "type": "living", "width": 5, "height": 4, "area": 20, "wallHeight": 2.3},
            {"name": "욕실", "type": "bathroom", "width": 2, "height": 2, "area": 4, "wallHeight": 2.3}
        ],
        "calculations": {"floorArea": 24, "windowCount": 3},
        "fixtures": {"toilets": 1},
        "confidence": 0.82
    }"#;

    #[test]
    fn valid_analysis_parses_into_typed_rooms() {
        let analysis = parse_analysis(VALID).expect("valid analysis");

        assert_eq!(analysis.rooms.len(), 2);
        assert_eq!(analysis.rooms[1].room_type, RoomType::Bathroom);
        assert_eq!(analysis.calculations.floor_area, Some(Decimal::from(24)));
        assert_eq!(analysis.calculations.wall_area, None);
        assert_eq!(analysis.confidence, Decimal::new(82, 2));
        assert!(analysis.quantities.is_none());
    }

    #[test]
    fn missing_calculations_default_to_empty() {
        let analysis = parse_analysis(r#"{"rooms": [], "confidence": 0.4}"#).expect("parse");
        assert_eq!(analysis.calculations, Default::default());
        assert!(analysis.is_low_confidence(Decimal::new(5, 1)));
    }

    #[test]
    fn unknown_fields_and_room_types_are_rejected() {
        let unknown_field = VALID.replace("\"confidence\"", "\"score\": 1, \"confidence\"");
        assert!(matches!(parse_analysis(&unknown_field), Err(DomainError::Validation(_))));

        let unknown_type = VALID.replace("\"bathroom\"", "\"sauna\"");
        assert!(parse_analysis(&unknown_type).is_err());

        let stringly = VALID.replace("\"area\": 20", "\"area\": \"twenty\"");
        assert!(parse_analysis(&stringly).is_err());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let negative = VALID.replace("\"area\": 4", "\"area\": -4");
        assert!(parse_analysis(&negative).is_err());

        let confident = VALID.replace("0.82", "1.5");
        assert!(parse_analysis(&confident).is_err());

        let unnamed = VALID.replace("\"name\": \"거실\"", "\"name\": \" \"");
        assert!(parse_analysis(&unnamed).is_err());
    }

    #[test]
    fn quantity_tables_are_accepted_when_well_formed() {
        let json = r#"{
            "rooms": [],
            "quantities": [
                {"category": "도배", "itemName": "실크 벽지", "quantity": 120, "unit": "㎡"}
            ],
            "confidence": 0.9
        }"#;
        let analysis = parse_analysis(json).expect("parse");
        let rows = analysis.quantities.expect("quantities");
        assert_eq!(rows[0].sub_category, None);
        assert_eq!(rows[0].quantity, Decimal::from(120));
    }

    #[tokio::test]
    async fn recorded_analyzer_parses_json_payloads_only() {
        let analyzer = RecordedResponseAnalyzer;

        let analysis =
            analyzer.analyze(VALID.as_bytes(), "application/json").await.expect("analysis");
        assert_eq!(analysis.rooms.len(), 2);

        let rejected = analyzer.analyze(b"\x89PNG", "image/png").await;
        assert!(matches!(rejected, Err(ApplicationError::Domain(DomainError::Validation(_)))));
    }
}
