//! Turns an analysis into a priced draft quote.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::catalog::PricingCatalog;
use crate::cpq::grade::{classify_text, FamilyMatch, GradeFamilyTable};
use crate::cpq::pricing::{CostAggregator, CostInput};
use crate::cpq::quantity::{round_up, EstimatedAreas, MaterialLine, QuantityEstimator, AREA_UNIT};
use crate::domain::catalog::{MaterialFamily, ProductGrade};
use crate::domain::quote::{CostType, CustomerInfo, PropertyInfo, Quote, QuoteItem};
use crate::domain::room::{FloorplanAnalysis, QuantityTableRow};
use crate::errors::DomainError;

/// Trade labor derived from material quantities: (family, labor type, ㎡ per day).
const TRADE_PRODUCTIVITY: [(MaterialFamily, &str, i64); 3] = [
    (MaterialFamily::Wallpaper, "도배공", 35),
    (MaterialFamily::Flooring, "마루 시공", 30),
    (MaterialFamily::Tile, "타일공", 15),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposeRequest {
    pub quote_number: String,
    pub customer: CustomerInfo,
    pub property: PropertyInfo,
    pub estimate_id: Option<String>,
    pub floorplan_id: Option<String>,
    pub grade: ProductGrade,
    pub analysis: FloorplanAnalysis,
    pub vat_enabled: bool,
    pub discount_amount: Decimal,
    pub discount_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositionWarning {
    LowConfidence { confidence: Decimal, threshold: Decimal },
    UnpricedLine { item_name: String },
    MissingLaborRate { labor_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedQuote {
    pub quote: Quote,
    /// Absent when the analysis supplied its own quantity table.
    pub areas: Option<EstimatedAreas>,
    pub warnings: Vec<CompositionWarning>,
}

pub struct QuoteComposer<C, A> {
    catalog: C,
    aggregator: A,
    table: GradeFamilyTable,
    estimator: QuantityEstimator,
    min_confidence: Decimal,
}

impl<C, A> QuoteComposer<C, A>
where
    C: PricingCatalog,
    A: CostAggregator,
{
    pub fn new(catalog: C, aggregator: A, min_confidence: Decimal) -> Self {
        Self {
            catalog,
            aggregator,
            table: GradeFamilyTable::standard(),
            estimator: QuantityEstimator::new(),
            min_confidence,
        }
    }

    pub fn compose(&self, request: ComposeRequest) -> Result<ComposedQuote, DomainError> {
        if request.quote_number.trim().is_empty() {
            return Err(DomainError::validation("quote number must not be empty"));
        }
        if request.customer.name.trim().is_empty() {
            return Err(DomainError::validation("customer name must not be empty"));
        }

        let mut warnings = Vec::new();
        if request.analysis.is_low_confidence(self.min_confidence) {
            warnings.push(CompositionWarning::LowConfidence {
                confidence: request.analysis.confidence,
                threshold: self.min_confidence,
            });
        }

        let (lines, areas) = match &request.analysis.quantities {
            Some(rows) => (rows.iter().map(line_from_row).collect::<Vec<_>>(), None),
            None => {
                let analysis = &request.analysis;
                (
                    self.estimator.estimate(&analysis.rooms, &analysis.calculations),
                    Some(self.estimator.areas(&analysis.rooms, &analysis.calculations)),
                )
            }
        };

        let mut items = lines
            .iter()
            .map(|line| self.price_line(line, request.grade, &mut warnings))
            .collect::<Vec<_>>();
        items.extend(self.labor_lines(&lines, &mut warnings));
        for (index, item) in items.iter_mut().enumerate() {
            item.sort_order = i32::try_from(index + 1).unwrap_or(i32::MAX);
        }

        let breakdown = self.aggregator.aggregate_with(
            &items,
            CostInput::new(request.discount_amount, request.vat_enabled),
        )?;

        let mut quote = Quote::draft(request.quote_number, request.customer);
        quote.property = request.property;
        quote.estimate_id = request.estimate_id;
        quote.floorplan_id = request.floorplan_id;
        quote.grade = request.grade;
        quote.discount_reason = request.discount_reason;
        quote.items = items;
        quote.apply_breakdown(&breakdown);

        Ok(ComposedQuote { quote, areas, warnings })
    }

    fn price_line(
        &self,
        line: &MaterialLine,
        grade: ProductGrade,
        warnings: &mut Vec<CompositionWarning>,
    ) -> QuoteItem {
        let entry = line.family.and_then(|family| {
            self.table
                .resolve(&self.catalog, family, grade)
                .or_else(|| self.table.resolve(&self.catalog, family, ProductGrade::Standard))
        });

        let mut item = match entry {
            Some(entry) => {
                let mut item = QuoteItem::new(
                    line.category.clone(),
                    entry.name(),
                    line.quantity,
                    line.unit.clone(),
                    entry.unit_price(),
                    entry.cost_type(),
                );
                item.sub_category = Some(line.item_name.clone());
                item.labor_ratio = entry.labor_ratio();
                item
            }
            None => {
                warnings
                    .push(CompositionWarning::UnpricedLine { item_name: line.item_name.clone() });
                let mut item = QuoteItem::new(
                    line.category.clone(),
                    line.item_name.clone(),
                    line.quantity,
                    line.unit.clone(),
                    Decimal::ZERO,
                    line.cost_type,
                );
                item.sub_category = line.sub_category.clone();
                item
            }
        };
        item.family = line.family;
        item.notes = line.room.clone();
        item
    }

    fn labor_lines(
        &self,
        lines: &[MaterialLine],
        warnings: &mut Vec<CompositionWarning>,
    ) -> Vec<QuoteItem> {
        TRADE_PRODUCTIVITY
            .iter()
            .filter_map(|(family, labor_type, per_day)| {
                let area = lines
                    .iter()
                    .filter(|line| line.family == Some(*family) && line.unit == AREA_UNIT)
                    .map(|line| line.quantity)
                    .sum::<Decimal>();
                if area.is_zero() {
                    return None;
                }

                let Some(rate) = self.catalog.lookup_labor(labor_type) else {
                    warnings.push(CompositionWarning::MissingLaborRate {
                        labor_type: labor_type.to_string(),
                    });
                    return None;
                };
                let days = round_up(area / Decimal::from(*per_day));
                Some(QuoteItem::new(
                    "인건비",
                    rate.labor_type.clone(),
                    days,
                    "인",
                    rate.daily_rate,
                    CostType::Labor,
                ))
            })
            .collect()
    }
}

fn line_from_row(row: &QuantityTableRow) -> MaterialLine {
    let family = match classify_text(&[
        Some(row.item_name.as_str()),
        row.sub_category.as_deref(),
        Some(row.category.as_str()),
    ]) {
        FamilyMatch::Matched(family) => Some(family),
        FamilyMatch::Ambiguous(_) | FamilyMatch::Unmatched => None,
    };
    let cost_type = match family {
        Some(MaterialFamily::Demolition)
        | Some(MaterialFamily::WasteDisposal)
        | Some(MaterialFamily::BathroomPackage) => CostType::Composite,
        _ => CostType::Material,
    };

    MaterialLine {
        category: row.category.clone(),
        sub_category: row.sub_category.clone(),
        item_name: row.item_name.clone(),
        quantity: round_up(row.quantity),
        unit: row.unit.clone(),
        family,
        cost_type,
        room: None,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ComposeRequest, CompositionWarning, QuoteComposer};
    use crate::cpq::catalog::fixtures::sample_catalog;
    use crate::cpq::catalog::Catalog;
    use crate::cpq::pricing::DeterministicCostAggregator;
    use crate::domain::catalog::{MaterialFamily, ProductGrade};
    use crate::domain::quote::{CostType, CustomerInfo, PropertyInfo};
    use crate::domain::room::{
        Calculations, FloorplanAnalysis, QuantityTableRow, RoomAnalysis, RoomType,
    };

    fn room(name: &str, room_type: RoomType, area: i64) -> RoomAnalysis {
        RoomAnalysis {
            name: name.to_string(),
            room_type,
            width: Decimal::ZERO,
            height: Decimal::ZERO,
            area: Decimal::from(area),
            wall_height: Decimal::new(23, 1),
        }
    }

    fn request(analysis: FloorplanAnalysis, grade: ProductGrade) -> ComposeRequest {
        ComposeRequest {
            quote_number: "Q-20261018-007".to_string(),
            customer: CustomerInfo { name: "정하늘".into(), ..Default::default() },
            property: PropertyInfo {
                address: Some("서울시 마포구".into()),
                property_type: Some("아파트".into()),
                size: Some(Decimal::from(24)),
            },
            estimate_id: Some("est-1".into()),
            floorplan_id: Some("fp-1".into()),
            grade,
            analysis,
            vat_enabled: true,
            discount_amount: Decimal::ZERO,
            discount_reason: None,
        }
    }

    fn composer() -> QuoteComposer<Catalog, DeterministicCostAggregator> {
        QuoteComposer::new(
            sample_catalog(),
            DeterministicCostAggregator::default(),
            Decimal::new(5, 1),
        )
    }

    fn apartment(confidence: Decimal) -> FloorplanAnalysis {
        FloorplanAnalysis {
            rooms: vec![
                room("침실1", RoomType::Bedroom, 10),
                room("거실", RoomType::Living, 20),
                room("주방", RoomType::Kitchen, 8),
                room("욕실", RoomType::Bathroom, 4),
            ],
            calculations: Calculations::default(),
            fixtures: None,
            quantities: None,
            confidence,
        }
    }

    #[test]
    fn estimated_lines_are_priced_at_the_requested_grade() {
        let composed = composer()
            .compose(request(apartment(Decimal::new(9, 1)), ProductGrade::Mid))
            .expect("compose");
        let quote = &composed.quote;

        let flooring = quote
            .items
            .iter()
            .find(|item| {
                item.family == Some(MaterialFamily::Flooring)
                    && item.cost_type == CostType::Material
            })
            .expect("flooring line");
        assert_eq!(flooring.item_name, "강마루 12mm");
        assert_eq!(flooring.quantity, Decimal::from(33));
        assert_eq!(flooring.total_price, Decimal::from(33 * 48_000));
        assert_eq!(flooring.sub_category.as_deref(), Some("거실/침실 마루"));

        let demolition = quote
            .items
            .iter()
            .find(|item| item.family == Some(MaterialFamily::Demolition))
            .expect("demolition line");
        assert_eq!(demolition.cost_type, CostType::Composite);
        assert_eq!(demolition.labor_ratio, Some(Decimal::new(70, 2)));

        assert_eq!(quote.grade, ProductGrade::Mid);
        assert_eq!(quote.estimate_id.as_deref(), Some("est-1"));
        assert!(quote.cost_invariants_hold());
        assert!(quote.vat_amount > Decimal::ZERO);
        assert!(composed.warnings.is_empty());
        assert_eq!(composed.areas.map(|areas| areas.floor_area), Some(Decimal::from(42)));
    }

    #[test]
    fn trade_labor_is_added_per_family() {
        let composed = composer()
            .compose(request(apartment(Decimal::ONE), ProductGrade::Standard))
            .expect("compose");

        let labor = composed
            .quote
            .items
            .iter()
            .filter(|item| item.cost_type == CostType::Labor)
            .map(|item| (item.item_name.as_str(), item.quantity))
            .collect::<Vec<_>>();
        // wallpaper 155㎡ / 35, flooring 33㎡ / 30, tile 32㎡ / 15
        assert_eq!(
            labor,
            vec![
                ("도배공", Decimal::from(5)),
                ("마루 시공", Decimal::from(2)),
                ("타일공", Decimal::from(3)),
            ]
        );
    }

    #[test]
    fn low_confidence_is_surfaced_but_does_not_block() {
        let composed = composer()
            .compose(request(apartment(Decimal::new(3, 1)), ProductGrade::Standard))
            .expect("compose");

        assert!(composed.warnings.contains(&CompositionWarning::LowConfidence {
            confidence: Decimal::new(3, 1),
            threshold: Decimal::new(5, 1),
        }));
        assert!(!composed.quote.items.is_empty());
    }

    #[test]
    fn supplied_quantity_tables_bypass_estimation() {
        let mut analysis = apartment(Decimal::ONE);
        analysis.quantities = Some(vec![
            QuantityTableRow {
                category: "도배".into(),
                sub_category: None,
                item_name: "실크 벽지".into(),
                quantity: Decimal::new(1205, 1),
                unit: "㎡".into(),
            },
            QuantityTableRow {
                category: "기타".into(),
                sub_category: None,
                item_name: "입주 청소".into(),
                quantity: Decimal::ONE,
                unit: "식".into(),
            },
        ]);

        let composed =
            composer().compose(request(analysis, ProductGrade::Premium)).expect("compose");

        assert!(composed.areas.is_none());
        let names =
            composed.quote.items.iter().map(|item| item.item_name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["수입 실크 벽지", "입주 청소", "도배공"]);
        assert_eq!(composed.quote.items[0].quantity, Decimal::from(121));
        assert!(composed.warnings.contains(&CompositionWarning::UnpricedLine {
            item_name: "입주 청소".into()
        }));
    }

    #[test]
    fn grades_without_a_catalog_entry_fall_back_to_standard_pricing() {
        let composed = composer()
            .compose(request(apartment(Decimal::ONE), ProductGrade::Premium))
            .expect("compose");

        let lighting = composed
            .quote
            .items
            .iter()
            .find(|item| item.family == Some(MaterialFamily::Lighting))
            .expect("lighting line");
        assert_eq!(lighting.item_name, "LED 방등 50W");
    }

    #[test]
    fn blank_customer_is_rejected() {
        let mut request = request(apartment(Decimal::ONE), ProductGrade::Standard);
        request.customer.name = "  ".into();
        assert!(composer().compose(request).is_err());
    }
}
