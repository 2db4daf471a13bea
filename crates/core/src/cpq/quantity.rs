use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::MaterialFamily;
use crate::domain::quote::CostType;
use crate::domain::room::{Calculations, RoomAnalysis, RoomType};

const WALL_TO_FLOOR_RATIO: Decimal = Decimal::from_parts(25, 0, 0, false, 1);
const MATERIAL_LOSS: Decimal = Decimal::from_parts(110, 0, 0, false, 2);
const WALLPAPER_LOSS: Decimal = Decimal::from_parts(105, 0, 0, false, 2);
const WET_ROOM_WALL_FACTOR: Decimal = Decimal::from_parts(4, 0, 0, false, 0);
const BALCONY_PAINT_FACTOR: Decimal = Decimal::from_parts(3, 0, 0, false, 0);
const WASTE_AREA_PER_TON: Decimal = Decimal::from_parts(10, 0, 0, false, 0);

pub const AREA_UNIT: &str = "㎡";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedAreas {
    pub floor_area: Decimal,
    pub wall_area: Decimal,
    pub ceiling_area: Decimal,
}

/// One estimated material requirement, not yet priced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialLine {
    pub category: String,
    pub sub_category: Option<String>,
    pub item_name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub family: Option<MaterialFamily>,
    pub cost_type: CostType,
    pub room: Option<String>,
}

impl MaterialLine {
    fn new(
        category: &str,
        item_name: impl Into<String>,
        quantity: Decimal,
        unit: &str,
        family: MaterialFamily,
        cost_type: CostType,
    ) -> Self {
        Self {
            category: category.to_string(),
            sub_category: None,
            item_name: item_name.into(),
            quantity,
            unit: unit.to_string(),
            family: Some(family),
            cost_type,
            room: None,
        }
    }

    fn in_room(mut self, room: &str) -> Self {
        self.room = Some(room.to_string());
        self
    }
}

/// Turns room geometry into material quantities. Every quantity is rounded up.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuantityEstimator;

impl QuantityEstimator {
    pub fn new() -> Self {
        Self
    }

    pub fn areas(&self, rooms: &[RoomAnalysis], calc: &Calculations) -> EstimatedAreas {
        let floor_area = calc
            .floor_area
            .unwrap_or_else(|| measured(rooms).map(|room| room.area).sum::<Decimal>());
        let wall_area = calc.wall_area.unwrap_or(floor_area * WALL_TO_FLOOR_RATIO);
        let ceiling_area = calc.ceiling_area.unwrap_or(floor_area);

        EstimatedAreas { floor_area, wall_area, ceiling_area }
    }

    pub fn estimate(&self, rooms: &[RoomAnalysis], calc: &Calculations) -> Vec<MaterialLine> {
        let areas = self.areas(rooms, calc);
        let mut lines = Vec::new();

        let living_area = measured(rooms)
            .filter(|room| room.room_type.is_living_space())
            .map(|room| room.area)
            .sum::<Decimal>();
        lines.push(MaterialLine::new(
            "바닥/마루",
            "거실/침실 마루",
            round_up(living_area * MATERIAL_LOSS),
            AREA_UNIT,
            MaterialFamily::Flooring,
            CostType::Material,
        ));

        let kitchens = rooms_of(rooms, RoomType::Kitchen);
        for (index, kitchen) in kitchens.iter().enumerate() {
            let label = indexed_label("주방", index, kitchens.len());
            lines.push(
                MaterialLine::new(
                    "타일",
                    format!("{label} 바닥 타일"),
                    round_up(kitchen.area * MATERIAL_LOSS),
                    AREA_UNIT,
                    MaterialFamily::Tile,
                    CostType::Material,
                )
                .in_room(&kitchen.name),
            );
        }

        let bathrooms = rooms_of(rooms, RoomType::Bathroom);
        for (index, bathroom) in bathrooms.iter().enumerate() {
            let label = indexed_label("욕실", index, bathrooms.len());
            lines.push(
                MaterialLine::new(
                    "타일",
                    format!("{label} 바닥 타일"),
                    round_up(bathroom.area * MATERIAL_LOSS),
                    AREA_UNIT,
                    MaterialFamily::Tile,
                    CostType::Material,
                )
                .in_room(&bathroom.name),
            );
            lines.push(
                MaterialLine::new(
                    "타일",
                    format!("{label} 벽 타일"),
                    round_up(bathroom.area * WET_ROOM_WALL_FACTOR * MATERIAL_LOSS),
                    AREA_UNIT,
                    MaterialFamily::Tile,
                    CostType::Material,
                )
                .in_room(&bathroom.name),
            );
        }

        lines.push(MaterialLine::new(
            "도배",
            "벽/천장 도배",
            round_up((areas.wall_area + areas.ceiling_area) * WALLPAPER_LOSS),
            AREA_UNIT,
            MaterialFamily::Wallpaper,
            CostType::Material,
        ));

        let balcony_area = rooms_of(rooms, RoomType::Balcony)
            .iter()
            .map(|room| room.area)
            .sum::<Decimal>();
        lines.push(MaterialLine::new(
            "도장",
            "발코니 도장",
            round_up(balcony_area * BALCONY_PAINT_FACTOR),
            AREA_UNIT,
            MaterialFamily::Paint,
            CostType::Material,
        ));

        lines.push(MaterialLine::new(
            "전기",
            "조명 교체",
            Decimal::from(measured(rooms).count()),
            "개",
            MaterialFamily::Lighting,
            CostType::Material,
        ));

        lines.push(MaterialLine::new(
            "철거",
            "기존 마감재 철거",
            round_up(areas.floor_area),
            AREA_UNIT,
            MaterialFamily::Demolition,
            CostType::Composite,
        ));
        lines.push(MaterialLine::new(
            "철거",
            "폐기물 처리",
            round_up(areas.floor_area / WASTE_AREA_PER_TON),
            "ton",
            MaterialFamily::WasteDisposal,
            CostType::Composite,
        ));

        lines.retain(|line| line.quantity > Decimal::ZERO);
        lines
    }
}

/// Ceiling that never goes below zero.
pub fn round_up(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).ceil()
}

fn measured(rooms: &[RoomAnalysis]) -> impl Iterator<Item = &RoomAnalysis> {
    rooms.iter().filter(|room| room.area > Decimal::ZERO)
}

fn rooms_of(rooms: &[RoomAnalysis], room_type: RoomType) -> Vec<&RoomAnalysis> {
    measured(rooms).filter(|room| room.room_type == room_type).collect()
}

fn indexed_label(base: &str, index: usize, count: usize) -> String {
    if count > 1 {
        format!("{base}{}", index + 1)
    } else {
        base.to_string()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{EstimatedAreas, QuantityEstimator};
    use crate::domain::catalog::MaterialFamily;
    use crate::domain::room::{Calculations, RoomAnalysis, RoomType};

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

    fn scenario_rooms() -> Vec<RoomAnalysis> {
        vec![
            room("침실1", RoomType::Bedroom, 10),
            room("거실", RoomType::Living, 20),
            room("주방", RoomType::Kitchen, 8),
            room("욕실", RoomType::Bathroom, 4),
        ]
    }

    fn quantity_of(lines: &[super::MaterialLine], item_name: &str) -> Option<Decimal> {
        lines.iter().find(|line| line.item_name == item_name).map(|line| line.quantity)
    }

    #[test]
    fn reference_apartment_yields_documented_quantities() {
        let estimator = QuantityEstimator::new();
        let rooms = scenario_rooms();
        let calc = Calculations::default();

        assert_eq!(
            estimator.areas(&rooms, &calc),
            EstimatedAreas {
                floor_area: Decimal::from(42),
                wall_area: Decimal::from(105),
                ceiling_area: Decimal::from(42),
            }
        );

        let lines = estimator.estimate(&rooms, &calc);
        assert_eq!(quantity_of(&lines, "거실/침실 마루"), Some(Decimal::from(33)));
        assert_eq!(quantity_of(&lines, "주방 바닥 타일"), Some(Decimal::from(9)));
        assert_eq!(quantity_of(&lines, "욕실 바닥 타일"), Some(Decimal::from(5)));
        assert_eq!(quantity_of(&lines, "욕실 벽 타일"), Some(Decimal::from(18)));
        assert_eq!(quantity_of(&lines, "벽/천장 도배"), Some(Decimal::from(155)));
        assert_eq!(quantity_of(&lines, "기존 마감재 철거"), Some(Decimal::from(42)));
        assert_eq!(quantity_of(&lines, "폐기물 처리"), Some(Decimal::from(5)));
        assert_eq!(quantity_of(&lines, "조명 교체"), Some(Decimal::from(4)));
        assert_eq!(quantity_of(&lines, "발코니 도장"), None);
    }

    #[test]
    fn line_order_is_fixed() {
        let lines = QuantityEstimator::new().estimate(&scenario_rooms(), &Calculations::default());
        let families = lines.iter().filter_map(|line| line.family).collect::<Vec<_>>();

        assert_eq!(
            families,
            vec![
                MaterialFamily::Flooring,
                MaterialFamily::Tile,
                MaterialFamily::Tile,
                MaterialFamily::Tile,
                MaterialFamily::Wallpaper,
                MaterialFamily::Lighting,
                MaterialFamily::Demolition,
                MaterialFamily::WasteDisposal,
            ]
        );
    }

    #[test]
    fn supplied_calculations_take_precedence() {
        let calc = Calculations {
            floor_area: Some(Decimal::from(50)),
            wall_area: Some(Decimal::from(100)),
            ..Default::default()
        };
        let estimator = QuantityEstimator::new();
        let areas = estimator.areas(&scenario_rooms(), &calc);

        assert_eq!(areas.floor_area, Decimal::from(50));
        assert_eq!(areas.wall_area, Decimal::from(100));
        assert_eq!(areas.ceiling_area, Decimal::from(50));

        let lines = estimator.estimate(&scenario_rooms(), &calc);
        // (100 + 50) * 1.05 = 157.5
        assert_eq!(quantity_of(&lines, "벽/천장 도배"), Some(Decimal::from(158)));
        assert_eq!(quantity_of(&lines, "폐기물 처리"), Some(Decimal::from(5)));
    }

    #[test]
    fn multiple_bathrooms_are_indexed_and_balconies_painted() {
        let rooms = vec![
            room("욕실1", RoomType::Bathroom, 4),
            room("욕실2", RoomType::Bathroom, 3),
            room("발코니", RoomType::Balcony, 5),
        ];
        let lines = QuantityEstimator::new().estimate(&rooms, &Calculations::default());

        assert_eq!(quantity_of(&lines, "욕실1 바닥 타일"), Some(Decimal::from(5)));
        assert_eq!(quantity_of(&lines, "욕실2 벽 타일"), Some(Decimal::from(14)));
        assert_eq!(quantity_of(&lines, "발코니 도장"), Some(Decimal::from(15)));
        assert_eq!(quantity_of(&lines, "거실/침실 마루"), None);
        assert_eq!(
            lines.iter().find(|line| line.item_name == "욕실2 벽 타일").and_then(|l| l.room.clone()),
            Some("욕실2".to_string())
        );
    }

    #[test]
    fn zero_area_rooms_are_skipped_silently() {
        let rooms = vec![room("거실", RoomType::Living, 20), room("창고", RoomType::Utility, 0)];
        let lines = QuantityEstimator::new().estimate(&rooms, &Calculations::default());

        assert_eq!(quantity_of(&lines, "조명 교체"), Some(Decimal::ONE));
        assert!(lines.iter().all(|line| line.quantity > Decimal::ZERO));
    }

    #[test]
    fn no_rooms_and_no_calculations_yield_no_lines() {
        let lines = QuantityEstimator::new().estimate(&[], &Calculations::default());
        assert!(lines.is_empty());
    }
}
