use std::sync::Arc;

use crate::domain::catalog::{CompositeCost, LaborCost, MaterialPrice};

/// Read-only price lookups. Keys are exact catalog names.
pub trait PricingCatalog: Send + Sync {
    fn lookup_labor(&self, labor_type: &str) -> Option<&LaborCost>;
    fn lookup_material(&self, product_name: &str) -> Option<&MaterialPrice>;
    fn lookup_composite(&self, cost_name: &str) -> Option<&CompositeCost>;
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    labor: Vec<LaborCost>,
    materials: Vec<MaterialPrice>,
    composites: Vec<CompositeCost>,
}

impl Catalog {
    pub fn new(
        labor: Vec<LaborCost>,
        materials: Vec<MaterialPrice>,
        composites: Vec<CompositeCost>,
    ) -> Self {
        Self { labor, materials, composites }
    }

    pub fn labor(&self) -> &[LaborCost] {
        &self.labor
    }

    pub fn materials(&self) -> &[MaterialPrice] {
        &self.materials
    }

    pub fn composites(&self) -> &[CompositeCost] {
        &self.composites
    }

    pub fn is_empty(&self) -> bool {
        self.labor.is_empty() && self.materials.is_empty() && self.composites.is_empty()
    }
}

impl PricingCatalog for Catalog {
    fn lookup_labor(&self, labor_type: &str) -> Option<&LaborCost> {
        self.labor.iter().find(|entry| entry.labor_type == labor_type)
    }

    fn lookup_material(&self, product_name: &str) -> Option<&MaterialPrice> {
        self.materials.iter().find(|entry| entry.product_name == product_name)
    }

    fn lookup_composite(&self, cost_name: &str) -> Option<&CompositeCost> {
        self.composites.iter().find(|entry| entry.cost_name == cost_name)
    }
}

impl<T: PricingCatalog + ?Sized> PricingCatalog for Arc<T> {
    fn lookup_labor(&self, labor_type: &str) -> Option<&LaborCost> {
        (**self).lookup_labor(labor_type)
    }

    fn lookup_material(&self, product_name: &str) -> Option<&MaterialPrice> {
        (**self).lookup_material(product_name)
    }

    fn lookup_composite(&self, cost_name: &str) -> Option<&CompositeCost> {
        (**self).lookup_composite(cost_name)
    }
}

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures {
    use rust_decimal::Decimal;

    use super::Catalog;
    use crate::domain::catalog::{CompositeCost, LaborCost, MaterialPrice, ProductGrade};

    fn material(
        category: &str,
        product_name: &str,
        unit: &str,
        unit_price: i64,
        grade: ProductGrade,
    ) -> MaterialPrice {
        MaterialPrice {
            category: category.to_string(),
            sub_category: None,
            product_name: product_name.to_string(),
            unit: unit.to_string(),
            unit_price: Decimal::from(unit_price),
            product_grade: grade,
        }
    }

    fn composite(name: &str, category: &str, unit: &str, price: i64, ratio: i64) -> CompositeCost {
        CompositeCost {
            cost_name: name.to_string(),
            category: category.to_string(),
            unit: unit.to_string(),
            unit_price: Decimal::from(price),
            labor_ratio: Decimal::new(ratio, 2),
        }
    }

    /// Mirrors the seeded default catalog closely enough for unit tests.
    pub fn sample_catalog() -> Catalog {
        use ProductGrade::*;

        Catalog::new(
            vec![
                LaborCost { labor_type: "도배공".into(), daily_rate: Decimal::from(250_000) },
                LaborCost { labor_type: "마루 시공".into(), daily_rate: Decimal::from(280_000) },
                LaborCost { labor_type: "타일공".into(), daily_rate: Decimal::from(300_000) },
            ],
            vec![
                material("바닥/마루", "강화마루 12mm", "㎡", 32_000, Standard),
                material("바닥/마루", "강마루 12mm", "㎡", 48_000, Mid),
                material("바닥/마루", "원목마루", "㎡", 95_000, Premium),
                material("타일", "자기질 타일 300x300", "㎡", 28_000, Standard),
                material("타일", "포세린 타일 600x600", "㎡", 45_000, Mid),
                material("타일", "수입 포세린 타일 600x1200", "㎡", 78_000, Premium),
                material("도배", "합지 벽지", "㎡", 9_000, Standard),
                material("도배", "실크 벽지", "㎡", 14_000, Mid),
                material("도배", "수입 실크 벽지", "㎡", 24_000, Premium),
                material("도장", "수성 페인트", "㎡", 12_000, Standard),
                material("도장", "친환경 수성 페인트", "㎡", 18_000, Mid),
                material("전기", "LED 방등 50W", "개", 45_000, Standard),
                material("전기", "LED 슬림 평판등", "개", 85_000, Mid),
            ],
            vec![
                composite("기존 마감재 철거", "철거", "㎡", 25_000, 70),
                composite("폐기물 처리", "철거", "ton", 180_000, 50),
                composite("욕실 리모델링 일반형", "욕실", "식", 3_500_000, 40),
                composite("욕실 리모델링 고급형", "욕실", "식", 6_200_000, 35),
            ],
        )
    }
}
