use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::quote::{CostType, QuoteItem};
use crate::errors::DomainError;

/// Labor share assumed for composite items that carry no ratio.
pub const DEFAULT_LABOR_RATIO: Decimal = Decimal::from_parts(3, 0, 0, false, 1);
pub const DEFAULT_VAT_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Rounds to whole currency units, halves away from zero.
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Splits a composite total into `(labor, material)`; the parts always sum to `total`.
pub fn split_composite(total: Decimal, labor_ratio: Decimal) -> (Decimal, Decimal) {
    let labor = round_amount(total * labor_ratio);
    (labor, total - labor)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub labor_cost: Decimal,
    pub material_cost: Decimal,
    pub other_cost: Decimal,
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub vat_amount: Decimal,
    pub final_amount: Decimal,
    pub trace: Vec<PricingTraceStep>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CostInput {
    pub discount_amount: Decimal,
    pub vat_enabled: bool,
    pub other_cost: Decimal,
}

impl CostInput {
    pub fn new(discount_amount: Decimal, vat_enabled: bool) -> Self {
        Self { discount_amount, vat_enabled, other_cost: Decimal::ZERO }
    }

    pub fn with_other_cost(mut self, other_cost: Decimal) -> Self {
        self.other_cost = other_cost;
        self
    }
}

pub trait CostAggregator: Send + Sync {
    fn aggregate_with(
        &self,
        items: &[QuoteItem],
        input: CostInput,
    ) -> Result<CostBreakdown, DomainError>;

    fn aggregate(
        &self,
        items: &[QuoteItem],
        discount_amount: Decimal,
        vat_enabled: bool,
    ) -> Result<CostBreakdown, DomainError> {
        self.aggregate_with(items, CostInput::new(discount_amount, vat_enabled))
    }
}

impl<T: CostAggregator + ?Sized> CostAggregator for std::sync::Arc<T> {
    fn aggregate_with(
        &self,
        items: &[QuoteItem],
        input: CostInput,
    ) -> Result<CostBreakdown, DomainError> {
        (**self).aggregate_with(items, input)
    }
}

#[derive(Clone, Debug)]
pub struct DeterministicCostAggregator {
    vat_rate: Decimal,
    default_labor_ratio: Decimal,
}

impl Default for DeterministicCostAggregator {
    fn default() -> Self {
        Self { vat_rate: DEFAULT_VAT_RATE, default_labor_ratio: DEFAULT_LABOR_RATIO }
    }
}

impl DeterministicCostAggregator {
    pub fn new(vat_rate: Decimal, default_labor_ratio: Decimal) -> Self {
        Self { vat_rate, default_labor_ratio }
    }
}

impl CostAggregator for DeterministicCostAggregator {
    fn aggregate_with(
        &self,
        items: &[QuoteItem],
        input: CostInput,
    ) -> Result<CostBreakdown, DomainError> {
        if input.discount_amount < Decimal::ZERO {
            return Err(DomainError::validation("discount_amount must not be negative"));
        }
        if input.other_cost < Decimal::ZERO {
            return Err(DomainError::validation("other_cost must not be negative"));
        }

        let mut labor_cost = Decimal::ZERO;
        let mut material_cost = Decimal::ZERO;

        for item in items.iter().filter(|item| item.is_included) {
            match item.cost_type {
                CostType::Labor => labor_cost += item.total_price,
                CostType::Material => material_cost += item.total_price,
                CostType::Composite => {
                    let ratio = item.labor_ratio.unwrap_or(self.default_labor_ratio);
                    if ratio < Decimal::ZERO || ratio > Decimal::ONE {
                        return Err(DomainError::validation(format!(
                            "item `{}` has labor_ratio {ratio} outside 0..=1",
                            item.item_name
                        )));
                    }
                    let (labor, material) = split_composite(item.total_price, ratio);
                    labor_cost += labor;
                    material_cost += material;
                }
            }
        }

        let other_cost = input.other_cost;
        let total_amount = labor_cost + material_cost + other_cost;
        let discount_amount = input.discount_amount;
        let vat_amount = if input.vat_enabled {
            round_amount((total_amount - discount_amount) * self.vat_rate)
        } else {
            Decimal::ZERO
        };
        let final_amount = total_amount - discount_amount + vat_amount;

        Ok(CostBreakdown {
            labor_cost,
            material_cost,
            other_cost,
            total_amount,
            discount_amount,
            vat_amount,
            final_amount,
            trace: vec![
                step("labor", "labor items + round(composite * labor_ratio)", labor_cost),
                step("material", "material items + composite remainder", material_cost),
                step("other", "other costs", other_cost),
                step("discount", "discount amount", discount_amount),
                step("vat", "round((total - discount) * vat_rate)", vat_amount),
                step("final", "total - discount + vat", final_amount),
            ],
        })
    }
}

fn step(stage: &str, detail: &str, amount: Decimal) -> PricingTraceStep {
    PricingTraceStep { stage: stage.to_string(), detail: detail.to_string(), amount }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal::Decimal;

    use super::{
        round_amount, split_composite, CostAggregator, CostInput, DeterministicCostAggregator,
    };
    use crate::domain::quote::{CostType, QuoteItem};
    use crate::errors::DomainError;

    fn item(total: i64, cost_type: CostType, ratio: Option<Decimal>) -> QuoteItem {
        let mut item = QuoteItem::new(
            "기타",
            format!("{cost_type:?} {total}"),
            Decimal::ONE,
            "식",
            Decimal::from(total),
            cost_type,
        );
        item.labor_ratio = ratio;
        item
    }

    #[test]
    fn splits_labor_material_and_composite_items() {
        let items = vec![
            item(100_000, CostType::Labor, None),
            item(250_000, CostType::Material, None),
            item(1_000_001, CostType::Composite, Some(Decimal::new(4, 1))),
        ];

        let breakdown = DeterministicCostAggregator::default()
            .aggregate(&items, Decimal::ZERO, false)
            .expect("aggregate");

        // round(1_000_001 * 0.4) = 400_000, remainder 600_001
        assert_eq!(breakdown.labor_cost, Decimal::from(500_000));
        assert_eq!(breakdown.material_cost, Decimal::from(850_001));
        assert_eq!(breakdown.total_amount, Decimal::from(1_350_001));
        assert_eq!(breakdown.final_amount, Decimal::from(1_350_001));
    }

    #[test]
    fn composite_without_ratio_uses_default_thirty_percent() {
        let items = vec![item(10_000, CostType::Composite, None)];
        let breakdown = DeterministicCostAggregator::default()
            .aggregate(&items, Decimal::ZERO, false)
            .expect("aggregate");

        assert_eq!(breakdown.labor_cost, Decimal::from(3_000));
        assert_eq!(breakdown.material_cost, Decimal::from(7_000));
    }

    #[test]
    fn excluded_items_do_not_contribute() {
        let mut optional = item(500_000, CostType::Material, None);
        optional.is_optional = true;
        optional.is_included = false;
        let items = vec![item(200_000, CostType::Labor, None), optional];

        let breakdown = DeterministicCostAggregator::default()
            .aggregate(&items, Decimal::ZERO, false)
            .expect("aggregate");

        assert_eq!(breakdown.total_amount, Decimal::from(200_000));
        assert_eq!(breakdown.material_cost, Decimal::ZERO);
    }

    #[test]
    fn vat_is_charged_on_discounted_total() {
        let items = vec![item(1_000_005, CostType::Material, None)];
        let breakdown = DeterministicCostAggregator::default()
            .aggregate(&items, Decimal::from(100_000), true)
            .expect("aggregate");

        // round(900_005 * 0.1) = round(90_000.5) = 90_001
        assert_eq!(breakdown.vat_amount, Decimal::from(90_001));
        assert_eq!(breakdown.final_amount, Decimal::from(990_006));
    }

    #[test]
    fn empty_item_list_yields_zero_totals() {
        let breakdown = DeterministicCostAggregator::default()
            .aggregate(&[], Decimal::ZERO, true)
            .expect("aggregate");

        assert_eq!(breakdown.labor_cost, Decimal::ZERO);
        assert_eq!(breakdown.material_cost, Decimal::ZERO);
        assert_eq!(breakdown.total_amount, Decimal::ZERO);
        assert_eq!(breakdown.vat_amount, Decimal::ZERO);
        assert_eq!(breakdown.final_amount, Decimal::ZERO);
    }

    #[test]
    fn negative_discount_is_rejected() {
        let error = DeterministicCostAggregator::default()
            .aggregate(&[], Decimal::from(-1), false)
            .expect_err("negative discount must fail");

        assert!(matches!(
            error,
            DomainError::Validation(ref message) if message.contains("discount")
        ));
    }

    #[test]
    fn other_cost_participates_in_total() {
        let items = vec![item(100, CostType::Labor, None)];
        let input = CostInput::new(Decimal::ZERO, false).with_other_cost(Decimal::from(50));
        let breakdown = DeterministicCostAggregator::default()
            .aggregate_with(&items, input)
            .expect("aggregate");

        assert_eq!(breakdown.total_amount, Decimal::from(150));
        assert_eq!(breakdown.other_cost, Decimal::from(50));
    }

    #[test]
    fn aggregation_is_idempotent() {
        let items = vec![
            item(123_457, CostType::Composite, Some(Decimal::new(35, 2))),
            item(98_765, CostType::Labor, None),
        ];
        let aggregator = DeterministicCostAggregator::default();

        let first = aggregator.aggregate(&items, Decimal::from(1_000), true).expect("first");
        let second = aggregator.aggregate(&items, Decimal::from(1_000), true).expect("second");

        assert_eq!(first, second);
    }

    #[test]
    fn composite_split_never_leaks_rounding() {
        let ratios = [Decimal::ZERO, Decimal::new(3, 1), Decimal::new(5, 1), Decimal::ONE];
        let totals = [Decimal::ZERO, Decimal::ONE, Decimal::from(999_999)];

        for ratio in ratios {
            for total in totals {
                let (labor, material) = split_composite(total, ratio);
                assert_eq!(labor + material, total, "ratio {ratio} total {total}");
                assert_eq!(labor, round_amount(total * ratio));
            }
        }
    }

    #[test]
    fn cost_invariants_hold_for_generated_item_sets() {
        let aggregator = DeterministicCostAggregator::default();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let cost_types = [CostType::Labor, CostType::Material, CostType::Composite];

        for _ in 0..200 {
            let count = rng.gen_range(0..12usize);
            let items = (0..count)
                .map(|_| {
                    let cost_type = cost_types[rng.gen_range(0..cost_types.len())];
                    let mut generated = QuoteItem::new(
                        "기타",
                        "generated",
                        Decimal::new(rng.gen_range(0..5_000i64), 1),
                        "㎡",
                        Decimal::from(rng.gen_range(0..80_000u64)),
                        cost_type,
                    );
                    generated.labor_ratio = Some(Decimal::new(rng.gen_range(0..=100i64), 2));
                    generated.is_included = rng.gen_bool(0.8);
                    generated
                })
                .collect::<Vec<_>>();
            let discount = Decimal::from(rng.gen_range(0..50_000u64));
            let other = Decimal::from(rng.gen_range(0..10_000u64));
            let vat_enabled = rng.gen_bool(0.5);

            let input = CostInput::new(discount, vat_enabled).with_other_cost(other);
            let breakdown = aggregator.aggregate_with(&items, input).expect("aggregate");

            assert_eq!(
                breakdown.labor_cost + breakdown.material_cost + breakdown.other_cost,
                breakdown.total_amount
            );
            assert_eq!(
                breakdown.total_amount - breakdown.discount_amount + breakdown.vat_amount,
                breakdown.final_amount
            );
        }
    }
}
