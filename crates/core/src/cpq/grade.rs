//! Grade substitution: re-prices a quote's items at another material tier.
//!
//! Items are linked to catalog entries through [`MaterialFamily`] tags. A
//! family is resolved from an item's stored tag, or from its text when no tag
//! exists; the resolution never depends on declaration order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, EVENT_GRADE_UPGRADED,
};
use crate::cpq::catalog::PricingCatalog;
use crate::cpq::pricing::{round_amount, CostAggregator, CostBreakdown, CostInput};
use crate::domain::catalog::{CompositeCost, MaterialFamily, MaterialPrice, ProductGrade};
use crate::domain::quote::{CostType, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus};
use crate::errors::{ApplicationError, DomainError};
use crate::store::{QuoteMutation, QuoteStore};

/// Catalog key a family resolves to at one grade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogRef {
    Material(&'static str),
    Composite(&'static str),
}

#[derive(Clone, Debug)]
pub struct GradeFamilyTable {
    entries: Vec<(MaterialFamily, ProductGrade, CatalogRef)>,
}

impl Default for GradeFamilyTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl GradeFamilyTable {
    pub fn new(entries: Vec<(MaterialFamily, ProductGrade, CatalogRef)>) -> Self {
        Self { entries }
    }

    /// The family-to-catalog mapping shipped with the seeded catalog.
    pub fn standard() -> Self {
        use CatalogRef::{Composite, Material};
        use MaterialFamily::*;
        use ProductGrade::{Mid, Premium, Standard};

        Self::new(vec![
            (Flooring, Standard, Material("강화마루 12mm")),
            (Flooring, Mid, Material("강마루 12mm")),
            (Flooring, Premium, Material("원목마루")),
            (Tile, Standard, Material("자기질 타일 300x300")),
            (Tile, Mid, Material("포세린 타일 600x600")),
            (Tile, Premium, Material("수입 포세린 타일 600x1200")),
            (Wallpaper, Standard, Material("합지 벽지")),
            (Wallpaper, Mid, Material("실크 벽지")),
            (Wallpaper, Premium, Material("수입 실크 벽지")),
            (Paint, Standard, Material("수성 페인트")),
            (Paint, Mid, Material("친환경 수성 페인트")),
            (Paint, Premium, Material("프리미엄 수성 페인트")),
            (Lighting, Standard, Material("LED 방등 50W")),
            (Lighting, Mid, Material("LED 슬림 평판등")),
            (Lighting, Premium, Material("디자인 매입등 세트")),
            (Door, Standard, Material("ABS 도어")),
            (Door, Mid, Material("멤브레인 도어")),
            (Door, Premium, Material("원목 도어")),
            (BathroomPackage, Standard, Composite("욕실 리모델링 일반형")),
            (BathroomPackage, Premium, Composite("욕실 리모델링 고급형")),
            (Demolition, Standard, Composite("기존 마감재 철거")),
            (Demolition, Mid, Composite("기존 마감재 철거")),
            (Demolition, Premium, Composite("기존 마감재 철거")),
            (WasteDisposal, Standard, Composite("폐기물 처리")),
            (WasteDisposal, Mid, Composite("폐기물 처리")),
            (WasteDisposal, Premium, Composite("폐기물 처리")),
        ])
    }

    pub fn catalog_ref(&self, family: MaterialFamily, grade: ProductGrade) -> Option<CatalogRef> {
        self.entries
            .iter()
            .find(|(entry_family, entry_grade, _)| *entry_family == family && *entry_grade == grade)
            .map(|(_, _, catalog_ref)| *catalog_ref)
    }

    /// Looks the family up in the table and then in the catalog.
    pub fn resolve<'c, C>(
        &self,
        catalog: &'c C,
        family: MaterialFamily,
        grade: ProductGrade,
    ) -> Option<CatalogEntry<'c>>
    where
        C: PricingCatalog + ?Sized,
    {
        match self.catalog_ref(family, grade)? {
            CatalogRef::Material(name) => catalog.lookup_material(name).map(CatalogEntry::Material),
            CatalogRef::Composite(name) => {
                catalog.lookup_composite(name).map(CatalogEntry::Composite)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogEntry<'c> {
    Material(&'c MaterialPrice),
    Composite(&'c CompositeCost),
}

impl CatalogEntry<'_> {
    pub fn name(&self) -> &str {
        match self {
            Self::Material(entry) => &entry.product_name,
            Self::Composite(entry) => &entry.cost_name,
        }
    }

    pub fn unit(&self) -> &str {
        match self {
            Self::Material(entry) => &entry.unit,
            Self::Composite(entry) => &entry.unit,
        }
    }

    pub fn unit_price(&self) -> Decimal {
        match self {
            Self::Material(entry) => entry.unit_price,
            Self::Composite(entry) => entry.unit_price,
        }
    }

    pub fn labor_ratio(&self) -> Option<Decimal> {
        match self {
            Self::Material(_) => None,
            Self::Composite(entry) => Some(entry.labor_ratio),
        }
    }

    pub fn cost_type(&self) -> CostType {
        match self {
            Self::Material(_) => CostType::Material,
            Self::Composite(_) => CostType::Composite,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FamilyMatch {
    Matched(MaterialFamily),
    Ambiguous(Vec<MaterialFamily>),
    Unmatched,
}

/// Resolves the family of an item: its stored tag, else its text.
pub fn classify(item: &QuoteItem) -> FamilyMatch {
    match item.family {
        Some(family) => FamilyMatch::Matched(family),
        None => classify_text(&[
            Some(item.item_name.as_str()),
            item.sub_category.as_deref(),
            Some(item.category.as_str()),
        ]),
    }
}

/// Examines `fields` in order; the first field mentioning any family decides.
///
/// Within that field the family with the strictly longest matched keyword
/// wins. Equal lengths across different families are ambiguous.
pub fn classify_text(fields: &[Option<&str>]) -> FamilyMatch {
    for field in fields.iter().flatten() {
        let mut matches = MaterialFamily::ALL
            .into_iter()
            .filter_map(|family| {
                family
                    .keywords()
                    .iter()
                    .filter(|keyword| field.contains(*keyword))
                    .map(|keyword| keyword.chars().count())
                    .max()
                    .map(|length| (family, length))
            })
            .collect::<Vec<_>>();

        if matches.is_empty() {
            continue;
        }

        matches.sort_by(|left, right| right.1.cmp(&left.1).then(left.0.cmp(&right.0)));
        let longest = matches[0].1;
        let leaders = matches
            .iter()
            .filter(|(_, length)| *length == longest)
            .map(|(family, _)| *family)
            .collect::<Vec<_>>();

        return if leaders.len() == 1 {
            FamilyMatch::Matched(leaders[0])
        } else {
            FamilyMatch::Ambiguous(leaders)
        };
    }

    FamilyMatch::Unmatched
}

/// Number the derived quote is stored under: `{base}-{grade}`, no suffix for 일반.
pub fn derived_quote_number(quote_number: &str, grade: ProductGrade) -> String {
    let base = base_quote_number(quote_number);
    match grade.quote_number_suffix() {
        Some(suffix) => format!("{base}-{suffix}"),
        None => base.to_string(),
    }
}

/// Strips a grade suffix so derived quotes target their siblings.
pub fn base_quote_number(quote_number: &str) -> &str {
    ProductGrade::ALL
        .into_iter()
        .filter_map(|grade| grade.quote_number_suffix())
        .find_map(|suffix| {
            quote_number.strip_suffix(suffix).and_then(|rest| rest.strip_suffix('-'))
        })
        .unwrap_or(quote_number)
}

fn derived_item_id(source: &QuoteItemId, grade: ProductGrade) -> QuoteItemId {
    let base = ProductGrade::ALL
        .into_iter()
        .find_map(|candidate| {
            source.0.strip_suffix(candidate.as_str()).and_then(|rest| rest.strip_suffix('-'))
        })
        .unwrap_or(&source.0);
    QuoteItemId(format!("{base}-{}", grade.as_str()))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradePlan {
    pub items: Vec<QuoteItem>,
    pub breakdown: CostBreakdown,
    pub replaced_items: usize,
    pub unchanged_items: usize,
    pub ambiguous_items: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeOutcome {
    pub quote: Quote,
    pub created: bool,
    pub replaced_items: usize,
    /// Items kept as-is because their family has no catalog entry at the grade.
    pub unchanged_items: usize,
    /// Items kept as-is because their text matched several families equally.
    pub ambiguous_items: usize,
    pub backup_version: Option<u32>,
}

pub struct GradeTransformer<C, A> {
    catalog: C,
    aggregator: A,
    table: GradeFamilyTable,
}

impl<C, A> GradeTransformer<C, A>
where
    C: PricingCatalog,
    A: CostAggregator,
{
    pub fn new(catalog: C, aggregator: A) -> Self {
        Self::with_table(catalog, aggregator, GradeFamilyTable::standard())
    }

    pub fn with_table(catalog: C, aggregator: A, table: GradeFamilyTable) -> Self {
        Self { catalog, aggregator, table }
    }

    /// Rewrites the source items at `grade` and re-aggregates. Item ids are
    /// derived from the source ids so repeated plans are identical.
    pub fn plan(&self, source: &Quote, grade: ProductGrade) -> Result<UpgradePlan, DomainError> {
        let mut replaced_items = 0;
        let mut unchanged_items = 0;
        let mut ambiguous_items = 0;

        let items = source
            .sorted_items()
            .into_iter()
            .map(|item| {
                let mut derived = item.clone();
                derived.id = derived_item_id(&item.id, grade);
                if item.cost_type == CostType::Labor {
                    return derived;
                }

                match classify(item) {
                    FamilyMatch::Matched(family) => {
                        derived.family = Some(family);
                        match self.table.resolve(&self.catalog, family, grade) {
                            Some(entry) => {
                                derived.item_name = entry.name().to_string();
                                derived.unit_price = entry.unit_price();
                                derived.total_price =
                                    round_amount(derived.quantity * derived.unit_price);
                                if let Some(ratio) = entry.labor_ratio() {
                                    derived.labor_ratio = Some(ratio);
                                }
                                replaced_items += 1;
                            }
                            None => unchanged_items += 1,
                        }
                    }
                    FamilyMatch::Ambiguous(_) => ambiguous_items += 1,
                    FamilyMatch::Unmatched => unchanged_items += 1,
                }

                derived
            })
            .collect::<Vec<_>>();

        let undiscounted = self.aggregator.aggregate_with(
            &items,
            CostInput::new(Decimal::ZERO, false).with_other_cost(source.other_cost),
        )?;
        let discount_amount = if source.total_amount.is_zero() {
            Decimal::ZERO
        } else {
            round_amount(
                undiscounted.total_amount * (source.discount_amount / source.total_amount),
            )
        };
        let breakdown = self.aggregator.aggregate_with(
            &items,
            CostInput::new(discount_amount, source.vat_enabled())
                .with_other_cost(source.other_cost),
        )?;

        Ok(UpgradePlan { items, breakdown, replaced_items, unchanged_items, ambiguous_items })
    }

    /// Builds the derived quote without touching storage. `existing` is the
    /// quote already stored under the derived number, if any; it keeps its
    /// identity, creation time and status.
    pub fn upgrade(
        &self,
        source: &Quote,
        grade: ProductGrade,
        existing: Option<&Quote>,
    ) -> Result<UpgradeOutcome, DomainError> {
        let plan = self.plan(source, grade)?;
        let quote_number = derived_quote_number(&source.quote_number, grade);

        let mut quote = source.clone();
        quote.quote_number = quote_number;
        quote.grade = grade;
        quote.items = plan.items;
        quote.apply_breakdown(&plan.breakdown);
        match existing {
            Some(existing) => {
                quote.id = existing.id.clone();
                quote.created_at = existing.created_at;
                quote.status = existing.status;
            }
            None if source.quote_number == quote.quote_number => {}
            None => {
                quote.id = QuoteId::generate();
                quote.status = QuoteStatus::Draft;
                quote.created_at = chrono::Utc::now();
            }
        }
        quote.updated_at = chrono::Utc::now();

        Ok(UpgradeOutcome {
            created: existing.is_none() && source.quote_number != quote.quote_number,
            quote,
            replaced_items: plan.replaced_items,
            unchanged_items: plan.unchanged_items,
            ambiguous_items: plan.ambiguous_items,
            backup_version: None,
        })
    }

    /// Upgrades a persisted quote and writes the result to its sibling.
    ///
    /// An existing sibling is snapshotted and overwritten in one unit of
    /// work; otherwise a fresh draft is inserted with no version history.
    pub async fn upgrade_persisted<S>(
        &self,
        store: &S,
        audit: &dyn AuditSink,
        context: &AuditContext,
        quote_id: &QuoteId,
        grade: ProductGrade,
    ) -> Result<UpgradeOutcome, ApplicationError>
    where
        S: QuoteStore + ?Sized,
    {
        if quote_id.0.trim().is_empty() {
            return Err(DomainError::validation("quote id must not be empty").into());
        }
        let source = store
            .get_by_id(quote_id)
            .await?
            .ok_or_else(|| DomainError::not_found("quote", &quote_id.0))?;

        let target_number = derived_quote_number(&source.quote_number, grade);
        let existing = if target_number == source.quote_number {
            Some(source.clone())
        } else {
            store.find_by_number(&target_number).await?
        };

        let mut outcome = self.upgrade(&source, grade, existing.as_ref())?;

        if existing.is_some() {
            let committed = store
                .commit(
                    QuoteMutation::new(outcome.quote.id.clone())
                        .with_backup(format!("pre-upgrade backup (→ {grade})"))
                        .with_scalars(outcome.quote.scalars())
                        .with_items(outcome.quote.items.clone()),
                )
                .await?;
            outcome.backup_version = committed.backup.map(|version| version.version_number);
            outcome.quote = committed.quote;
        } else {
            store.insert(&outcome.quote).await?;
        }

        info!(
            event_name = "quote.grade.upgraded",
            correlation_id = %context.correlation_id,
            quote_id = %source.id,
            derived_quote_id = %outcome.quote.id,
            grade = grade.as_str(),
            created = outcome.created,
            unchanged_items = outcome.unchanged_items,
            ambiguous_items = outcome.ambiguous_items,
            "grade upgrade applied"
        );
        audit.emit(
            AuditEvent::new(
                Some(outcome.quote.id.clone()),
                context,
                EVENT_GRADE_UPGRADED,
                AuditCategory::Pricing,
                AuditOutcome::Success,
            )
            .with_metadata("source_quote_id", &source.id)
            .with_metadata("grade", grade.as_str())
            .with_metadata("created", outcome.created)
            .with_metadata("replaced_items", outcome.replaced_items)
            .with_metadata("unchanged_items", outcome.unchanged_items)
            .with_metadata("ambiguous_items", outcome.ambiguous_items),
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        base_quote_number, classify_text, derived_quote_number, FamilyMatch, GradeTransformer,
    };
    use crate::cpq::catalog::{fixtures::sample_catalog, Catalog};
    use crate::cpq::pricing::{CostAggregator, DeterministicCostAggregator};
    use crate::domain::catalog::{MaterialFamily, ProductGrade};
    use crate::domain::quote::{CostType, CustomerInfo, Quote, QuoteItem};

    fn transformer() -> GradeTransformer<Catalog, DeterministicCostAggregator> {
        GradeTransformer::new(sample_catalog(), DeterministicCostAggregator::default())
    }

    fn item(category: &str, name: &str, quantity: i64, price: i64, kind: CostType) -> QuoteItem {
        QuoteItem::new(category, name, Decimal::from(quantity), "㎡", Decimal::from(price), kind)
    }

    fn standard_quote() -> Quote {
        let customer = CustomerInfo { name: "박지훈".into(), ..Default::default() };
        let mut quote = Quote::draft("Q-20261018-001", customer);
        let mut items = vec![
            item("바닥/마루", "강화마루 12mm", 33, 32_000, CostType::Material),
            item("도배", "합지 벽지", 155, 9_000, CostType::Material),
            item("도장", "수성 페인트", 15, 12_000, CostType::Material),
            item("철거", "기존 마감재 철거", 42, 25_000, CostType::Composite),
            item("기타", "입주 청소", 1, 400_000, CostType::Material),
            item("인건비", "도배공", 5, 250_000, CostType::Labor),
        ];
        items[3].labor_ratio = Some(Decimal::new(70, 2));
        for (index, item) in items.iter_mut().enumerate() {
            item.sort_order = index as i32;
        }
        quote.items = items;
        let breakdown = DeterministicCostAggregator::default()
            .aggregate(&quote.items, Decimal::from(100_000), true)
            .expect("aggregate");
        quote.apply_breakdown(&breakdown);
        quote
    }

    #[test]
    fn derived_numbers_strip_existing_grade_suffixes() {
        assert_eq!(derived_quote_number("Q-1", ProductGrade::Premium), "Q-1-고급");
        assert_eq!(derived_quote_number("Q-1", ProductGrade::Standard), "Q-1");
        assert_eq!(derived_quote_number("Q-1-중급", ProductGrade::Premium), "Q-1-고급");
        assert_eq!(base_quote_number("Q-1-고급"), "Q-1");
        assert_eq!(base_quote_number("Q-고급품"), "Q-고급품");
    }

    #[test]
    fn classification_prefers_name_then_sub_category_then_category() {
        assert_eq!(
            classify_text(&[Some("실크 벽지"), None, Some("마감")]),
            FamilyMatch::Matched(MaterialFamily::Wallpaper)
        );
        assert_eq!(
            classify_text(&[Some("특수 시공"), Some("타일 보수"), Some("바닥/마루")]),
            FamilyMatch::Matched(MaterialFamily::Tile)
        );
        assert_eq!(
            classify_text(&[Some("특수 시공"), None, Some("바닥/마루")]),
            FamilyMatch::Matched(MaterialFamily::Flooring)
        );
        assert_eq!(classify_text(&[Some("입주 청소"), None, Some("기타")]), FamilyMatch::Unmatched);
    }

    #[test]
    fn multi_family_names_resolve_by_longest_keyword_or_stay_ambiguous() {
        assert_eq!(
            classify_text(&[Some("타일 마루"), None, None]),
            FamilyMatch::Ambiguous(vec![MaterialFamily::Flooring, MaterialFamily::Tile])
        );
        assert_eq!(
            classify_text(&[Some("욕실 리모델링 타일 포함"), None, None]),
            FamilyMatch::Matched(MaterialFamily::BathroomPackage)
        );
    }

    #[test]
    fn premium_upgrade_substitutes_catalog_entries_and_reports_misses() {
        let source = standard_quote();
        let outcome =
            transformer().upgrade(&source, ProductGrade::Premium, None).expect("upgrade");

        assert!(outcome.created);
        assert_eq!(outcome.quote.quote_number, "Q-20261018-001-고급");
        assert_ne!(outcome.quote.id, source.id);
        assert_eq!(outcome.quote.grade, ProductGrade::Premium);

        let names =
            outcome.quote.items.iter().map(|item| item.item_name.as_str()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "원목마루",
                "수입 실크 벽지",
                "수성 페인트",
                "기존 마감재 철거",
                "입주 청소",
                "도배공"
            ]
        );
        assert_eq!(outcome.quote.items[0].total_price, Decimal::from(33 * 95_000));
        // premium paint is not in the sample catalog; the cleaning line has no family
        assert_eq!(outcome.unchanged_items, 2);
        assert_eq!(outcome.replaced_items, 3);
        assert_eq!(outcome.quote.items[0].family, Some(MaterialFamily::Flooring));
        assert!(outcome.quote.cost_invariants_hold());

        // trade labor mentions 도배 but is never substituted
        let labor = &outcome.quote.items[5];
        assert_eq!(labor.family, None);
        assert_eq!(labor.total_price, Decimal::from(5 * 250_000));
    }

    #[test]
    fn discount_rate_and_vat_opt_in_carry_over() {
        let source = standard_quote();
        let outcome = transformer().upgrade(&source, ProductGrade::Mid, None).expect("upgrade");
        let quote = &outcome.quote;

        let expected_discount =
            (quote.total_amount * Decimal::from(100_000) / source.total_amount).round();
        assert_eq!(quote.discount_amount, expected_discount);
        assert!(quote.vat_amount > Decimal::ZERO);
        assert_eq!(
            quote.vat_amount,
            ((quote.total_amount - quote.discount_amount) * Decimal::new(10, 2)).round()
        );
    }

    #[test]
    fn zero_total_source_gets_zero_discount_and_no_vat_stays_off() {
        let customer = CustomerInfo { name: "최유나".into(), ..Default::default() };
        let source = Quote::draft("Q-empty", customer);
        let outcome =
            transformer().upgrade(&source, ProductGrade::Premium, None).expect("upgrade");

        assert_eq!(outcome.quote.discount_amount, Decimal::ZERO);
        assert_eq!(outcome.quote.vat_amount, Decimal::ZERO);
        assert_eq!(outcome.quote.final_amount, Decimal::ZERO);
    }

    #[test]
    fn upgrading_onto_an_existing_sibling_keeps_its_identity_and_is_stable() {
        let source = standard_quote();
        let transformer = transformer();
        let first = transformer.upgrade(&source, ProductGrade::Premium, None).expect("first");
        let second = transformer
            .upgrade(&source, ProductGrade::Premium, Some(&first.quote))
            .expect("second");

        assert!(!second.created);
        assert_eq!(second.quote.id, first.quote.id);
        assert_eq!(second.quote.items, first.quote.items);
        assert_eq!(second.quote.scalars(), first.quote.scalars());
    }

    #[test]
    fn standard_upgrade_of_a_base_quote_rewrites_it_in_place() {
        let source = standard_quote();
        let outcome =
            transformer().upgrade(&source, ProductGrade::Standard, None).expect("upgrade");

        assert!(!outcome.created);
        assert_eq!(outcome.quote.id, source.id);
        assert_eq!(outcome.quote.quote_number, source.quote_number);
    }
}
