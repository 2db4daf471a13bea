//! Quantity estimation, pricing and grade derivation.

pub mod catalog;
pub mod composer;
pub mod grade;
pub mod pricing;
pub mod quantity;

pub use catalog::{Catalog, PricingCatalog};
pub use composer::{ComposeRequest, ComposedQuote, CompositionWarning, QuoteComposer};
pub use grade::{GradeFamilyTable, GradeTransformer, UpgradeOutcome, UpgradePlan};
pub use pricing::{CostAggregator, CostBreakdown, CostInput, DeterministicCostAggregator};
pub use quantity::{EstimatedAreas, MaterialLine, QuantityEstimator};
