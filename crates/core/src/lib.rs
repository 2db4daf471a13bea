pub mod analysis;
pub mod audit;
pub mod config;
pub mod cpq;
pub mod domain;
pub mod editor;
pub mod errors;
pub mod staging;
pub mod store;
pub mod versioning;

pub use analysis::{parse_analysis, FloorplanAnalyzer, RecordedResponseAnalyzer};
pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::catalog::{CompositeCost, LaborCost, MaterialFamily, MaterialPrice, ProductGrade};
pub use domain::quote::{
    CostType, CustomerInfo, PropertyInfo, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteScalars,
    QuoteStatus,
};
pub use domain::room::{FloorplanAnalysis, RoomAnalysis, RoomType};
pub use domain::version::{QuoteVersion, QuoteVersionId};
pub use editor::{EditOutcome, QuoteEdit, QuoteEditor};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use staging::{AnalysisIntake, StagedAnalysis, StagingCache, StagingKey};
pub use store::{CommitOutcome, ItemPatch, QuoteFilter, QuoteMutation, QuoteStore, StoreError};
pub use versioning::{RollbackOutcome, VersionStore};
