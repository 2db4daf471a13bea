use std::path::Path;
use std::sync::Arc;

use renoquote_core::analysis::RecordedResponseAnalyzer;
use renoquote_core::config::AppConfig;
use renoquote_core::cpq::{
    Catalog, ComposeRequest, ComposedQuote, CompositionWarning, EstimatedAreas, QuoteComposer,
};
use renoquote_core::domain::catalog::ProductGrade;
use renoquote_core::domain::quote::{CustomerInfo, PropertyInfo, QuoteItem};
use renoquote_core::staging::{AnalysisIntake, StagingCache, StagingKey};
use renoquote_db::{DbPool, SqlCatalogRepository};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::commands::{application_failure, run_with_database, CommandResult, Failure};

const ESTIMATE_NUMBER: &str = "ESTIMATE";
const ESTIMATE_CUSTOMER: &str = "미정";

#[derive(Debug, Serialize)]
struct EstimateReport<'a> {
    grade: ProductGrade,
    areas: Option<EstimatedAreas>,
    items: &'a [QuoteItem],
    labor_cost: Decimal,
    material_cost: Decimal,
    vat_amount: Decimal,
    total_amount: Decimal,
    final_amount: Decimal,
    warnings: &'a [CompositionWarning],
}

/// Prices an analysis against the stored catalog without persisting anything.
pub fn run(analysis_path: &Path, grade: &str, vat_enabled: bool) -> CommandResult {
    run_with_database("estimate", |config, pool| async move {
        let grade = ProductGrade::parse(grade).map_err(|error| application_failure(error.into()))?;
        let (intake, key) = stage_analysis(&config, analysis_path, None).await?;
        let analysis = intake.peek(&key).map_err(application_failure)?.analysis;
        let customer = CustomerInfo { name: ESTIMATE_CUSTOMER.to_string(), ..Default::default() };

        let composed = compose(
            &config,
            &pool,
            ComposeRequest {
                quote_number: ESTIMATE_NUMBER.to_string(),
                customer,
                property: PropertyInfo::default(),
                estimate_id: None,
                floorplan_id: None,
                grade,
                analysis,
                vat_enabled,
                discount_amount: Decimal::ZERO,
                discount_reason: None,
            },
        )
        .await?;

        let quote = &composed.quote;
        let report = EstimateReport {
            grade,
            areas: composed.areas,
            items: &quote.items,
            labor_cost: quote.labor_cost,
            material_cost: quote.material_cost,
            vat_amount: quote.vat_amount,
            total_amount: quote.total_amount,
            final_amount: quote.final_amount,
            warnings: &composed.warnings,
        };
        let message = format!(
            "{} line items at {grade}, final amount {}",
            quote.items.len(),
            quote.final_amount
        );
        Ok(CommandResult::success_with("estimate", message, report))
    })
}

pub(crate) type Intake = AnalysisIntake<RecordedResponseAnalyzer>;

/// Reads an analyzer response recorded as JSON and stages it once validated.
pub(crate) async fn stage_analysis(
    config: &AppConfig,
    path: &Path,
    floorplan_id: Option<String>,
) -> Result<(Intake, StagingKey), Failure> {
    let bytes = tokio::fs::read(path).await.map_err(|error| {
        ("input", format!("could not read analysis `{}`: {error}", path.display()), 7u8)
    })?;
    let intake = AnalysisIntake::new(
        RecordedResponseAnalyzer,
        Arc::new(StagingCache::from_config(&config.staging)),
    );
    let source_name = path.file_name().map(|name| name.to_string_lossy().into_owned());
    let key = intake
        .stage(&bytes, "application/json", source_name, floorplan_id)
        .await
        .map_err(application_failure)?;
    Ok((intake, key))
}

pub(crate) async fn load_catalog(pool: &DbPool) -> Result<Catalog, Failure> {
    let catalog = SqlCatalogRepository::new(pool.clone())
        .load()
        .await
        .map_err(|error| ("persistence", error.to_string(), 9u8))?;
    if catalog.is_empty() {
        return Err((
            "catalog_empty",
            "pricing catalog is empty; run `renoquote seed` first".to_string(),
            6u8,
        ));
    }
    Ok(catalog)
}

pub(crate) async fn compose(
    config: &AppConfig,
    pool: &DbPool,
    request: ComposeRequest,
) -> Result<ComposedQuote, Failure> {
    let catalog = load_catalog(pool).await?;
    let composer =
        QuoteComposer::new(catalog, config.pricing.aggregator(), config.analysis.min_confidence);
    let composed = composer.compose(request).map_err(|error| application_failure(error.into()))?;

    info!(
        event_name = "quote.composed",
        quote_number = %composed.quote.quote_number,
        grade = %composed.quote.grade,
        items = composed.quote.items.len(),
        warnings = composed.warnings.len(),
        "analysis composed into quote"
    );
    Ok(composed)
}
