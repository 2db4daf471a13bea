use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use renoquote_core::audit::{AuditContext, TracingAuditSink};
use renoquote_core::config::AppConfig;
use renoquote_core::cpq::{ComposeRequest, DeterministicCostAggregator, GradeTransformer};
use renoquote_core::domain::catalog::ProductGrade;
use renoquote_core::domain::quote::{CustomerInfo, PropertyInfo, Quote, QuoteStatus};
use renoquote_core::editor::{EditOutcome, QuoteEdit, QuoteEditor};
use renoquote_core::errors::DomainError;
use renoquote_core::store::QuoteFilter;
use renoquote_core::versioning::VersionStore;
use renoquote_db::{DbPool, SqlQuoteStore};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::commands::estimate::{compose, load_catalog, stage_analysis};
use crate::commands::{application_failure, run_with_database, CommandResult, Failure};

const ACTOR: &str = "cli";

#[derive(Debug, Clone, Args)]
pub struct CreateArgs {
    #[arg(long, help = "Analyzer response recorded as JSON")]
    pub analysis: PathBuf,
    #[arg(long, help = "Business quote number, e.g. Q-2026-0001")]
    pub number: String,
    #[arg(long, help = "Customer name")]
    pub customer: String,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long, help = "Exclusive area in ㎡")]
    pub size: Option<Decimal>,
    #[arg(long, default_value = "일반", help = "일반 | 중급 | 고급")]
    pub grade: String,
    #[arg(long)]
    pub estimate_id: Option<String>,
    #[arg(long)]
    pub floorplan_id: Option<String>,
    #[arg(long, help = "Create the quote without VAT")]
    pub no_vat: bool,
    #[arg(long, default_value = "0")]
    pub discount: Decimal,
    #[arg(long)]
    pub discount_reason: Option<String>,
}

/// Wiring for one command invocation against the SQLite store.
struct Engine {
    store: Arc<SqlQuoteStore>,
    audit: Arc<TracingAuditSink>,
    editor: QuoteEditor<SqlQuoteStore, DeterministicCostAggregator>,
    versions: VersionStore<SqlQuoteStore>,
    context: AuditContext,
}

impl Engine {
    fn new(config: &AppConfig, pool: DbPool) -> Self {
        let store = Arc::new(SqlQuoteStore::new(pool));
        let audit = Arc::new(TracingAuditSink);
        Self {
            editor: QuoteEditor::new(store.clone(), config.pricing.aggregator(), audit.clone()),
            versions: VersionStore::new(store.clone(), audit.clone()),
            store,
            audit,
            context: AuditContext::system(ACTOR),
        }
    }

    async fn quote(&self, number: &str) -> Result<Quote, Failure> {
        self.editor.find_by_number(number).await.map_err(application_failure)
    }

    async fn apply(&self, number: &str, edit: QuoteEdit) -> Result<EditOutcome, Failure> {
        let quote = self.quote(number).await?;
        self.editor.apply(&self.context, &quote.id, edit).await.map_err(application_failure)
    }

    async fn edit(&self, command: &str, number: &str, edit: QuoteEdit) -> CommandResult {
        match self.apply(number, edit).await {
            Ok(outcome) => CommandResult::success_with(
                command,
                format!(
                    "quote {number} updated (backup v{}), final amount {}",
                    outcome.backup_version, outcome.quote.final_amount
                ),
                json!({ "quote": outcome.quote, "backup_version": outcome.backup_version }),
            ),
            Err((error_class, message, exit_code)) => {
                CommandResult::failure(command, error_class, message, exit_code)
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct VersionSummary {
    id: String,
    version_number: u32,
    saved_reason: String,
    final_amount: Decimal,
    items: usize,
    content_hash: String,
    created_at: String,
}

#[derive(Debug, Serialize)]
struct QuoteSummary {
    id: String,
    quote_number: String,
    customer: String,
    grade: ProductGrade,
    status: QuoteStatus,
    final_amount: Decimal,
    updated_at: String,
}

pub fn create(args: CreateArgs) -> CommandResult {
    run_with_database("quote create", |config, pool| async move {
        let grade =
            ProductGrade::parse(&args.grade).map_err(|error| application_failure(error.into()))?;
        if args.discount < Decimal::ZERO {
            return Err(application_failure(
                DomainError::validation("discount_amount must not be negative").into(),
            ));
        }
        let (intake, key) = stage_analysis(&config, &args.analysis, args.floorplan_id).await?;
        let staged = intake.peek(&key).map_err(application_failure)?;

        let composed = compose(
            &config,
            &pool,
            ComposeRequest {
                quote_number: args.number,
                customer: CustomerInfo {
                    name: args.customer,
                    phone: args.phone,
                    email: args.email,
                },
                property: PropertyInfo {
                    address: args.address,
                    property_type: None,
                    size: args.size,
                },
                estimate_id: args.estimate_id,
                floorplan_id: staged.floorplan_id,
                grade,
                analysis: staged.analysis,
                vat_enabled: !args.no_vat,
                discount_amount: args.discount,
                discount_reason: args.discount_reason,
            },
        )
        .await?;

        let engine = Engine::new(&config, pool);
        let quote = engine
            .editor
            .create(&engine.context, composed.quote)
            .await
            .map_err(application_failure)?;
        intake.claim(&key).map_err(application_failure)?;
        Ok(CommandResult::success_with(
            "quote create",
            format!(
                "quote {} created with final amount {}",
                quote.quote_number, quote.final_amount
            ),
            json!({ "quote": quote, "areas": composed.areas, "warnings": composed.warnings }),
        ))
    })
}

pub fn show(number: &str) -> CommandResult {
    run_with_database("quote show", |config, pool| async move {
        let engine = Engine::new(&config, pool);
        let quote = engine.quote(number).await?;
        Ok(CommandResult::success_with(
            "quote show",
            format!("quote {} ({})", quote.quote_number, quote.status.as_str()),
            quote,
        ))
    })
}

pub fn list(status: Option<&str>, limit: Option<u32>) -> CommandResult {
    run_with_database("quote list", |config, pool| async move {
        let status = status.map(parse_status).transpose()?;
        let engine = Engine::new(&config, pool);
        let quotes = engine
            .editor
            .list(&QuoteFilter { status, estimate_id: None, limit })
            .await
            .map_err(application_failure)?;

        let summaries = quotes
            .iter()
            .map(|quote| QuoteSummary {
                id: quote.id.to_string(),
                quote_number: quote.quote_number.clone(),
                customer: quote.customer.name.clone(),
                grade: quote.grade,
                status: quote.status,
                final_amount: quote.final_amount,
                updated_at: quote.updated_at.to_rfc3339(),
            })
            .collect::<Vec<_>>();
        Ok(CommandResult::success_with(
            "quote list",
            format!("{} quotes", summaries.len()),
            summaries,
        ))
    })
}

pub fn versions(number: &str) -> CommandResult {
    run_with_database("quote versions", |config, pool| async move {
        let engine = Engine::new(&config, pool);
        let quote = engine.quote(number).await?;
        let history = engine.versions.history(&quote.id).await.map_err(application_failure)?;

        let summaries = history
            .iter()
            .map(|version| VersionSummary {
                id: version.id.to_string(),
                version_number: version.version_number,
                saved_reason: version.saved_reason.clone(),
                final_amount: version.scalars.final_amount,
                items: version.items.len(),
                content_hash: version.content_hash.clone(),
                created_at: version.created_at.to_rfc3339(),
            })
            .collect::<Vec<_>>();
        Ok(CommandResult::success_with(
            "quote versions",
            format!("quote {number} has {} versions", summaries.len()),
            summaries,
        ))
    })
}

pub fn snapshot(number: &str, reason: &str) -> CommandResult {
    run_with_database("quote snapshot", |config, pool| async move {
        let engine = Engine::new(&config, pool);
        let quote = engine.quote(number).await?;
        let version = engine
            .versions
            .snapshot(&engine.context, &quote, reason)
            .await
            .map_err(application_failure)?;
        Ok(CommandResult::success_with(
            "quote snapshot",
            format!("saved quote {number} as v{}", version.version_number),
            json!({ "version_id": version.id, "version_number": version.version_number }),
        ))
    })
}

pub fn rollback(number: &str, version_number: u32) -> CommandResult {
    run_with_database("quote rollback", |config, pool| async move {
        let engine = Engine::new(&config, pool);
        let quote = engine.quote(number).await?;
        let history = engine.versions.history(&quote.id).await.map_err(application_failure)?;
        let target = history
            .iter()
            .find(|version| version.version_number == version_number)
            .ok_or_else(|| {
                application_failure(
                    DomainError::not_found("quote version", format!("{number} v{version_number}"))
                        .into(),
                )
            })?;

        let outcome = engine
            .versions
            .rollback_with_backup(&engine.context, &quote.id, &target.id)
            .await
            .map_err(application_failure)?;
        Ok(CommandResult::success_with(
            "quote rollback",
            format!(
                "quote {number} restored to v{} (backup v{})",
                outcome.restored_version, outcome.backup.version_number
            ),
            json!({
                "quote": outcome.quote,
                "restored_version": outcome.restored_version,
                "backup_version": outcome.backup.version_number,
            }),
        ))
    })
}

pub fn upgrade(number: &str, grade: &str) -> CommandResult {
    run_with_database("quote upgrade", |config, pool| async move {
        let grade = ProductGrade::parse(grade).map_err(|error| application_failure(error.into()))?;
        let catalog = load_catalog(&pool).await?;
        let engine = Engine::new(&config, pool);
        let source = engine.quote(number).await?;

        let transformer = GradeTransformer::new(catalog, config.pricing.aggregator());
        let outcome = transformer
            .upgrade_persisted(
                engine.store.as_ref(),
                engine.audit.as_ref(),
                &engine.context,
                &source.id,
                grade,
            )
            .await
            .map_err(application_failure)?;

        let verb = if outcome.created { "created" } else { "updated" };
        Ok(CommandResult::success_with(
            "quote upgrade",
            format!(
                "{verb} {} at {grade}: {} replaced, {} unchanged, {} ambiguous",
                outcome.quote.quote_number,
                outcome.replaced_items,
                outcome.unchanged_items,
                outcome.ambiguous_items
            ),
            outcome,
        ))
    })
}

pub fn set_status(number: &str, status: &str) -> CommandResult {
    run_with_database("quote status", |config, pool| async move {
        let status = parse_status(status)?;
        let engine = Engine::new(&config, pool);
        Ok(engine.edit("quote status", number, QuoteEdit::Transition { status }).await)
    })
}

pub fn set_discount(number: &str, amount: Decimal, reason: Option<String>) -> CommandResult {
    run_with_database("quote discount", |config, pool| async move {
        let engine = Engine::new(&config, pool);
        Ok(engine.edit("quote discount", number, QuoteEdit::SetDiscount { amount, reason }).await)
    })
}

pub fn set_vat(number: &str, enabled: bool) -> CommandResult {
    run_with_database("quote vat", |config, pool| async move {
        let engine = Engine::new(&config, pool);
        Ok(engine.edit("quote vat", number, QuoteEdit::SetVat { enabled }).await)
    })
}

pub fn delete(number: &str) -> CommandResult {
    run_with_database("quote delete", |config, pool| async move {
        let engine = Engine::new(&config, pool);
        let quote = engine.quote(number).await?;
        engine.editor.delete(&engine.context, &quote.id).await.map_err(application_failure)?;
        Ok(CommandResult::success("quote delete", format!("quote {number} deleted; versions kept")))
    })
}

fn parse_status(value: &str) -> Result<QuoteStatus, Failure> {
    QuoteStatus::parse(value).ok_or_else(|| {
        application_failure(
            DomainError::validation(format!(
                "unsupported status `{value}` \
                 (expected draft|confirmed|sent|accepted|rejected|expired)"
            ))
            .into(),
        )
    })
}
