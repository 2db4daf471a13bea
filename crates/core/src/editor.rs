//! Ordinary mutations of persisted quotes.
//!
//! Every edit recomputes the totals and is committed together with a backup
//! snapshot of the state it replaces, so any edit can be rolled back.

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, EVENT_QUOTE_DELETED,
    EVENT_QUOTE_EDITED,
};
use crate::cpq::pricing::{CostAggregator, CostInput};
use crate::domain::quote::{CostType, Quote, QuoteId, QuoteItem, QuoteStatus};
use crate::errors::{ApplicationError, DomainError};
use crate::store::{QuoteFilter, QuoteMutation, QuoteStore};
use crate::versioning::require_id;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuoteEdit {
    ReplaceItems { items: Vec<QuoteItem> },
    SetDiscount { amount: Decimal, reason: Option<String> },
    SetVat { enabled: bool },
    SetOtherCost { amount: Decimal },
    Transition { status: QuoteStatus },
    SetNotes { notes: Option<String> },
}

impl QuoteEdit {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ReplaceItems { .. } => "replace items",
            Self::SetDiscount { .. } => "discount",
            Self::SetVat { .. } => "vat",
            Self::SetOtherCost { .. } => "other cost",
            Self::Transition { .. } => "status",
            Self::SetNotes { .. } => "notes",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EditOutcome {
    pub quote: Quote,
    pub backup_version: u32,
}

pub struct QuoteEditor<S: ?Sized, A> {
    store: Arc<S>,
    aggregator: A,
    audit: Arc<dyn AuditSink>,
}

impl<S, A> QuoteEditor<S, A>
where
    S: QuoteStore + ?Sized,
    A: CostAggregator,
{
    pub fn new(store: Arc<S>, aggregator: A, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, aggregator, audit }
    }

    /// Validates, prices and inserts a new quote. No version is recorded.
    pub async fn create(
        &self,
        context: &AuditContext,
        mut quote: Quote,
    ) -> Result<Quote, ApplicationError> {
        require_id("quote id", &quote.id.0)?;
        if quote.quote_number.trim().is_empty() {
            return Err(DomainError::validation("quote number must not be empty").into());
        }
        if quote.customer.name.trim().is_empty() {
            return Err(DomainError::validation("customer name must not be empty").into());
        }
        let vat_enabled = quote.vat_enabled();
        self.recompute(&mut quote, vat_enabled)?;

        self.store.insert(&quote).await?;
        info!(
            event_name = "quote.created",
            correlation_id = %context.correlation_id,
            quote_id = %quote.id,
            quote_number = %quote.quote_number,
            items = quote.items.len(),
            "quote created"
        );
        Ok(quote)
    }

    pub async fn get(&self, quote_id: &QuoteId) -> Result<Quote, ApplicationError> {
        require_id("quote id", &quote_id.0)?;
        self.store
            .get_by_id(quote_id)
            .await?
            .ok_or_else(|| DomainError::not_found("quote", &quote_id.0).into())
    }

    pub async fn find_by_number(&self, quote_number: &str) -> Result<Quote, ApplicationError> {
        self.store
            .find_by_number(quote_number)
            .await?
            .ok_or_else(|| DomainError::not_found("quote", quote_number).into())
    }

    pub async fn list(&self, filter: &QuoteFilter) -> Result<Vec<Quote>, ApplicationError> {
        Ok(self.store.list_by_filter(filter).await?)
    }

    pub async fn apply(
        &self,
        context: &AuditContext,
        quote_id: &QuoteId,
        edit: QuoteEdit,
    ) -> Result<EditOutcome, ApplicationError> {
        let current = self.get(quote_id).await?;
        let label = edit.label();
        let mut edited = current.clone();
        let mut vat_enabled = current.vat_enabled();

        match edit {
            QuoteEdit::ReplaceItems { items } => edited.items = items,
            QuoteEdit::SetDiscount { amount, reason } => {
                if amount < Decimal::ZERO {
                    return Err(
                        DomainError::validation("discount_amount must not be negative").into()
                    );
                }
                edited.discount_amount = amount;
                edited.discount_reason = reason;
            }
            QuoteEdit::SetVat { enabled } => vat_enabled = enabled,
            QuoteEdit::SetOtherCost { amount } => edited.other_cost = amount,
            QuoteEdit::Transition { status } => edited.transition_to(status)?,
            QuoteEdit::SetNotes { notes } => edited.notes = notes,
        }
        self.recompute(&mut edited, vat_enabled)?;

        let committed = self
            .store
            .commit(
                QuoteMutation::new(quote_id.clone())
                    .with_backup(format!("pre-edit backup ({label})"))
                    .with_scalars(edited.scalars())
                    .with_items(edited.items),
            )
            .await?;
        let backup_version = committed
            .backup
            .map(|version| version.version_number)
            .ok_or_else(|| ApplicationError::Persistence("edit committed without backup".into()))?;

        info!(
            event_name = "quote.edited",
            correlation_id = %context.correlation_id,
            quote_id = %quote_id,
            edit = label,
            backup_version,
            final_amount = %committed.quote.final_amount,
            "quote edited"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(quote_id.clone()),
                context,
                EVENT_QUOTE_EDITED,
                AuditCategory::Editing,
                AuditOutcome::Success,
            )
            .with_metadata("edit", label)
            .with_metadata("backup_version", backup_version),
        );

        Ok(EditOutcome { quote: committed.quote, backup_version })
    }

    /// Administrative delete. Items go with the quote; versions stay.
    pub async fn delete(
        &self,
        context: &AuditContext,
        quote_id: &QuoteId,
    ) -> Result<(), ApplicationError> {
        require_id("quote id", &quote_id.0)?;
        if !self.store.delete_cascade(quote_id).await? {
            return Err(DomainError::not_found("quote", &quote_id.0).into());
        }

        info!(
            event_name = "quote.deleted",
            correlation_id = %context.correlation_id,
            quote_id = %quote_id,
            "quote deleted"
        );
        self.audit.emit(AuditEvent::new(
            Some(quote_id.clone()),
            context,
            EVENT_QUOTE_DELETED,
            AuditCategory::Persistence,
            AuditOutcome::Success,
        ));
        Ok(())
    }

    fn recompute(&self, quote: &mut Quote, vat_enabled: bool) -> Result<(), DomainError> {
        let mut seen = HashSet::with_capacity(quote.items.len());
        for item in &mut quote.items {
            require_id("item id", &item.id.0)?;
            if !seen.insert(item.id.clone()) {
                return Err(DomainError::validation(format!("duplicate item id `{}`", item.id)));
            }
            item.validate()?;
            if item.cost_type != CostType::Composite {
                item.reprice();
            }
        }
        if quote.other_cost < Decimal::ZERO {
            return Err(DomainError::validation("other_cost must not be negative"));
        }

        let breakdown = self.aggregator.aggregate_with(
            &quote.items,
            CostInput::new(quote.discount_amount, vat_enabled).with_other_cost(quote.other_cost),
        )?;
        quote.apply_breakdown(&breakdown);
        Ok(())
    }
}
