//! Append-only version history and rollback for persisted quotes.

use std::sync::Arc;

use tracing::{info, warn};

use crate::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, EVENT_ROLLBACK_APPLIED,
    EVENT_VERSION_SAVED,
};
use crate::domain::quote::{Quote, QuoteId};
use crate::domain::version::{QuoteVersion, QuoteVersionId};
use crate::errors::{ApplicationError, DomainError};
use crate::store::{QuoteMutation, QuoteStore, StoreError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollbackOutcome {
    pub quote: Quote,
    /// Snapshot of the state that the rollback discarded.
    pub backup: QuoteVersion,
    pub restored_version: u32,
}

pub struct VersionStore<S: ?Sized> {
    store: Arc<S>,
    audit: Arc<dyn AuditSink>,
}

impl<S: ?Sized> Clone for VersionStore<S> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), audit: Arc::clone(&self.audit) }
    }
}

impl<S> VersionStore<S>
where
    S: QuoteStore + ?Sized,
{
    pub fn new(store: Arc<S>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Appends a snapshot of `quote`. Never idempotent: every call adds a version.
    pub async fn snapshot(
        &self,
        context: &AuditContext,
        quote: &Quote,
        reason: &str,
    ) -> Result<QuoteVersion, ApplicationError> {
        require_id("quote id", &quote.id.0)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::validation("saved reason must not be empty").into());
        }

        let version = self.store.append_version(quote, reason).await?;
        self.record_saved(context, &version);
        Ok(version)
    }

    /// Snapshots the persisted state of `quote_id`.
    pub async fn save_version(
        &self,
        context: &AuditContext,
        quote_id: &QuoteId,
        reason: &str,
    ) -> Result<QuoteVersion, ApplicationError> {
        let quote = self.load_quote(quote_id).await?;
        self.snapshot(context, &quote, reason).await
    }

    pub async fn history(&self, quote_id: &QuoteId) -> Result<Vec<QuoteVersion>, ApplicationError> {
        require_id("quote id", &quote_id.0)?;
        Ok(self.store.list_versions(quote_id).await?)
    }

    pub async fn get_version(
        &self,
        version_id: &QuoteVersionId,
    ) -> Result<QuoteVersion, ApplicationError> {
        require_id("version id", &version_id.0)?;
        self.store
            .get_version(version_id)
            .await?
            .ok_or_else(|| DomainError::not_found("quote version", &version_id.0).into())
    }

    /// Restores `target_version_id` onto `quote_id` and returns the restored quote.
    pub async fn rollback(
        &self,
        context: &AuditContext,
        quote_id: &QuoteId,
        target_version_id: &QuoteVersionId,
    ) -> Result<Quote, ApplicationError> {
        self.rollback_with_backup(context, quote_id, target_version_id)
            .await
            .map(|outcome| outcome.quote)
    }

    /// Backup, scalar overwrite and item replacement are committed as one
    /// unit of work; if the backup cannot be written nothing is restored.
    pub async fn rollback_with_backup(
        &self,
        context: &AuditContext,
        quote_id: &QuoteId,
        target_version_id: &QuoteVersionId,
    ) -> Result<RollbackOutcome, ApplicationError> {
        require_id("quote id", &quote_id.0)?;
        require_id("version id", &target_version_id.0)?;

        let target = match self.store.get_version(target_version_id).await? {
            Some(version) if version.quote_id == *quote_id => version,
            Some(_) | None => {
                return Err(DomainError::not_found("quote version", &target_version_id.0).into())
            }
        };
        let current = self.load_quote(quote_id).await?;
        let unchanged = target.matches(&current).map_err(StoreError::from)?;
        if unchanged {
            info!(
                event_name = "quote.rollback.noop_target",
                correlation_id = %context.correlation_id,
                quote_id = %quote_id,
                target_version = target.version_number,
                "rollback target equals current state; backup is still recorded"
            );
        }

        let mutation = QuoteMutation::new(quote_id.clone())
            .with_backup(format!(
                "pre-rollback backup (restoring v{})",
                target.version_number
            ))
            .with_scalars(target.scalars.clone())
            .with_items(target.items.clone());

        let committed = match self.store.commit(mutation).await {
            Ok(committed) => committed,
            Err(error) => {
                warn!(
                    event_name = "quote.rollback.failed",
                    correlation_id = %context.correlation_id,
                    quote_id = %quote_id,
                    target_version = target.version_number,
                    error = %error,
                    "rollback was not applied"
                );
                self.audit.emit(
                    AuditEvent::new(
                        Some(quote_id.clone()),
                        context,
                        EVENT_ROLLBACK_APPLIED,
                        AuditCategory::Versioning,
                        AuditOutcome::Failed,
                    )
                    .with_metadata("target_version", target.version_number)
                    .with_metadata("error", &error),
                );
                return Err(error.into());
            }
        };

        let backup = committed.backup.ok_or_else(|| {
            ApplicationError::Persistence("store committed a rollback without a backup".into())
        })?;
        self.record_saved(context, &backup);

        info!(
            event_name = "quote.rollback.applied",
            correlation_id = %context.correlation_id,
            quote_id = %quote_id,
            target_version = target.version_number,
            backup_version = backup.version_number,
            upserted_items = committed.patch.upserts.len(),
            deleted_items = committed.patch.deletes.len(),
            "quote rolled back"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(quote_id.clone()),
                context,
                EVENT_ROLLBACK_APPLIED,
                AuditCategory::Versioning,
                AuditOutcome::Success,
            )
            .with_metadata("target_version", target.version_number)
            .with_metadata("backup_version", backup.version_number),
        );

        Ok(RollbackOutcome {
            quote: committed.quote,
            backup,
            restored_version: target.version_number,
        })
    }

    async fn load_quote(&self, quote_id: &QuoteId) -> Result<Quote, ApplicationError> {
        require_id("quote id", &quote_id.0)?;
        self.store
            .get_by_id(quote_id)
            .await?
            .ok_or_else(|| DomainError::not_found("quote", &quote_id.0).into())
    }

    fn record_saved(&self, context: &AuditContext, version: &QuoteVersion) {
        info!(
            event_name = "quote.version.saved",
            correlation_id = %context.correlation_id,
            quote_id = %version.quote_id,
            version_number = version.version_number,
            reason = %version.saved_reason,
            "quote version saved"
        );
        self.audit.emit(
            AuditEvent::new(
                Some(version.quote_id.clone()),
                context,
                EVENT_VERSION_SAVED,
                AuditCategory::Versioning,
                AuditOutcome::Success,
            )
            .with_metadata("version_number", version.version_number)
            .with_metadata("reason", &version.saved_reason),
        );
    }
}

pub(crate) fn require_id(label: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{label} must not be empty")));
    }
    Ok(())
}
