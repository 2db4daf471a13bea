use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use renoquote_core::domain::quote::{Quote, QuoteId, QuoteItem};
use renoquote_core::domain::version::{QuoteVersion, QuoteVersionId};
use renoquote_core::store::{
    CommitOutcome, ItemPatch, QuoteFilter, QuoteMutation, QuoteStore, StoreError,
};

#[derive(Debug, Default)]
struct State {
    quotes: HashMap<String, Quote>,
    versions: Vec<QuoteVersion>,
}

impl State {
    fn next_version_number(&self, quote_id: &QuoteId) -> u32 {
        self.versions
            .iter()
            .filter(|version| &version.quote_id == quote_id)
            .map(|version| version.version_number)
            .max()
            .unwrap_or(0)
            + 1
    }

    fn item_owner(&self, item_id: &str) -> Option<&QuoteId> {
        self.quotes
            .values()
            .find(|quote| quote.items.iter().any(|item| item.id.0 == item_id))
            .map(|quote| &quote.id)
    }
}

/// Store backed by a single lock; every commit holds the write guard throughout.
#[derive(Debug, Default)]
pub struct InMemoryQuoteStore {
    state: RwLock<State>,
}

impl InMemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuoteStore for InMemoryQuoteStore {
    async fn get_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError> {
        let state = self.state.read().await;
        Ok(state.quotes.get(&id.0).cloned())
    }

    async fn find_by_number(&self, quote_number: &str) -> Result<Option<Quote>, StoreError> {
        let state = self.state.read().await;
        Ok(state.quotes.values().find(|quote| quote.quote_number == quote_number).cloned())
    }

    async fn list_by_filter(&self, filter: &QuoteFilter) -> Result<Vec<Quote>, StoreError> {
        let state = self.state.read().await;
        let mut quotes = state
            .quotes
            .values()
            .filter(|quote| filter.status.map_or(true, |status| quote.status == status))
            .filter(|quote| {
                filter
                    .estimate_id
                    .as_ref()
                    .map_or(true, |id| quote.estimate_id.as_ref() == Some(id))
            })
            .cloned()
            .collect::<Vec<_>>();
        quotes.sort_by(|left, right| {
            right.created_at.cmp(&left.created_at).then(left.quote_number.cmp(&right.quote_number))
        });
        if let Some(limit) = filter.limit {
            quotes.truncate(limit as usize);
        }
        Ok(quotes)
    }

    async fn insert(&self, quote: &Quote) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.quotes.contains_key(&quote.id.0) {
            return Err(StoreError::Conflict(format!("quote id `{}` already exists", quote.id)));
        }
        if state.quotes.values().any(|existing| existing.quote_number == quote.quote_number) {
            return Err(StoreError::Conflict(format!(
                "quote number `{}` already exists",
                quote.quote_number
            )));
        }
        if let Some(item) = quote.items.iter().find(|item| state.item_owner(&item.id.0).is_some())
        {
            return Err(StoreError::Conflict(format!("item id `{}` already exists", item.id)));
        }

        let mut stored = quote.clone();
        stored.items.sort_by(QuoteItem::presentation_cmp);
        state.quotes.insert(stored.id.0.clone(), stored);
        Ok(())
    }

    async fn commit(&self, mutation: QuoteMutation) -> Result<CommitOutcome, StoreError> {
        let mut state = self.state.write().await;
        let current = state.quotes.get(&mutation.quote_id.0).cloned().ok_or_else(|| {
            StoreError::Conflict(format!("quote `{}` does not exist", mutation.quote_id))
        })?;

        let patch = match &mutation.items {
            Some(desired) => ItemPatch::between(&current.items, desired)
                .map_err(|error| StoreError::Conflict(error.to_string()))?,
            None => ItemPatch::default(),
        };
        for upsert in &patch.upserts {
            if let Some(owner) = state.item_owner(&upsert.id.0) {
                if owner != &current.id {
                    return Err(StoreError::Conflict(format!(
                        "item id `{}` belongs to quote `{owner}`",
                        upsert.id
                    )));
                }
            }
        }

        let backup = mutation
            .backup_reason
            .as_deref()
            .map(|reason| {
                QuoteVersion::capture(&current, state.next_version_number(&current.id), reason)
            })
            .transpose()?;

        let mut updated = current;
        if let Some(scalars) = mutation.scalars {
            updated.apply_scalars(scalars);
        }
        patch.apply(&mut updated.items);
        updated.updated_at = mutation.updated_at;

        if let Some(version) = &backup {
            state.versions.push(version.clone());
        }
        state.quotes.insert(updated.id.0.clone(), updated.clone());

        Ok(CommitOutcome { quote: updated, backup, patch })
    }

    async fn delete_cascade(&self, id: &QuoteId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.quotes.remove(&id.0).is_some())
    }

    async fn append_version(
        &self,
        quote: &Quote,
        reason: &str,
    ) -> Result<QuoteVersion, StoreError> {
        let mut state = self.state.write().await;
        let version = QuoteVersion::capture(quote, state.next_version_number(&quote.id), reason)?;
        state.versions.push(version.clone());
        Ok(version)
    }

    async fn get_version(&self, id: &QuoteVersionId) -> Result<Option<QuoteVersion>, StoreError> {
        let state = self.state.read().await;
        Ok(state.versions.iter().find(|version| &version.id == id).cloned())
    }

    async fn list_versions(&self, quote_id: &QuoteId) -> Result<Vec<QuoteVersion>, StoreError> {
        let state = self.state.read().await;
        let mut versions = state
            .versions
            .iter()
            .filter(|version| &version.quote_id == quote_id)
            .cloned()
            .collect::<Vec<_>>();
        versions.sort_by_key(|version| version.version_number);
        Ok(versions)
    }
}
