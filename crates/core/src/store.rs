//! Persistence port for quotes and their version history.
//!
//! Implementations must apply a [`QuoteMutation`] atomically: the optional
//! backup snapshot, the scalar overwrite and the item patch either all become
//! visible or none do.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::quote::{Quote, QuoteId, QuoteItem, QuoteItemId, QuoteScalars, QuoteStatus};
use crate::domain::version::{QuoteVersion, QuoteVersionId};
use crate::errors::DomainError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("store conflict: {0}")]
    Conflict(String),
    #[error("store decode error: {0}")]
    Decode(String),
    #[error("store encode error: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuoteFilter {
    pub status: Option<QuoteStatus>,
    pub estimate_id: Option<String>,
    pub limit: Option<u32>,
}

/// Difference between two item sets, keyed by item id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ItemPatch {
    pub upserts: Vec<QuoteItem>,
    pub deletes: Vec<QuoteItemId>,
}

impl ItemPatch {
    pub fn between(current: &[QuoteItem], desired: &[QuoteItem]) -> Result<Self, DomainError> {
        let mut seen = HashSet::with_capacity(desired.len());
        for item in desired {
            if !seen.insert(&item.id) {
                return Err(DomainError::validation(format!("duplicate item id `{}`", item.id)));
            }
        }

        let current_by_id =
            current.iter().map(|item| (&item.id, item)).collect::<HashMap<_, _>>();

        let upserts = desired
            .iter()
            .filter(|item| current_by_id.get(&item.id).map_or(true, |existing| *existing != *item))
            .cloned()
            .collect();
        let deletes = current
            .iter()
            .filter(|item| !seen.contains(&item.id))
            .map(|item| item.id.clone())
            .collect();

        Ok(Self { upserts, deletes })
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Applies the patch in place; applying it a second time changes nothing.
    pub fn apply(&self, items: &mut Vec<QuoteItem>) {
        let deleted = self.deletes.iter().collect::<HashSet<_>>();
        items.retain(|item| !deleted.contains(&item.id));

        for upsert in &self.upserts {
            match items.iter_mut().find(|item| item.id == upsert.id) {
                Some(existing) => *existing = upsert.clone(),
                None => items.push(upsert.clone()),
            }
        }

        items.sort_by(QuoteItem::presentation_cmp);
    }
}

/// One atomic unit of work against a persisted quote.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuoteMutation {
    pub quote_id: QuoteId,
    /// Snapshot the persisted state under this reason before applying anything.
    pub backup_reason: Option<String>,
    pub scalars: Option<QuoteScalars>,
    /// Desired item set; the store diffs it against the persisted items.
    pub items: Option<Vec<QuoteItem>>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteMutation {
    pub fn new(quote_id: QuoteId) -> Self {
        Self { quote_id, backup_reason: None, scalars: None, items: None, updated_at: Utc::now() }
    }

    pub fn with_backup(mut self, reason: impl Into<String>) -> Self {
        self.backup_reason = Some(reason.into());
        self
    }

    pub fn with_scalars(mut self, scalars: QuoteScalars) -> Self {
        self.scalars = Some(scalars);
        self
    }

    pub fn with_items(mut self, items: Vec<QuoteItem>) -> Self {
        self.items = Some(items);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitOutcome {
    pub quote: Quote,
    pub backup: Option<QuoteVersion>,
    pub patch: ItemPatch,
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn get_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError>;

    async fn find_by_number(&self, quote_number: &str) -> Result<Option<Quote>, StoreError>;

    async fn list_by_filter(&self, filter: &QuoteFilter) -> Result<Vec<Quote>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the id or quote number is taken.
    async fn insert(&self, quote: &Quote) -> Result<(), StoreError>;

    /// Applies `mutation` atomically and returns the resulting quote.
    async fn commit(&self, mutation: QuoteMutation) -> Result<CommitOutcome, StoreError>;

    /// Removes the quote and its items. Versions are kept.
    async fn delete_cascade(&self, id: &QuoteId) -> Result<bool, StoreError>;

    /// Appends a snapshot of `quote` under the next version number.
    async fn append_version(&self, quote: &Quote, reason: &str)
        -> Result<QuoteVersion, StoreError>;

    async fn get_version(&self, id: &QuoteVersionId) -> Result<Option<QuoteVersion>, StoreError>;

    /// Versions ordered by ascending version number.
    async fn list_versions(&self, quote_id: &QuoteId) -> Result<Vec<QuoteVersion>, StoreError>;

    async fn update_scalars(&self, id: &QuoteId, scalars: QuoteScalars) -> Result<(), StoreError> {
        self.commit(QuoteMutation::new(id.clone()).with_scalars(scalars)).await.map(|_| ())
    }

    async fn replace_items(&self, id: &QuoteId, items: Vec<QuoteItem>) -> Result<(), StoreError> {
        self.commit(QuoteMutation::new(id.clone()).with_items(items)).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::ItemPatch;
    use crate::domain::quote::{CostType, QuoteItem, QuoteItemId};

    fn item(name: &str, sort_order: i32) -> QuoteItem {
        let mut item = QuoteItem::new(
            "도배",
            name,
            Decimal::from(10),
            "㎡",
            Decimal::from(9_000),
            CostType::Material,
        );
        item.sort_order = sort_order;
        item
    }

    #[test]
    fn patch_contains_only_changed_new_and_removed_items() {
        let kept = item("합지 벽지", 1);
        let changed = item("실크 벽지", 2);
        let removed = item("수입 실크 벽지", 3);
        let current = vec![kept.clone(), changed.clone(), removed.clone()];

        let mut edited = changed.clone();
        edited.quantity = Decimal::from(12);
        edited.reprice();
        let added = item("친환경 벽지", 4);

        let patch = ItemPatch::between(&current, &[kept, edited.clone(), added.clone()])
            .expect("patch");

        assert_eq!(patch.upserts, vec![edited, added]);
        assert_eq!(patch.deletes, vec![removed.id]);
    }

    #[test]
    fn applying_a_patch_twice_is_a_no_op() {
        let current = vec![item("a", 1), item("b", 2)];
        let mut desired = vec![item("c", 0), current[1].clone()];
        desired[1].sort_order = 5;

        let patch = ItemPatch::between(&current, &desired).expect("patch");
        let mut items = current.clone();
        patch.apply(&mut items);
        let once = items.clone();
        patch.apply(&mut items);

        assert_eq!(items, once);
        assert_eq!(items, desired);
        assert!(ItemPatch::between(&items, &desired).expect("patch").is_empty());
    }

    #[test]
    fn tied_sort_orders_fall_back_to_item_id() {
        let mut first = item("a", 1);
        first.id = QuoteItemId("item-b".into());
        let mut second = item("b", 1);
        second.id = QuoteItemId("item-a".into());

        let patch = ItemPatch::between(&[], &[first, second]).expect("patch");
        let mut items = Vec::new();
        patch.apply(&mut items);

        let ids = items.iter().map(|item| item.id.0.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["item-a", "item-b"]);
    }

    #[test]
    fn duplicate_item_ids_are_rejected() {
        let first = item("a", 1);
        let duplicate = first.clone();

        assert!(ItemPatch::between(&[], &[first, duplicate]).is_err());
    }
}
