use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::quote::{Quote, QuoteId, QuoteItem, QuoteScalars};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteVersionId(pub String);

impl QuoteVersionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for QuoteVersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An item as it existed when its version was captured. Keeps the live item id.
pub type QuoteVersionItem = QuoteItem;

/// Immutable copy of a quote's scalar fields and item set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteVersion {
    pub id: QuoteVersionId,
    pub quote_id: QuoteId,
    pub version_number: u32,
    pub saved_reason: String,
    pub scalars: QuoteScalars,
    pub items: Vec<QuoteVersionItem>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl QuoteVersion {
    /// Captures `quote` under `version_number`. Items are stored in sort order.
    pub fn capture(
        quote: &Quote,
        version_number: u32,
        saved_reason: impl Into<String>,
    ) -> Result<Self, serde_json::Error> {
        let scalars = quote.scalars();
        let items = quote.sorted_items().into_iter().cloned().collect::<Vec<_>>();
        let content_hash = content_hash(&scalars, &items)?;

        Ok(Self {
            id: QuoteVersionId::generate(),
            quote_id: quote.id.clone(),
            version_number,
            saved_reason: saved_reason.into(),
            scalars,
            items,
            content_hash,
            created_at: Utc::now(),
        })
    }

    /// True when `quote` currently holds exactly this version's content.
    pub fn matches(&self, quote: &Quote) -> Result<bool, serde_json::Error> {
        let items = quote.sorted_items().into_iter().cloned().collect::<Vec<_>>();
        Ok(content_hash(&quote.scalars(), &items)? == self.content_hash)
    }
}

#[derive(Serialize)]
struct VersionContent<'a> {
    scalars: &'a QuoteScalars,
    items: &'a [QuoteItem],
}

pub fn content_hash(
    scalars: &QuoteScalars,
    items: &[QuoteItem],
) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_vec(&VersionContent { scalars, items })?;
    let digest = Sha256::digest(&payload);
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest {
        output.push_str(&format!("{byte:02x}"));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::QuoteVersion;
    use crate::domain::quote::{CostType, CustomerInfo, Quote, QuoteItem};

    fn sample_quote() -> Quote {
        let customer = CustomerInfo { name: "이서연".into(), ..Default::default() };
        let mut quote = Quote::draft("Q-ver-1", customer);
        let mut second = QuoteItem::new(
            "도배",
            "합지 벽지",
            Decimal::new(120, 0),
            "㎡",
            Decimal::new(9_000, 0),
            CostType::Material,
        );
        second.sort_order = 2;
        let mut first = QuoteItem::new(
            "철거",
            "기존 마감재 철거",
            Decimal::new(42, 0),
            "㎡",
            Decimal::new(25_000, 0),
            CostType::Composite,
        );
        first.sort_order = 1;
        quote.items = vec![second, first];
        quote
    }

    #[test]
    fn capture_stores_items_in_sort_order() {
        let quote = sample_quote();
        let version = QuoteVersion::capture(&quote, 1, "manual save").expect("capture");

        let names = version.items.iter().map(|item| item.item_name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["기존 마감재 철거", "합지 벽지"]);
        assert_eq!(version.version_number, 1);
    }

    #[test]
    fn content_hash_tracks_content_not_identity() {
        let quote = sample_quote();
        let first = QuoteVersion::capture(&quote, 1, "a").expect("capture");
        let second = QuoteVersion::capture(&quote, 2, "b").expect("capture");

        assert_ne!(first.id, second.id);
        assert_eq!(first.content_hash, second.content_hash);
        assert!(first.matches(&quote).expect("hash"));

        let mut edited = quote.clone();
        edited.discount_amount = Decimal::new(10_000, 0);
        assert!(!first.matches(&edited).expect("hash"));
    }
}
