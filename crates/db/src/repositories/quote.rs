use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use renoquote_core::domain::catalog::{MaterialFamily, ProductGrade};
use renoquote_core::domain::quote::{
    CostType, CustomerInfo, PropertyInfo, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteScalars,
    QuoteStatus,
};
use renoquote_core::domain::version::{QuoteVersion, QuoteVersionId};
use renoquote_core::store::{
    CommitOutcome, ItemPatch, QuoteFilter, QuoteMutation, QuoteStore, StoreError,
};

use super::{
    parse_decimal, parse_optional_decimal, parse_timestamp, parse_u32, RepositoryError,
};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, quote_number, estimate_id, floorplan_id, customer_name,
    customer_phone, customer_email, property_address, property_type, property_size, grade,
    labor_cost, material_cost, other_cost, discount_amount, discount_reason, vat_amount,
    total_amount, final_amount, status, notes, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, category, sub_category, item_name, quantity, unit, unit_price,
    total_price, cost_type, labor_ratio, family, sort_order, is_optional, is_included, notes";

pub struct SqlQuoteStore {
    pool: DbPool,
}

impl SqlQuoteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn commit_in_transaction(
        &self,
        mutation: QuoteMutation,
    ) -> Result<CommitOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = load_quote(&mut tx, &mutation.quote_id).await?.ok_or_else(|| {
            RepositoryError::Conflict(format!("quote `{}` does not exist", mutation.quote_id))
        })?;
        let patch = match &mutation.items {
            Some(desired) => ItemPatch::between(&current.items, desired)
                .map_err(|error| RepositoryError::Conflict(error.to_string()))?,
            None => ItemPatch::default(),
        };

        let backup = match mutation.backup_reason.as_deref() {
            Some(reason) => {
                let number = next_version_number(&mut tx, &current.id).await?;
                let version = QuoteVersion::capture(&current, number, reason)
                    .map_err(|error| RepositoryError::Encode(error.to_string()))?;
                insert_version(&mut tx, &version).await?;
                Some(version)
            }
            None => None,
        };

        let mut updated = current;
        if let Some(scalars) = mutation.scalars {
            updated.apply_scalars(scalars);
        }
        updated.updated_at = mutation.updated_at;
        update_quote_row(&mut tx, &updated).await?;

        for item_id in &patch.deletes {
            sqlx::query("DELETE FROM quote_item WHERE id = ? AND quote_id = ?")
                .bind(&item_id.0)
                .bind(&updated.id.0)
                .execute(&mut *tx)
                .await?;
        }
        for item in &patch.upserts {
            upsert_item(&mut tx, &updated.id, item).await?;
        }
        patch.apply(&mut updated.items);

        tx.commit().await?;
        Ok(CommitOutcome { quote: updated, backup, patch })
    }
}

#[async_trait]
impl QuoteStore for SqlQuoteStore {
    async fn get_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        Ok(load_quote(&mut conn, id).await?)
    }

    async fn find_by_number(&self, quote_number: &str) -> Result<Option<Quote>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let id = sqlx::query_scalar::<_, String>("SELECT id FROM quote WHERE quote_number = ?")
            .bind(quote_number)
            .fetch_optional(&mut *conn)
            .await
            .map_err(RepositoryError::from)?;

        match id {
            Some(id) => Ok(load_quote(&mut conn, &QuoteId(id)).await?),
            None => Ok(None),
        }
    }

    async fn list_by_filter(&self, filter: &QuoteFilter) -> Result<Vec<Quote>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let status = filter.status.map(|status| status.as_str());
        let limit = filter.limit.map_or(-1, i64::from);
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT id FROM quote
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR estimate_id = ?2)
             ORDER BY created_at DESC, quote_number ASC
             LIMIT ?3",
        )
        .bind(status)
        .bind(filter.estimate_id.as_deref())
        .bind(limit)
        .fetch_all(&mut *conn)
        .await
        .map_err(RepositoryError::from)?;

        let mut quotes = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(quote) = load_quote(&mut conn, &QuoteId(id)).await? {
                quotes.push(quote);
            }
        }
        Ok(quotes)
    }

    async fn insert(&self, quote: &Quote) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        insert_quote_row(&mut tx, quote).await?;
        for item in &quote.items {
            insert_item(&mut tx, &quote.id, item).await?;
        }
        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn commit(&self, mutation: QuoteMutation) -> Result<CommitOutcome, StoreError> {
        Ok(self.commit_in_transaction(mutation).await?)
    }

    async fn delete_cascade(&self, id: &QuoteId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        sqlx::query("DELETE FROM quote_item WHERE quote_id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        let deleted = sqlx::query("DELETE FROM quote WHERE id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn append_version(
        &self,
        quote: &Quote,
        reason: &str,
    ) -> Result<QuoteVersion, StoreError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let number = next_version_number(&mut tx, &quote.id).await?;
        let version = QuoteVersion::capture(quote, number, reason)
            .map_err(|error| RepositoryError::Encode(error.to_string()))?;
        insert_version(&mut tx, &version).await?;
        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(version)
    }

    async fn get_version(&self, id: &QuoteVersionId) -> Result<Option<QuoteVersion>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let row = sqlx::query(
            "SELECT id, quote_id, version_number, saved_reason, scalars_json, content_hash,
                    created_at
             FROM quote_version
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(RepositoryError::from)?;

        match row {
            Some(row) => Ok(Some(version_from_row(&mut conn, &row).await?)),
            None => Ok(None),
        }
    }

    async fn list_versions(&self, quote_id: &QuoteId) -> Result<Vec<QuoteVersion>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let rows = sqlx::query(
            "SELECT id, quote_id, version_number, saved_reason, scalars_json, content_hash,
                    created_at
             FROM quote_version
             WHERE quote_id = ?
             ORDER BY version_number ASC",
        )
        .bind(&quote_id.0)
        .fetch_all(&mut *conn)
        .await
        .map_err(RepositoryError::from)?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in &rows {
            versions.push(version_from_row(&mut conn, row).await?);
        }
        Ok(versions)
    }
}

async fn load_quote(
    conn: &mut SqliteConnection,
    id: &QuoteId,
) -> Result<Option<Quote>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quote WHERE id = ?"))
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let items = sqlx::query(&format!(
        "SELECT {ITEM_COLUMNS} FROM quote_item WHERE quote_id = ? ORDER BY sort_order ASC, id ASC"
    ))
    .bind(&id.0)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(item_from_row)
    .collect::<Result<Vec<_>, _>>()?;

    quote_from_row(&row, items).map(Some)
}

fn quote_from_row(row: &SqliteRow, items: Vec<QuoteItem>) -> Result<Quote, RepositoryError> {
    let grade_raw = row.try_get::<String, _>("grade")?;
    let grade = ProductGrade::parse(&grade_raw)
        .map_err(|_| RepositoryError::Decode(format!("unknown grade `{grade_raw}`")))?;
    let status_raw = row.try_get::<String, _>("status")?;
    let status = QuoteStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quote status `{status_raw}`")))?;

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        quote_number: row.try_get("quote_number")?,
        estimate_id: row.try_get("estimate_id")?,
        floorplan_id: row.try_get("floorplan_id")?,
        customer: CustomerInfo {
            name: row.try_get("customer_name")?,
            phone: row.try_get("customer_phone")?,
            email: row.try_get("customer_email")?,
        },
        property: PropertyInfo {
            address: row.try_get("property_address")?,
            property_type: row.try_get("property_type")?,
            size: parse_optional_decimal("property_size", row.try_get("property_size")?)?,
        },
        grade,
        items,
        labor_cost: decimal_column(row, "labor_cost")?,
        material_cost: decimal_column(row, "material_cost")?,
        other_cost: decimal_column(row, "other_cost")?,
        discount_amount: decimal_column(row, "discount_amount")?,
        discount_reason: row.try_get("discount_reason")?,
        vat_amount: decimal_column(row, "vat_amount")?,
        total_amount: decimal_column(row, "total_amount")?,
        final_amount: decimal_column(row, "final_amount")?,
        status,
        notes: row.try_get("notes")?,
        created_at: parse_timestamp("created_at", &row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp("updated_at", &row.try_get::<String, _>("updated_at")?)?,
    })
}

fn item_from_row(row: &SqliteRow) -> Result<QuoteItem, RepositoryError> {
    let cost_type_raw = row.try_get::<String, _>("cost_type")?;
    let cost_type = CostType::parse(&cost_type_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown cost type `{cost_type_raw}`")))?;
    let family = row
        .try_get::<Option<String>, _>("family")?
        .map(|value| {
            MaterialFamily::parse(&value)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown family `{value}`")))
        })
        .transpose()?;

    Ok(QuoteItem {
        id: QuoteItemId(row.try_get("id")?),
        category: row.try_get("category")?,
        sub_category: row.try_get("sub_category")?,
        item_name: row.try_get("item_name")?,
        quantity: decimal_column(row, "quantity")?,
        unit: row.try_get("unit")?,
        unit_price: decimal_column(row, "unit_price")?,
        total_price: decimal_column(row, "total_price")?,
        cost_type,
        labor_ratio: parse_optional_decimal("labor_ratio", row.try_get("labor_ratio")?)?,
        family,
        sort_order: row.try_get("sort_order")?,
        is_optional: row.try_get("is_optional")?,
        is_included: row.try_get("is_included")?,
        notes: row.try_get("notes")?,
    })
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<rust_decimal::Decimal, RepositoryError> {
    parse_decimal(column, &row.try_get::<String, _>(column)?)
}

async fn insert_quote_row(
    conn: &mut SqliteConnection,
    quote: &Quote,
) -> Result<(), RepositoryError> {
    sqlx::query(&format!(
        "INSERT INTO quote ({QUOTE_COLUMNS})
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&quote.id.0)
    .bind(&quote.quote_number)
    .bind(&quote.estimate_id)
    .bind(&quote.floorplan_id)
    .bind(&quote.customer.name)
    .bind(&quote.customer.phone)
    .bind(&quote.customer.email)
    .bind(&quote.property.address)
    .bind(&quote.property.property_type)
    .bind(quote.property.size.map(|size| size.to_string()))
    .bind(quote.grade.as_str())
    .bind(quote.labor_cost.to_string())
    .bind(quote.material_cost.to_string())
    .bind(quote.other_cost.to_string())
    .bind(quote.discount_amount.to_string())
    .bind(&quote.discount_reason)
    .bind(quote.vat_amount.to_string())
    .bind(quote.total_amount.to_string())
    .bind(quote.final_amount.to_string())
    .bind(quote.status.as_str())
    .bind(&quote.notes)
    .bind(quote.created_at.to_rfc3339())
    .bind(quote.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn update_quote_row(
    conn: &mut SqliteConnection,
    quote: &Quote,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "UPDATE quote SET
            estimate_id = ?, floorplan_id = ?, customer_name = ?, customer_phone = ?,
            customer_email = ?, property_address = ?, property_type = ?, property_size = ?,
            grade = ?, labor_cost = ?, material_cost = ?, other_cost = ?, discount_amount = ?,
            discount_reason = ?, vat_amount = ?, total_amount = ?, final_amount = ?, status = ?,
            notes = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&quote.estimate_id)
    .bind(&quote.floorplan_id)
    .bind(&quote.customer.name)
    .bind(&quote.customer.phone)
    .bind(&quote.customer.email)
    .bind(&quote.property.address)
    .bind(&quote.property.property_type)
    .bind(quote.property.size.map(|size| size.to_string()))
    .bind(quote.grade.as_str())
    .bind(quote.labor_cost.to_string())
    .bind(quote.material_cost.to_string())
    .bind(quote.other_cost.to_string())
    .bind(quote.discount_amount.to_string())
    .bind(&quote.discount_reason)
    .bind(quote.vat_amount.to_string())
    .bind(quote.total_amount.to_string())
    .bind(quote.final_amount.to_string())
    .bind(quote.status.as_str())
    .bind(&quote.notes)
    .bind(quote.updated_at.to_rfc3339())
    .bind(&quote.id.0)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_item(
    conn: &mut SqliteConnection,
    quote_id: &QuoteId,
    item: &QuoteItem,
) -> Result<(), RepositoryError> {
    sqlx::query(&format!(
        "INSERT INTO quote_item (quote_id, {ITEM_COLUMNS})
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&quote_id.0)
    .bind(&item.id.0)
    .bind(&item.category)
    .bind(&item.sub_category)
    .bind(&item.item_name)
    .bind(item.quantity.to_string())
    .bind(&item.unit)
    .bind(item.unit_price.to_string())
    .bind(item.total_price.to_string())
    .bind(item.cost_type.as_str())
    .bind(item.labor_ratio.map(|ratio| ratio.to_string()))
    .bind(item.family.map(|family| family.as_str()))
    .bind(item.sort_order)
    .bind(item.is_optional)
    .bind(item.is_included)
    .bind(&item.notes)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Updates the item in place when this quote owns it, otherwise inserts it.
/// An id owned by another quote fails on the primary key.
async fn upsert_item(
    conn: &mut SqliteConnection,
    quote_id: &QuoteId,
    item: &QuoteItem,
) -> Result<(), RepositoryError> {
    let updated = sqlx::query(
        "UPDATE quote_item SET
            category = ?, sub_category = ?, item_name = ?, quantity = ?, unit = ?,
            unit_price = ?, total_price = ?, cost_type = ?, labor_ratio = ?, family = ?,
            sort_order = ?, is_optional = ?, is_included = ?, notes = ?
         WHERE id = ? AND quote_id = ?",
    )
    .bind(&item.category)
    .bind(&item.sub_category)
    .bind(&item.item_name)
    .bind(item.quantity.to_string())
    .bind(&item.unit)
    .bind(item.unit_price.to_string())
    .bind(item.total_price.to_string())
    .bind(item.cost_type.as_str())
    .bind(item.labor_ratio.map(|ratio| ratio.to_string()))
    .bind(item.family.map(|family| family.as_str()))
    .bind(item.sort_order)
    .bind(item.is_optional)
    .bind(item.is_included)
    .bind(&item.notes)
    .bind(&item.id.0)
    .bind(&quote_id.0)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        insert_item(conn, quote_id, item).await?;
    }
    Ok(())
}

async fn next_version_number(
    conn: &mut SqliteConnection,
    quote_id: &QuoteId,
) -> Result<u32, RepositoryError> {
    let latest: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version_number) FROM quote_version WHERE quote_id = ?")
            .bind(&quote_id.0)
            .fetch_one(&mut *conn)
            .await?;
    Ok(parse_u32("version_number", latest.unwrap_or(0))? + 1)
}

async fn insert_version(
    conn: &mut SqliteConnection,
    version: &QuoteVersion,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO quote_version
            (id, quote_id, version_number, saved_reason, scalars_json, content_hash, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&version.id.0)
    .bind(&version.quote_id.0)
    .bind(i64::from(version.version_number))
    .bind(&version.saved_reason)
    .bind(serde_json::to_string(&version.scalars)?)
    .bind(&version.content_hash)
    .bind(version.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    for (position, item) in version.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO quote_version_item (version_id, position, item_id, item_json)
             VALUES (?, ?, ?, ?)",
        )
        .bind(&version.id.0)
        .bind(i64::try_from(position).unwrap_or(i64::MAX))
        .bind(&item.id.0)
        .bind(serde_json::to_string(item)?)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn version_from_row(
    conn: &mut SqliteConnection,
    row: &SqliteRow,
) -> Result<QuoteVersion, RepositoryError> {
    let id = QuoteVersionId(row.try_get("id")?);
    let item_rows = sqlx::query_scalar::<_, String>(
        "SELECT item_json FROM quote_version_item WHERE version_id = ? ORDER BY position ASC",
    )
    .bind(&id.0)
    .fetch_all(&mut *conn)
    .await?;
    let items = item_rows
        .iter()
        .map(|json| serde_json::from_str::<QuoteItem>(json))
        .collect::<Result<Vec<_>, _>>()?;
    let scalars =
        serde_json::from_str::<QuoteScalars>(&row.try_get::<String, _>("scalars_json")?)?;

    Ok(QuoteVersion {
        id,
        quote_id: QuoteId(row.try_get("quote_id")?),
        version_number: parse_u32("version_number", row.try_get("version_number")?)?,
        saved_reason: row.try_get("saved_reason")?,
        scalars,
        items,
        content_hash: row.try_get("content_hash")?,
        created_at: parse_timestamp("created_at", &row.try_get::<String, _>("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use renoquote_core::domain::catalog::MaterialFamily;
    use renoquote_core::domain::quote::{CostType, CustomerInfo, Quote, QuoteItem, QuoteStatus};
    use renoquote_core::store::{QuoteFilter, QuoteMutation, QuoteStore, StoreError};

    use super::SqlQuoteStore;
    use crate::{connect_with_settings, migrations};

    async fn store() -> SqlQuoteStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        SqlQuoteStore::new(pool)
    }

    fn quote(number: &str) -> Quote {
        let mut quote =
            Quote::draft(number, CustomerInfo { name: "한서연".into(), ..Default::default() });
        quote.property.size = Some(Decimal::new(845, 1));
        let mut wallpaper = QuoteItem::new(
            "도배",
            "실크 벽지",
            Decimal::from(155),
            "㎡",
            Decimal::from(14_000),
            CostType::Material,
        );
        wallpaper.family = Some(MaterialFamily::Wallpaper);
        wallpaper.sort_order = 1;
        let mut demolition = QuoteItem::new(
            "철거",
            "기존 마감재 철거",
            Decimal::from(42),
            "㎡",
            Decimal::from(25_000),
            CostType::Composite,
        );
        demolition.labor_ratio = Some(Decimal::new(70, 2));
        demolition.sort_order = 2;
        quote.items = vec![wallpaper, demolition];
        quote.total_amount = Decimal::from(3_220_000);
        quote.final_amount = Decimal::from(3_220_000);
        quote
    }

    #[tokio::test]
    async fn quotes_round_trip_with_exact_decimals() {
        let store = store().await;
        let original = quote("Q-100");
        store.insert(&original).await.expect("insert");

        let loaded = store.get_by_id(&original.id).await.expect("get").expect("quote");
        assert_eq!(loaded.items, original.items);
        assert_eq!(loaded.property.size, Some(Decimal::new(845, 1)));
        assert_eq!(loaded.scalars(), original.scalars());

        let by_number = store.find_by_number("Q-100").await.expect("find").expect("quote");
        assert_eq!(by_number.id, original.id);
    }

    #[tokio::test]
    async fn duplicate_numbers_surface_as_conflicts() {
        let store = store().await;
        store.insert(&quote("Q-101")).await.expect("insert");

        let duplicate = store.insert(&quote("Q-101")).await;
        assert!(matches!(duplicate, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn commit_patches_items_and_records_a_backup() {
        let store = store().await;
        let original = quote("Q-102");
        store.insert(&original).await.expect("insert");

        let mut items = original.items.clone();
        items.remove(1);
        items[0].quantity = Decimal::from(160);
        items[0].reprice();
        let outcome = store
            .commit(QuoteMutation::new(original.id.clone()).with_backup("trim").with_items(items))
            .await
            .expect("commit");

        assert_eq!(outcome.patch.upserts.len(), 1);
        assert_eq!(outcome.patch.deletes, vec![original.items[1].id.clone()]);
        let backup = outcome.backup.expect("backup");
        assert_eq!(backup.items, original.items);

        let stored = store.get_by_id(&original.id).await.expect("get").expect("quote");
        assert_eq!(stored.items, outcome.quote.items);
        let stored_version =
            store.get_version(&backup.id).await.expect("get version").expect("version");
        assert_eq!(stored_version, backup);
    }

    #[tokio::test]
    async fn failed_commits_leave_no_backup_behind() {
        let store = store().await;
        let owner = quote("Q-103");
        let target = quote("Q-104");
        store.insert(&owner).await.expect("insert owner");
        store.insert(&target).await.expect("insert target");

        let mut items = target.items.clone();
        items.push(owner.items[0].clone());
        let result = store
            .commit(QuoteMutation::new(target.id.clone()).with_backup("steal").with_items(items))
            .await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert!(store.list_versions(&target.id).await.expect("versions").is_empty());
        let stored = store.get_by_id(&target.id).await.expect("get").expect("quote");
        assert_eq!(stored.items, target.items);
    }

    #[tokio::test]
    async fn delete_cascade_keeps_version_history() {
        let store = store().await;
        let original = quote("Q-105");
        store.insert(&original).await.expect("insert");
        store.append_version(&original, "manual").await.expect("snapshot");

        assert!(store.delete_cascade(&original.id).await.expect("delete"));
        assert!(!store.delete_cascade(&original.id).await.expect("second delete"));
        assert!(store.get_by_id(&original.id).await.expect("get").is_none());
        assert_eq!(store.list_versions(&original.id).await.expect("versions").len(), 1);
    }

    #[tokio::test]
    async fn list_filters_by_status_and_limit() {
        let store = store().await;
        let draft = quote("Q-106");
        let mut sent = quote("Q-107");
        sent.status = QuoteStatus::Sent;
        store.insert(&draft).await.expect("insert draft");
        store.insert(&sent).await.expect("insert sent");

        let sent_only = store
            .list_by_filter(&QuoteFilter { status: Some(QuoteStatus::Sent), ..Default::default() })
            .await
            .expect("list");
        assert_eq!(sent_only.len(), 1);
        assert_eq!(sent_only[0].quote_number, "Q-107");

        let limited = store
            .list_by_filter(&QuoteFilter { limit: Some(1), ..Default::default() })
            .await
            .expect("list");
        assert_eq!(limited.len(), 1);
    }
}
