use sqlx::Row;

use renoquote_core::cpq::catalog::Catalog;
use renoquote_core::domain::catalog::{CompositeCost, LaborCost, MaterialPrice, ProductGrade};

use super::{parse_decimal, RepositoryError};
use crate::DbPool;

/// Reads the price tables into an immutable [`Catalog`].
pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn load(&self) -> Result<Catalog, RepositoryError> {
        let labor = sqlx::query("SELECT labor_type, daily_rate FROM labor_cost ORDER BY labor_type")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| {
                Ok(LaborCost {
                    labor_type: row.try_get("labor_type")?,
                    daily_rate: parse_decimal(
                        "daily_rate",
                        &row.try_get::<String, _>("daily_rate")?,
                    )?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        let materials = sqlx::query(
            "SELECT product_name, category, sub_category, unit, unit_price, product_grade
             FROM material_price
             ORDER BY category, product_name",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            let grade_raw = row.try_get::<String, _>("product_grade")?;
            let product_grade = ProductGrade::parse(&grade_raw)
                .map_err(|_| RepositoryError::Decode(format!("unknown grade `{grade_raw}`")))?;
            Ok(MaterialPrice {
                category: row.try_get("category")?,
                sub_category: row.try_get("sub_category")?,
                product_name: row.try_get("product_name")?,
                unit: row.try_get("unit")?,
                unit_price: parse_decimal("unit_price", &row.try_get::<String, _>("unit_price")?)?,
                product_grade,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        let composites = sqlx::query(
            "SELECT cost_name, category, unit, unit_price, labor_ratio
             FROM composite_cost
             ORDER BY category, cost_name",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(|row| {
            Ok(CompositeCost {
                cost_name: row.try_get("cost_name")?,
                category: row.try_get("category")?,
                unit: row.try_get("unit")?,
                unit_price: parse_decimal("unit_price", &row.try_get::<String, _>("unit_price")?)?,
                labor_ratio: parse_decimal(
                    "labor_ratio",
                    &row.try_get::<String, _>("labor_ratio")?,
                )?,
            })
        })
        .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(Catalog::new(labor, materials, composites))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use renoquote_core::cpq::catalog::PricingCatalog;
    use renoquote_core::cpq::grade::GradeFamilyTable;
    use renoquote_core::domain::catalog::{MaterialFamily, ProductGrade};

    use super::SqlCatalogRepository;
    use crate::{connect_with_settings, fixtures::CatalogSeed, migrations};

    #[tokio::test]
    async fn seeded_catalog_covers_every_family_mapping_but_one() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        CatalogSeed::load(&pool).await.expect("seed");

        let catalog = SqlCatalogRepository::new(pool).load().await.expect("load");
        let table = GradeFamilyTable::standard();

        let mut misses = Vec::new();
        for family in MaterialFamily::ALL {
            for grade in ProductGrade::ALL {
                if table.resolve(&catalog, family, grade).is_none() {
                    misses.push((family, grade));
                }
            }
        }
        assert_eq!(misses, vec![(MaterialFamily::BathroomPackage, ProductGrade::Mid)]);

        let demolition = catalog.lookup_composite("기존 마감재 철거").expect("demolition");
        assert_eq!(demolition.labor_ratio, Decimal::new(70, 2));
        assert_eq!(
            catalog.lookup_labor("도배공").map(|labor| labor.daily_rate),
            Some(Decimal::from(250_000))
        );
    }
}
