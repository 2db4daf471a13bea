use serde::Serialize;
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Default catalog every family/grade lookup resolves against.
///
/// The 중급 bathroom package is intentionally absent; upgrades report it as
/// a mapping miss.
pub struct CatalogSeed;

impl CatalogSeed {
    pub const SQL: &str = include_str!("../../../config/fixtures/catalog_seed.sql");

    pub const EXPECTED_LABOR: i64 = 7;
    pub const EXPECTED_MATERIALS: i64 = 18;
    pub const EXPECTED_COMPOSITES: i64 = 4;

    /// Loads the seed in one transaction. Re-running replaces the same rows.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Self::counts(pool).await
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let counts = Self::counts(pool).await?;
        let checks = vec![
            ("labor_cost", counts.labor >= Self::EXPECTED_LABOR),
            ("material_price", counts.materials >= Self::EXPECTED_MATERIALS),
            ("composite_cost", counts.composites >= Self::EXPECTED_COMPOSITES),
        ];
        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for table in ["labor_cost", "material_price", "composite_cost"] {
            tx.execute(sqlx::query(&format!("DELETE FROM {table}"))).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn counts(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let labor = sqlx::query_scalar("SELECT COUNT(1) FROM labor_cost").fetch_one(pool).await?;
        let materials =
            sqlx::query_scalar("SELECT COUNT(1) FROM material_price").fetch_one(pool).await?;
        let composites =
            sqlx::query_scalar("SELECT COUNT(1) FROM composite_cost").fetch_one(pool).await?;
        Ok(SeedResult { labor, materials, composites })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub labor: i64,
    pub materials: i64,
    pub composites: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
