//! SeaORM-backed usage store.
//!
//! Reads the `plan_usages` table directly from Postgres.
//!
//! ```rust,ignore
//! use dashboard_billing::usage::SeaOrmUsageStore;
//!
//! let store = SeaOrmUsageStore::connect(&config.usage.database).await?;
//! let reader = UsageReader::new(Arc::new(store));
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use std::time::Duration;

use super::{UsageRecord, UsageStore};
use crate::config::DatabaseConfig;
use crate::error::{DashboardError, Result};

pub(crate) mod plan_usage {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "plan_usages")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub user_id: String,
        pub period_start: DateTimeWithTimeZone,
        pub usage: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

fn model_to_record(model: plan_usage::Model) -> UsageRecord {
    UsageRecord {
        id: model.id,
        user_id: model.user_id,
        period_start: model.period_start.with_timezone(&Utc),
        usage: model.usage,
    }
}

/// SeaORM usage store.
#[derive(Clone)]
pub struct SeaOrmUsageStore {
    db: DatabaseConnection,
}

impl SeaOrmUsageStore {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open a connection pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let mut opt = ConnectOptions::new(config.url.clone());
        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .sqlx_logging(false);

        let db = Database::connect(opt).await.map_err(|e| {
            DashboardError::internal(format!("Failed to connect to database: {}", e))
        })?;

        tracing::info!(
            target: "dashboard_billing::usage",
            max_connections = config.max_connections,
            "Usage database connected"
        );

        Ok(Self::new(db))
    }
}

#[async_trait]
impl UsageStore for SeaOrmUsageStore {
    async fn list_usage(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<UsageRecord>> {
        let mut query = plan_usage::Entity::find()
            .filter(plan_usage::Column::UserId.eq(user_id));
        if let Some(since) = since {
            query = query.filter(plan_usage::Column::PeriodStart.gte(since));
        }

        let models = query
            .order_by_asc(plan_usage::Column::PeriodStart)
            .order_by_asc(plan_usage::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(model_to_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_model_to_record_normalizes_offset() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let model = plan_usage::Model {
            id: 42,
            user_id: "user_1".to_string(),
            period_start: offset.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap(),
            usage: 17,
        };

        let record = model_to_record(model);

        assert_eq!(record.id, 42);
        assert_eq!(record.user_id, "user_1");
        assert_eq!(record.usage, 17);
        assert_eq!(
            record.period_start,
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
    }
}
