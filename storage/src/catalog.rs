//! Read-only access to the order catalog
//!
//! The catalog answers two questions per tick: which rule combinations are
//! active for a timeframe, and which orders subscribe to a given rule.

use crate::config::{CatalogConfig, DatabaseConfig};
use crate::error::{Result, StorageError};
use crate::postgres::ConnectionPool;
use crate::types::{ActiveRule, CatalogOrder, OrderRef, RuleType};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_postgres::types::FromSql;
use tokio_postgres::Row;
use tracing::{debug, info, warn};

/// Source of active rules and subscribed orders
#[async_trait]
pub trait OrderCatalog: Send + Sync {
    /// Active rules for one timeframe; may contain duplicates
    async fn list_active_rules(&self, timeframe: &str) -> Result<Vec<ActiveRule>>;

    /// Orders subscribed to a rule
    ///
    /// `ema_period` narrows the match when given; CDC rules pass `None`.
    async fn list_orders_for(
        &self,
        symbol: &str,
        rule_type: RuleType,
        ema_period: Option<u32>,
    ) -> Result<Vec<OrderRef>>;
}

/// Build the catalog described by configuration
pub async fn connect(config: &CatalogConfig) -> Result<Arc<dyn OrderCatalog>> {
    match config {
        CatalogConfig::Postgres(db) => Ok(Arc::new(PgOrderCatalog::connect(db).await?)),
        CatalogConfig::Static { orders } => {
            info!("Using static order catalog with {} orders", orders.len());
            Ok(Arc::new(StaticCatalog::new(orders.clone())))
        }
    }
}

/// Catalog backed by a fixed list of orders
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    orders: Vec<CatalogOrder>,
}

impl StaticCatalog {
    pub fn new(orders: Vec<CatalogOrder>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl OrderCatalog for StaticCatalog {
    async fn list_active_rules(&self, timeframe: &str) -> Result<Vec<ActiveRule>> {
        Ok(self
            .orders
            .iter()
            .filter(|o| o.timeframe == timeframe)
            .map(CatalogOrder::active_rule)
            .collect())
    }

    async fn list_orders_for(
        &self,
        symbol: &str,
        rule_type: RuleType,
        ema_period: Option<u32>,
    ) -> Result<Vec<OrderRef>> {
        Ok(self
            .orders
            .iter()
            .filter(|o| o.symbol == symbol && o.rule_type == rule_type)
            .filter(|o| ema_period.is_none() || o.ema_period == ema_period)
            .map(CatalogOrder::order_ref)
            .collect())
    }
}

/// Catalog reading the `orders` table; soft-deleted rows are ignored
pub struct PgOrderCatalog {
    pool: Arc<ConnectionPool>,
    query_timeout: Duration,
}

impl PgOrderCatalog {
    /// Connect to the catalog database
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("Initializing PgOrderCatalog");

        let pool = ConnectionPool::new(config).await?;

        let client = pool.get().await?;
        let has_orders: bool = client
            .query_one("SELECT to_regclass('orders') IS NOT NULL", &[])
            .await?
            .get(0);
        if !has_orders {
            return Err(StorageError::SchemaError(format!(
                "orders table not found in database {}",
                config.database
            )));
        }

        Ok(Self {
            pool: Arc::new(pool),
            query_timeout: config.query_timeout(),
        })
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| {
                StorageError::QueryError(format!(
                    "{} timed out after {:?}",
                    what, self.query_timeout
                ))
            })?
    }
}

#[async_trait]
impl OrderCatalog for PgOrderCatalog {
    async fn list_active_rules(&self, timeframe: &str) -> Result<Vec<ActiveRule>> {
        debug!("Listing active rules for {}", timeframe);

        self.bounded("list_active_rules", async {
            let client = self.pool.get().await?;
            let rows = client
                .query(
                    r#"
                    SELECT DISTINCT symbol, ema, timeframe, type
                    FROM orders
                    WHERE deleted_at IS NULL AND timeframe = $1
                    "#,
                    &[&timeframe],
                )
                .await?;

            let mut rules = Vec::with_capacity(rows.len());
            for row in &rows {
                match active_rule_from_row(row) {
                    Ok(rule) => rules.push(rule),
                    Err(e) => warn!("Skipping catalog rule row: {}", e),
                }
            }
            Ok(rules)
        })
        .await
    }

    async fn list_orders_for(
        &self,
        symbol: &str,
        rule_type: RuleType,
        ema_period: Option<u32>,
    ) -> Result<Vec<OrderRef>> {
        debug!("Listing orders for {} {} {:?}", symbol, rule_type, ema_period);

        self.bounded("list_orders_for", async {
            let client = self.pool.get().await?;
            let type_str = rule_type.as_str();

            let base = r#"
                SELECT id, symbol, quantity, leverage, ema, user_id
                FROM orders
                WHERE deleted_at IS NULL AND symbol = $1 AND type = $2
            "#;

            let rows = match ema_period {
                Some(period) => {
                    let period = i64::from(period);
                    let query = format!("{} AND ema = $3", base);
                    client.query(&query, &[&symbol, &type_str, &period]).await?
                }
                None => client.query(base, &[&symbol, &type_str]).await?,
            };

            let mut orders = Vec::with_capacity(rows.len());
            for row in &rows {
                match order_ref_from_row(row) {
                    Ok(order) => orders.push(order),
                    Err(e) => warn!("Skipping order row for {}: {}", symbol, e),
                }
            }
            Ok(orders)
        })
        .await
    }
}

// Columns are nullable in the catalog schema; a bad row is an error, never a panic
fn column<'a, T>(row: &'a Row, idx: usize, name: &str) -> Result<T>
where
    T: FromSql<'a>,
{
    row.try_get(idx)
        .map_err(|e| StorageError::QueryError(format!("column {}: {}", name, e)))
}

fn ema_column(row: &Row, idx: usize) -> Result<Option<u32>> {
    let ema: Option<i64> = column(row, idx, "ema")?;
    Ok(ema.and_then(|e| u32::try_from(e).ok()))
}

fn active_rule_from_row(row: &Row) -> Result<ActiveRule> {
    let symbol: String = column(row, 0, "symbol")?;
    let rule_type: String = column(row, 3, "type")?;

    Ok(ActiveRule {
        ema_period: ema_column(row, 1)?,
        timeframe: column(row, 2, "timeframe")?,
        rule_type: rule_type
            .parse()
            .map_err(|e| StorageError::QueryError(format!("{}: {}", symbol, e)))?,
        symbol,
    })
}

fn order_ref_from_row(row: &Row) -> Result<OrderRef> {
    Ok(OrderRef {
        order_id: column(row, 0, "id")?,
        symbol: column(row, 1, "symbol")?,
        quantity: column(row, 2, "quantity")?,
        leverage: column(row, 3, "leverage")?,
        ema_period: ema_column(row, 4)?,
        user_id: column(row, 5, "user_id")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, symbol: &str, timeframe: &str, rule_type: RuleType, ema: Option<u32>) -> CatalogOrder {
        CatalogOrder {
            order_id: id.to_string(),
            symbol: symbol.to_string(),
            quantity: 1,
            leverage: 5,
            timeframe: timeframe.to_string(),
            rule_type,
            ema_period: ema,
            user_id: format!("user-{}", id),
        }
    }

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(vec![
            order("1", "BTCUSDT", "5m", RuleType::Ema, Some(15)),
            order("2", "BTCUSDT", "5m", RuleType::Ema, Some(15)),
            order("3", "BTCUSDT", "5m", RuleType::Ema, Some(50)),
            order("4", "BTCUSDT", "4h", RuleType::Cdc, None),
            order("5", "ETHUSDT", "5m", RuleType::Ema, Some(15)),
        ])
    }

    #[tokio::test]
    async fn test_static_rules_by_timeframe() {
        let rules = catalog().list_active_rules("5m").await.unwrap();
        assert_eq!(rules.len(), 4);
        assert!(rules.iter().all(|r| r.timeframe == "5m"));

        let rules = catalog().list_active_rules("1d").await.unwrap();
        assert!(rules.is_empty());
    }

    #[tokio::test]
    async fn test_static_orders_filter_on_ema() {
        let orders = catalog()
            .list_orders_for("BTCUSDT", RuleType::Ema, Some(15))
            .await
            .unwrap();
        let ids: Vec<_> = orders.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let orders = catalog()
            .list_orders_for("BTCUSDT", RuleType::Cdc, None)
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].leverage, 5);
    }

    #[tokio::test]
    async fn test_connect_static() {
        let config = CatalogConfig::Static {
            orders: vec![order("1", "SOLUSDT", "1h", RuleType::Ema, Some(20))],
        };
        let catalog = connect(&config).await.unwrap();
        assert_eq!(catalog.list_active_rules("1h").await.unwrap().len(), 1);
    }
}
