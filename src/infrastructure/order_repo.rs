use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;

use crate::db::DbPool;
use crate::domain::errors::DomainError;
use crate::domain::order::{LineItem, NewLineItem, NewOrder, OrderRecord};
use crate::domain::ports::{LineItemStore, OrderStore};
use crate::schema::{order_lines, orders};

use super::models::{LineItemRow, NewLineItemRow, NewOrderRow, OrderRow};

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => DomainError::NotFound,
            other => DomainError::Persistence(other.to_string()),
        }
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::Persistence(e.to_string())
    }
}

// ── Repository ────────────────────────────────────────────────────────────────

/// PostgreSQL-backed order and line-item store. Diesel is synchronous, so every
/// query runs on tokio's blocking pool.
#[derive(Clone)]
pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, query: F) -> Result<T, DomainError>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T, DomainError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            query(&mut conn)
        })
        .await
        .map_err(|e| DomainError::Persistence(e.to_string()))?
    }
}

#[async_trait]
impl OrderStore for DieselOrderRepository {
    async fn insert_aggregate(
        &self,
        order: NewOrder,
        items: Vec<NewLineItem>,
    ) -> Result<(OrderRecord, Vec<LineItem>), DomainError> {
        self.with_conn(move |conn| {
            conn.transaction::<_, DomainError, _>(|conn| {
                // 1. Insert the order to obtain its id
                let saved: OrderRow = diesel::insert_into(orders::table)
                    .values(&NewOrderRow {
                        customer: order.customer,
                        created_at: order.created_at,
                        total: order.total,
                        status: order.status,
                    })
                    .returning(OrderRow::as_returning())
                    .get_result(conn)?;

                // 2. Insert the line items under that id
                let new_lines: Vec<NewLineItemRow> = items
                    .into_iter()
                    .map(|item| NewLineItemRow {
                        order_id: saved.id,
                        product_id: item.product_id,
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                    })
                    .collect();
                let lines: Vec<LineItemRow> = diesel::insert_into(order_lines::table)
                    .values(&new_lines)
                    .returning(LineItemRow::as_returning())
                    .get_results(conn)?;

                Ok((
                    saved.into(),
                    lines.into_iter().map(LineItem::from).collect(),
                ))
            })
        })
        .await
    }

    async fn find_all(&self) -> Result<Vec<OrderRecord>, DomainError> {
        self.with_conn(|conn| {
            let rows = orders::table
                .select(OrderRow::as_select())
                .order(orders::id.asc())
                .load(conn)?;
            Ok(rows.into_iter().map(OrderRecord::from).collect())
        })
        .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<OrderRecord>, DomainError> {
        self.with_conn(move |conn| {
            let row = orders::table
                .filter(orders::id.eq(id))
                .select(OrderRow::as_select())
                .first(conn)
                .optional()?;
            Ok(row.map(OrderRecord::from))
        })
        .await
    }

    async fn update(&self, order: &OrderRecord) -> Result<OrderRecord, DomainError> {
        let row = OrderRow::from(order);
        self.with_conn(move |conn| {
            let saved = diesel::update(&row)
                .set(&row)
                .returning(OrderRow::as_returning())
                .get_result(conn)?;
            Ok(OrderRecord::from(saved))
        })
        .await
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, DomainError> {
        self.with_conn(move |conn| {
            let deleted = diesel::delete(orders::table.filter(orders::id.eq(id))).execute(conn)?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[async_trait]
impl LineItemStore for DieselOrderRepository {
    async fn find_by_order_id(&self, order_id: i64) -> Result<Vec<LineItem>, DomainError> {
        self.with_conn(move |conn| {
            let rows = order_lines::table
                .filter(order_lines::order_id.eq(order_id))
                .select(LineItemRow::as_select())
                .order(order_lines::id.asc())
                .load(conn)?;
            Ok(rows.into_iter().map(LineItem::from).collect())
        })
        .await
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        self.with_conn(move |conn| {
            diesel::delete(order_lines::table.filter(order_lines::id.eq(id))).execute(conn)?;
            Ok(())
        })
        .await
    }
}
