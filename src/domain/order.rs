use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_PROCESSED: &str = "PROCESSED";
pub const STATUS_CANCELLED: &str = "CANCELLED";

/// A line item as requested by the caller: no price, no owning order yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedLineItem {
    pub product_id: i64,
    pub quantity: i32,
}

/// A validated line item carrying the snapshotted product price, waiting for
/// its order id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLineItem {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

impl NewLineItem {
    pub fn subtotal(&self) -> BigDecimal {
        &self.unit_price * BigDecimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub customer: String,
    pub created_at: DateTime<Utc>,
    pub total: BigDecimal,
    pub status: String,
}

impl NewOrder {
    /// Builds a `PENDING` order whose total is the sum of the item subtotals.
    pub fn pending(customer: String, items: &[NewLineItem], created_at: DateTime<Utc>) -> Self {
        Self {
            customer,
            created_at,
            total: items.iter().map(NewLineItem::subtotal).sum(),
            status: STATUS_PENDING.to_string(),
        }
    }
}

/// An order row as stored. It deliberately has no line items: the only way to
/// get an [`Order`] is to attach line items fetched from the line-item store.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub id: i64,
    pub customer: String,
    pub created_at: DateTime<Utc>,
    pub total: BigDecimal,
    pub status: String,
}

impl OrderRecord {
    pub fn with_line_items(self, line_items: Vec<LineItem>) -> Order {
        Order {
            id: self.id,
            customer: self.customer,
            created_at: self.created_at,
            total: self.total,
            status: self.status,
            line_items,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: BigDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub customer: String,
    pub created_at: DateTime<Utc>,
    pub total: BigDecimal,
    pub status: String,
    pub line_items: Vec<LineItem>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn item(price: &str, quantity: i32) -> NewLineItem {
        NewLineItem {
            product_id: 1,
            quantity,
            unit_price: BigDecimal::from_str(price).expect("valid decimal"),
        }
    }

    #[test]
    fn pending_order_total_is_sum_of_subtotals() {
        let items = vec![item("100.0", 2), item("50.0", 1)];
        let order = NewOrder::pending("alice".to_string(), &items, Utc::now());

        assert_eq!(order.total, BigDecimal::from_str("250.0").expect("valid decimal"));
        assert_eq!(order.status, STATUS_PENDING);
    }

    #[test]
    fn subtotal_keeps_decimal_precision() {
        // 0.1 * 3 must be exactly 0.3, unlike binary floating point.
        assert_eq!(
            item("0.1", 3).subtotal(),
            BigDecimal::from_str("0.3").expect("valid decimal")
        );
    }

    #[test]
    fn with_line_items_keeps_record_fields() {
        let record = OrderRecord {
            id: 9,
            customer: "bob".to_string(),
            created_at: Utc::now(),
            total: BigDecimal::from(10),
            status: STATUS_PROCESSED.to_string(),
        };
        let line = LineItem {
            id: 1,
            order_id: 9,
            product_id: 3,
            quantity: 1,
            unit_price: BigDecimal::from(10),
        };

        let order = record.clone().with_line_items(vec![line.clone()]);

        assert_eq!(order.id, record.id);
        assert_eq!(order.status, record.status);
        assert_eq!(order.line_items, vec![line]);
    }
}
