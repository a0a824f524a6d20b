use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CartLine, LineId, Money, Order, OrderId, OrderLine, OrderStatus, ProductId, ProofImage,
    ShippingDetails, UserId,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{
        CartRepository, Catalog, OrderStore, Product, StockDebit, validate_order_for_commit,
    },
};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
        })
    }

    fn row_to_order_line(row: &PgRow) -> Result<OrderLine> {
        let quantity: i32 = row.try_get("quantity")?;
        Ok(OrderLine {
            line_id: LineId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: u32::try_from(quantity)
                .map_err(|_| StoreError::InvalidRow(format!("negative quantity {quantity}")))?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            selected_color: row.try_get("selected_color")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: &PgRow, items: Vec<OrderLine>) -> Result<Order> {
        let shipping: serde_json::Value = row.try_get("shipping")?;
        let shipping: ShippingDetails = serde_json::from_value(shipping)?;

        let status: String = row.try_get("status")?;
        let payment_method: String = row.try_get("payment_method")?;

        let proof_content_type: Option<String> = row.try_get("proof_content_type")?;
        let proof_bytes: Option<Vec<u8>> = row.try_get("proof_bytes")?;
        let proof = match (proof_content_type, proof_bytes) {
            (Some(content_type), Some(bytes)) => Some(ProofImage {
                content_type,
                bytes,
            }),
            _ => None,
        };

        Ok(Order {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            shipping,
            payment_method: payment_method.parse().map_err(StoreError::InvalidRow)?,
            proof,
            status: status.parse().map_err(StoreError::InvalidRow)?,
            items,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
        let color: String = row.try_get("selected_color")?;
        Ok(CartLine {
            line_id: LineId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            selected_color: (!color.is_empty()).then_some(color),
            product: None,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Loads the lines of several orders, grouped by order and kept in
    /// insertion order.
    async fn load_lines(&self, order_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLine>>> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, unit_price_cents,
                   selected_color, created_at, updated_at
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, position ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for row in &rows {
            let order_id: Uuid = row.try_get("order_id")?;
            grouped
                .entry(order_id)
                .or_default()
                .push(Self::row_to_order_line(row)?);
        }
        Ok(grouped)
    }

    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, selected_color, quantity, updated_at
            FROM cart_lines
            WHERE user_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_cart_line).collect()
    }

    /// Applies one conditional decrement inside `tx`.
    async fn debit(tx: &mut Transaction<'_, Postgres>, debit: &StockDebit) -> Result<()> {
        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1 RETURNING stock",
        )
        .bind(i64::from(debit.quantity))
        .bind(debit.product_id.as_str())
        .fetch_optional(&mut **tx)
        .await?;

        if remaining.is_some() {
            return Ok(());
        }

        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(debit.product_id.as_str())
            .fetch_optional(&mut **tx)
            .await?;

        tracing::debug!(
            product_id = %debit.product_id,
            ?available,
            requested = debit.quantity,
            "stock debit missed, rolling back order"
        );
        match available {
            None => Err(StoreError::ProductNotFound(debit.product_id.clone())),
            Some(available) => Err(StoreError::InsufficientStock {
                product_id: debit.product_id.clone(),
                available,
                requested: debit.quantity,
            }),
        }
    }
}

#[async_trait]
impl Catalog for PostgresStore {
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<HashMap<ProductId, Product>> {
        let keys: Vec<&str> = ids.iter().map(ProductId::as_str).collect();
        let rows =
            sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = ANY($1)")
                .bind(&keys)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|row| Self::row_to_product(row).map(|p| (p.id.clone(), p)))
            .collect()
    }

    async fn set_stock(&self, id: &ProductId, new_stock: i64) -> Result<bool> {
        if new_stock < 0 {
            return Ok(false);
        }
        let result = sqlx::query("UPDATE products SET stock = $1 WHERE id = $2")
            .bind(new_stock)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.stock)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn commit_order(&self, order: &Order, debits: &[StockDebit]) -> Result<()> {
        validate_order_for_commit(order, debits)?;

        let mut tx = self.pool.begin().await?;

        for debit in debits {
            Self::debit(&mut tx, debit).await?;
        }

        let shipping = serde_json::to_value(&order.shipping)?;
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_amount_cents, shipping, payment_method,
                                proof_content_type, proof_bytes, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.order_id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.total_amount.cents())
        .bind(shipping)
        .bind(order.payment_method.as_str())
        .bind(order.proof.as_ref().map(|p| p.content_type.as_str()))
        .bind(order.proof.as_ref().map(|p| p.bytes.as_slice()))
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_pkey")
            {
                return StoreError::InvalidCommit(format!(
                    "order {} already exists",
                    order.order_id
                ));
            }
            StoreError::Database(e)
        })?;

        for (position, line) in order.items.iter().enumerate() {
            let quantity = i32::try_from(line.quantity).map_err(|_| {
                StoreError::InvalidCommit(format!("quantity {} out of range", line.quantity))
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, position, product_id, product_name,
                                         quantity, unit_price_cents, selected_color,
                                         created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(line.line_id.as_uuid())
            .bind(order.order_id.as_uuid())
            .bind(position as i32)
            .bind(line.product_id.as_str())
            .bind(&line.product_name)
            .bind(quantity)
            .bind(line.unit_price.cents())
            .bind(line.selected_color.as_deref())
            .bind(line.created_at)
            .bind(line.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, total_amount_cents, shipping, payment_method,
                   proof_content_type, proof_bytes, status, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut lines = self.load_lines(&[order_id.as_uuid()]).await?;
        let items = lines.remove(&order_id.as_uuid()).unwrap_or_default();
        Self::row_to_order(&row, items).map(Some)
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_amount_cents, shipping, payment_method,
                   proof_content_type, proof_bytes, status, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut lines = self.load_lines(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| Self::row_to_order(row, lines.remove(&id).unwrap_or_default()))
            .collect()
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        status: OrderStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Order> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
        )
        .bind(status.as_str())
        .bind(updated_at)
        .bind(order_id.as_uuid())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        let order = self
            .get_order(order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::StatusConflict {
                order_id,
                expected,
                actual: order.status,
            });
        }

        Ok(order)
    }
}

#[async_trait]
impl CartRepository for PostgresStore {
    async fn get_or_create(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        self.cart_lines(user_id).await
    }

    async fn add_line(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: i32,
        selected_color: Option<&str>,
    ) -> Result<Vec<CartLine>> {
        sqlx::query(
            r#"
            INSERT INTO cart_lines (id, user_id, product_id, selected_color, quantity, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT ON CONSTRAINT unique_cart_line DO UPDATE SET
                quantity = cart_lines.quantity + EXCLUDED.quantity,
                updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id.as_uuid())
        .bind(product_id.as_str())
        .bind(selected_color.unwrap_or_default())
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        self.cart_lines(user_id).await
    }

    async fn update_quantity(
        &self,
        user_id: UserId,
        line_id: LineId,
        quantity: i32,
    ) -> Result<Vec<CartLine>> {
        let result = sqlx::query(
            "UPDATE cart_lines SET quantity = $1, updated_at = NOW() WHERE id = $2 AND user_id = $3",
        )
        .bind(quantity)
        .bind(line_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::LineNotFound(line_id));
        }

        self.cart_lines(user_id).await
    }

    async fn remove_line(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        selected_color: Option<&str>,
        line_id: Option<LineId>,
    ) -> Result<Vec<CartLine>> {
        match line_id {
            Some(line_id) => {
                sqlx::query("DELETE FROM cart_lines WHERE id = $1 AND user_id = $2")
                    .bind(line_id.as_uuid())
                    .bind(user_id.as_uuid())
                    .execute(&self.pool)
                    .await?;
            }
            None => {
                sqlx::query(
                    "DELETE FROM cart_lines WHERE user_id = $1 AND product_id = $2 AND selected_color = $3",
                )
                .bind(user_id.as_uuid())
                .bind(product_id.as_str())
                .bind(selected_color.unwrap_or_default())
                .execute(&self.pool)
                .await?;
            }
        }

        self.cart_lines(user_id).await
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
