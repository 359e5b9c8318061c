// src/db/order_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::orders::{OnlineOrder, OnlineOrderItem, OrderStatus},
};

// Sem estado próprio: o executor (pool ou transação) vem de quem chama.
#[derive(Clone, Default)]
pub struct OrderRepository;

impl OrderRepository {
    pub fn new() -> Self {
        Self
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_order<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        store_id: Uuid,
        payment_method: &str,
        customer_name: &str,
        customer_email: &str,
        shipping_address: &str,
        shipping_city: &str,
        shipping_postal_code: Option<&str>,
        total: Decimal,
    ) -> Result<OnlineOrder, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, OnlineOrder>(
            r#"
            INSERT INTO online_orders
                (tenant_id, store_id, payment_method, customer_name, customer_email,
                 shipping_address, shipping_city, shipping_postal_code, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(payment_method)
        .bind(customer_name)
        .bind(customer_email)
        .bind(shipping_address)
        .bind(shipping_city)
        .bind(shipping_postal_code)
        .bind(total)
        .fetch_one(executor)
        .await?;
        Ok(order)
    }

    pub async fn insert_order_item<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        product_id: Uuid,
        product_name: &str,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Result<OnlineOrderItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, OnlineOrderItem>(
            r#"
            INSERT INTO online_order_items
                (tenant_id, order_id, product_id, product_name, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(order_id)
        .bind(product_id)
        .bind(product_name)
        .bind(quantity)
        .bind(unit_price)
        .fetch_one(executor)
        .await?;
        Ok(item)
    }

    /// Busca o pedido no escopo (tenant, loja online). Escopo errado ou
    /// pedido inexistente resultam em None (vira 404 no caller).
    pub async fn get_order<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        store_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<OnlineOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, OnlineOrder>(
            "SELECT * FROM online_orders WHERE id = $1 AND tenant_id = $2 AND store_id = $3",
        )
        .bind(order_id)
        .bind(tenant_id)
        .bind(store_id)
        .fetch_optional(executor)
        .await?;
        Ok(order)
    }

    /// Igual a `get_order`, mas trava a linha do pedido até o fim da
    /// transação (FOR UPDATE), serializando transições concorrentes.
    pub async fn get_order_for_update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        store_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<OnlineOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, OnlineOrder>(
            r#"
            SELECT * FROM online_orders
            WHERE id = $1 AND tenant_id = $2 AND store_id = $3
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .bind(tenant_id)
        .bind(store_id)
        .fetch_optional(executor)
        .await?;
        Ok(order)
    }

    pub async fn list_orders<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        store_id: Uuid,
    ) -> Result<Vec<OnlineOrder>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let orders = sqlx::query_as::<_, OnlineOrder>(
            r#"
            SELECT * FROM online_orders
            WHERE tenant_id = $1 AND store_id = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .fetch_all(executor)
        .await?;
        Ok(orders)
    }

    pub async fn list_order_items<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Vec<OnlineOrderItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, OnlineOrderItem>(
            "SELECT * FROM online_order_items WHERE tenant_id = $1 AND order_id = $2",
        )
        .bind(tenant_id)
        .bind(order_id)
        .fetch_all(executor)
        .await?;
        Ok(items)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<OnlineOrder, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, OnlineOrder>(
            r#"
            UPDATE online_orders
            SET status = $3, updated_at = now()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(tenant_id)
        .bind(status)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::OrderNotFound)?;
        Ok(order)
    }
}
