// src/db/inventory_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::inventory::{Product, UnitOfMeasure},
};

// Todas as consultas recebem o executor de quem chama (pool ou transação),
// então o repositório em si não guarda estado.
#[derive(Clone, Default)]
pub struct InventoryRepository;

impl InventoryRepository {
    pub fn new() -> Self {
        Self
    }

    // ---
    // Unidades de Medida
    // ---

    pub async fn get_unit<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        unit_id: Uuid,
    ) -> Result<Option<UnitOfMeasure>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let unit = sqlx::query_as::<_, UnitOfMeasure>(
            "SELECT * FROM units_of_measure WHERE id = $1 AND tenant_id = $2",
        )
        .bind(unit_id)
        .bind(tenant_id)
        .fetch_optional(executor)
        .await?;
        Ok(unit)
    }

    pub async fn get_all_units<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Vec<UnitOfMeasure>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let units = sqlx::query_as::<_, UnitOfMeasure>(
            "SELECT * FROM units_of_measure WHERE tenant_id = $1 ORDER BY name ASC",
        )
        .bind(tenant_id)
        .fetch_all(executor)
        .await?;
        Ok(units)
    }

    /// Cria uma nova unidade (kg, un, L) para um tenant.
    pub async fn create_unit<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        name: &str,
        symbol: &str,
        base_unit_id: Option<Uuid>,
        conversion_factor: Decimal,
    ) -> Result<UnitOfMeasure, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, UnitOfMeasure>(
            r#"
            INSERT INTO units_of_measure (tenant_id, name, symbol, base_unit_id, conversion_factor)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .bind(symbol)
        .bind(base_unit_id)
        .bind(conversion_factor)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    let constraint = db_err.constraint().unwrap_or_default();
                    if constraint.contains("name") {
                        return AppError::UniqueConstraintViolation(format!(
                            "Já existe uma unidade chamada '{}'.",
                            name
                        ));
                    }
                    if constraint.contains("symbol") {
                        return AppError::UniqueConstraintViolation(format!(
                            "Já existe uma unidade com o símbolo '{}'.",
                            symbol
                        ));
                    }
                }
            }
            e.into()
        })
    }

    /// Reatribui a unidade-base e o fator. A checagem de ciclo acontece no
    /// serviço, antes de chegar aqui.
    pub async fn set_base_unit<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        unit_id: Uuid,
        base_unit_id: Option<Uuid>,
        conversion_factor: Decimal,
    ) -> Result<UnitOfMeasure, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let unit = sqlx::query_as::<_, UnitOfMeasure>(
            r#"
            UPDATE units_of_measure
            SET base_unit_id = $3, conversion_factor = $4, updated_at = now()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(unit_id)
        .bind(tenant_id)
        .bind(base_unit_id)
        .bind(conversion_factor)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::UnitNotFound)?;
        Ok(unit)
    }

    pub async fn count_products_using_unit<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        unit_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE tenant_id = $1 AND unit_id = $2",
        )
        .bind(tenant_id)
        .bind(unit_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn count_units_with_base<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        unit_id: Uuid,
    ) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM units_of_measure WHERE tenant_id = $1 AND base_unit_id = $2",
        )
        .bind(tenant_id)
        .bind(unit_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    pub async fn delete_unit<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        unit_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM units_of_measure WHERE id = $1 AND tenant_id = $2")
            .bind(unit_id)
            .bind(tenant_id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UnitNotFound);
        }
        Ok(())
    }

    // ---
    // Produtos
    // ---

    pub async fn create_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        store_id: Uuid,
        unit_id: Uuid,
        sku: &str,
        name: &str,
        price: Decimal,
        initial_stock: Decimal,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (tenant_id, store_id, unit_id, sku, name, price, stock_quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(store_id)
        .bind(unit_id)
        .bind(sku)
        .bind(name)
        .bind(price)
        .bind(initial_stock)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::SkuAlreadyExists;
                }
            }
            e.into()
        })
    }

    pub async fn get_all_products<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        store_id: Uuid,
    ) -> Result<Vec<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE tenant_id = $1 AND store_id = $2 ORDER BY name ASC",
        )
        .bind(tenant_id)
        .bind(store_id)
        .fetch_all(executor)
        .await?;
        Ok(products)
    }

    pub async fn get_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product =
            sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND tenant_id = $2")
                .bind(product_id)
                .bind(tenant_id)
                .fetch_optional(executor)
                .await?;
        Ok(product)
    }

    /// Trava as linhas dos produtos envolvidos (FOR UPDATE) em ordem estável
    /// de id, para a baixa/devolução de estoque não correr com outra escrita.
    pub async fn get_products_for_update<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        product_ids: &[Uuid],
    ) -> Result<Vec<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE tenant_id = $1 AND id = ANY($2)
            ORDER BY id ASC
            FOR UPDATE
            "#,
        )
        .bind(tenant_id)
        .bind(product_ids)
        .fetch_all(executor)
        .await?;
        Ok(products)
    }

    /// Soma (ou subtrai) `delta` ao saldo do produto.
    pub async fn adjust_stock<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        product_id: Uuid,
        delta: Decimal,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $3, updated_at = now()
            WHERE id = $1 AND tenant_id = $2
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(tenant_id)
        .bind(delta)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::ProductNotFound)?;
        Ok(product)
    }
}
