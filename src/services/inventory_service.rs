// src/services/inventory_service.rs

use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{common::error::AppError, db::InventoryRepository, models::inventory::Product};

#[derive(Clone)]
pub struct InventoryService {
    repo: InventoryRepository,
}

impl InventoryService {
    pub fn new(repo: InventoryRepository) -> Self {
        Self { repo }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_product(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
        unit_id: Uuid,
        sku: &str,
        name: &str,
        price: Decimal,
        initial_stock: Decimal,
    ) -> Result<Product, AppError> {
        // A unidade precisa existir no tenant.
        self.repo
            .get_unit(&mut *conn, tenant_id, unit_id)
            .await?
            .ok_or(AppError::UnitNotFound)?;

        self.repo
            .create_product(
                &mut *conn,
                tenant_id,
                store_id,
                unit_id,
                sku,
                name,
                price,
                initial_stock,
            )
            .await
    }

    pub async fn get_all_products(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
    ) -> Result<Vec<Product>, AppError> {
        self.repo.get_all_products(&mut *conn, tenant_id, store_id).await
    }
}
