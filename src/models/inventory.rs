// src/models/inventory.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Unidades de Medida ---
// Uma unidade ou é base (base_unit_id = None, fator tratado como 1), ou
// aponta para exatamente uma unidade-base com fator positivo:
// 1 desta unidade = conversion_factor unidades-base.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitOfMeasure {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub name: String,
    pub symbol: String,
    pub base_unit_id: Option<Uuid>,
    pub conversion_factor: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Produtos ---
// O saldo (stock_quantity) só muda por recebimento de compra, venda/pedido
// ou ajuste explícito; nunca fica negativo (garantido na camada de serviço).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub unit_id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub stock_quantity: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
