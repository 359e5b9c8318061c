// src/handlers/inventory.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// Importa os nossos extratores e erros
use crate::{
    common::{db_utils::get_rls_connection, error::AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{
            PermInventoryAdd, PermInventoryDelete, PermInventoryEdit, PermInventoryView,
            PermProductsAdd, PermProductsView, RequirePermission,
        },
        tenancy::{StoreContext, TenantContext},
    },
};

// ---
// Validações customizadas
// ---
fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

fn validate_positive(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.message = Some("O valor deve ser maior que zero.".into());
        return Err(err);
    }
    Ok(())
}

fn default_conversion_factor() -> Decimal {
    Decimal::ONE
}

// ---
// Payload: CreateUnitPayload
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUnitPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,
    #[validate(length(min = 1, message = "O símbolo é obrigatório."))]
    pub symbol: String,

    // Unidade-base opcional: "1 desta unidade = conversionFactor da base".
    pub base_unit_id: Option<Uuid>,
    #[validate(custom(function = "validate_positive"))]
    #[serde(default = "default_conversion_factor")]
    pub conversion_factor: Decimal,
}

// ---
// Handler: create_unit
// ---
pub async fn create_unit(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermInventoryAdd>,
    Json(payload): Json<CreateUnitPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let unit = app_state
        .unit_service
        .create_unit(
            &mut conn,
            tenant.0,
            &payload.name,
            &payload.symbol,
            payload.base_unit_id,
            payload.conversion_factor,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(unit)))
}

// ---
// Handler: get_all_units
// ---
pub async fn get_all_units(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermInventoryView>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let units = app_state
        .unit_service
        .get_all_units(&mut conn, tenant.0)
        .await?;

    Ok((StatusCode::OK, Json(units)))
}

// ---
// Handler: delete_unit
// Falha com 409 se algum produto usa a unidade ou se outra unidade a tem
// como base.
// ---
pub async fn delete_unit(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermInventoryDelete>,
    Path(unit_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    app_state
        .unit_service
        .delete_unit(&mut conn, tenant.0, unit_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ---
// Payload: SetBaseUnitPayload
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetBaseUnitPayload {
    /// None remove a base (a unidade volta a ser base, fator 1).
    pub base_unit_id: Option<Uuid>,
    #[validate(custom(function = "validate_positive"))]
    #[serde(default = "default_conversion_factor")]
    pub conversion_factor: Decimal,
}

// ---
// Handler: set_base_unit (com checagem de ciclo na cadeia inteira)
// ---
pub async fn set_base_unit(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermInventoryEdit>,
    Path(unit_id): Path<Uuid>,
    Json(payload): Json<SetBaseUnitPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let unit = app_state
        .unit_service
        .set_base_unit(
            &mut conn,
            tenant.0,
            unit_id,
            payload.base_unit_id,
            payload.conversion_factor,
        )
        .await?;

    Ok((StatusCode::OK, Json(unit)))
}

// ---
// Payload/Resposta: conversão de quantidades
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertQuantityPayload {
    #[validate(custom(function = "validate_not_negative"))]
    pub quantity: Decimal,
    pub from_unit_id: Uuid,
    pub to_unit_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertQuantityResponse {
    pub quantity: Decimal,
    pub converted_quantity: Decimal,
    pub from_unit_id: Uuid,
    pub to_unit_id: Uuid,
}

// ---
// Handler: convert_quantity
// Só converte entre unidades que compartilham a mesma base; caso contrário
// devolve 400 em vez de um número errado.
// ---
pub async fn convert_quantity(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermInventoryView>,
    Json(payload): Json<ConvertQuantityPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let converted = app_state
        .unit_service
        .convert(
            &mut conn,
            tenant.0,
            payload.quantity,
            payload.from_unit_id,
            payload.to_unit_id,
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(ConvertQuantityResponse {
            quantity: payload.quantity,
            converted_quantity: converted,
            from_unit_id: payload.from_unit_id,
            to_unit_id: payload.to_unit_id,
        }),
    ))
}

// ---
// Payload: CreateProductPayload
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
    #[validate(length(min = 1, message = "O SKU é obrigatório."))]
    pub sku: String,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    pub name: String,

    pub unit_id: Uuid,

    #[validate(custom(function = "validate_not_negative"))]
    pub price: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    #[serde(default)]
    pub initial_stock: Decimal,
}

// ---
// Handler: create_product
// ---
pub async fn create_product(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    store: StoreContext,
    _guard: RequirePermission<PermProductsAdd>,
    Json(payload): Json<CreateProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let product = app_state
        .inventory_service
        .create_product(
            &mut conn,
            tenant.0,
            store.0,
            payload.unit_id,
            &payload.sku,
            &payload.name,
            payload.price,
            payload.initial_stock,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(product)))
}

// ---
// Handler: get_all_products
// ---
pub async fn get_all_products(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    store: StoreContext,
    _guard: RequirePermission<PermProductsView>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let products = app_state
        .inventory_service
        .get_all_products(&mut conn, tenant.0, store.0)
        .await?;

    Ok((StatusCode::OK, Json(products)))
}
