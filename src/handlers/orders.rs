// src/handlers/orders.rs

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

use crate::{
    common::{db_utils::get_rls_connection, error::AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{PermOnlineStoreAdd, PermOnlineStoreEdit, PermOnlineStoreView, RequirePermission},
        tenancy::{StoreContext, TenantContext},
    },
    models::orders::OrderStatus,
    services::order_service::{CartLine, CheckoutInfo},
};

fn validate_quantity(val: &Decimal) -> Result<(), ValidationError> {
    if *val <= Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.message = Some("A quantidade deve ser maior que zero.".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Payloads do checkout
// ---
// Serialize também: o `length` do validator serializa o valor ofensivo nos
// params do erro.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemPayload {
    pub product_id: Uuid,
    #[validate(custom(function = "validate_quantity"))]
    pub quantity: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderPayload {
    #[validate(length(min = 1, message = "O carrinho não pode estar vazio."), nested)]
    pub items: Vec<CartItemPayload>,

    #[validate(length(min = 1, message = "O método de pagamento é obrigatório."))]
    pub payment_method: String,

    #[validate(length(min = 1, message = "O nome do cliente é obrigatório."))]
    pub customer_name: String,

    #[validate(email(message = "E-mail do cliente inválido."))]
    pub customer_email: String,

    #[validate(length(min = 1, message = "O endereço de entrega é obrigatório."))]
    pub shipping_address: String,

    #[validate(length(min = 1, message = "A cidade de entrega é obrigatória."))]
    pub shipping_city: String,

    pub shipping_postal_code: Option<String>,
}

// ---
// Handler: create_order (checkout da vitrine online)
// ---
#[utoipa::path(
    post,
    path = "/api/shop/orders",
    tag = "Loja Online",
    request_body = CreateOrderPayload,
    responses(
        (status = 201, description = "Pedido criado com status pending"),
        (status = 404, description = "Produto inexistente ou de outra loja")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_order(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    store: StoreContext,
    _guard: RequirePermission<PermOnlineStoreAdd>,
    Json(payload): Json<CreateOrderPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let lines: Vec<CartLine> = payload
        .items
        .iter()
        .map(|item| CartLine {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();

    let detail = app_state
        .order_service
        .create_order(
            &mut conn,
            tenant.0,
            store.0,
            &lines,
            CheckoutInfo {
                payment_method: payload.payment_method,
                customer_name: payload.customer_name,
                customer_email: payload.customer_email,
                shipping_address: payload.shipping_address,
                shipping_city: payload.shipping_city,
                shipping_postal_code: payload.shipping_postal_code,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

// ---
// Handler: list_orders
// ---
#[utoipa::path(
    get,
    path = "/api/shop/orders",
    tag = "Loja Online",
    responses((status = 200, description = "Pedidos da loja, mais recentes primeiro")),
    security(("api_jwt" = []))
)]
pub async fn list_orders(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    store: StoreContext,
    _guard: RequirePermission<PermOnlineStoreView>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let orders = app_state
        .order_service
        .list_orders(&mut conn, tenant.0, store.0)
        .await?;

    Ok((StatusCode::OK, Json(orders)))
}

// ---
// Handler: get_order (cabeçalho + itens)
// ---
#[utoipa::path(
    get,
    path = "/api/shop/orders/{id}",
    tag = "Loja Online",
    params(("id" = Uuid, Path, description = "ID do pedido")),
    responses(
        (status = 200, description = "Pedido com itens"),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_order(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    store: StoreContext,
    _guard: RequirePermission<PermOnlineStoreView>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let detail = app_state
        .order_service
        .get_order_detail(&mut conn, tenant.0, store.0, order_id)
        .await?;

    Ok((StatusCode::OK, Json(detail)))
}

// ---
// Payload: transição de status
// ---
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionStatusPayload {
    pub status: OrderStatus,
}

// ---
// Handler: transition_order_status
// Pedido inexistente é 404; transição proibida é 400 com os dois status no
// corpo. A baixa/devolução de estoque acontece na mesma transação.
// ---
#[utoipa::path(
    put,
    path = "/api/shop/orders/{id}/status",
    tag = "Loja Online",
    params(("id" = Uuid, Path, description = "ID do pedido")),
    request_body = TransitionStatusPayload,
    responses(
        (status = 200, description = "Status atualizado"),
        (status = 400, description = "Transição inválida ou estoque insuficiente (lista itemizada)"),
        (status = 404, description = "Pedido não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn transition_order_status(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    store: StoreContext,
    _guard: RequirePermission<PermOnlineStoreEdit>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<TransitionStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let updated = app_state
        .order_service
        .transition_status(&mut conn, tenant.0, store.0, order_id, payload.status)
        .await?;

    Ok((StatusCode::OK, Json(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;

    fn line(qty: f64) -> CartItemPayload {
        CartItemPayload {
            product_id: Uuid::new_v4(),
            quantity: Decimal::from_f64(qty).unwrap(),
        }
    }

    fn checkout(items: Vec<CartItemPayload>) -> CreateOrderPayload {
        CreateOrderPayload {
            items,
            payment_method: "pix".to_string(),
            customer_name: "Ana".to_string(),
            customer_email: "ana@example.com".to_string(),
            shipping_address: "Rua A, 1".to_string(),
            shipping_city: "São Paulo".to_string(),
            shipping_postal_code: None,
        }
    }

    #[test]
    fn carrinho_vazio_e_rejeitado() {
        assert!(checkout(vec![]).validate().is_err());
        assert!(checkout(vec![line(1.0)]).validate().is_ok());
    }

    #[test]
    fn quantidade_nao_positiva_e_rejeitada() {
        assert!(checkout(vec![line(0.0)]).validate().is_err());
        assert!(checkout(vec![line(-2.0)]).validate().is_err());
        assert!(checkout(vec![line(0.5)]).validate().is_ok());
    }
}
