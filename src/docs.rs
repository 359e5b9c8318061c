// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};

use crate::common;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- RBAC ---
        handlers::rbac::check_permission,
        handlers::rbac::check_multiple_permissions,
        handlers::rbac::update_user_permissions,
        handlers::rbac::assign_user_to_store,
        handlers::rbac::remove_store_assignment,
        handlers::rbac::list_store_assignments,

        // --- Loja Online ---
        handlers::orders::create_order,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::transition_order_status,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::UserStatus,
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- RBAC ---
            models::rbac::PermissionAction,
            models::rbac::PermissionDecision,
            models::rbac::PermissionQuery,
            models::rbac::UserStoreAssignment,
            handlers::rbac::CheckPermissionPayload,
            handlers::rbac::CheckBatchPayload,
            handlers::rbac::UpdateUserPermissionsPayload,
            handlers::rbac::AssignStorePayload,

            // --- Inventory ---
            models::inventory::UnitOfMeasure,
            models::inventory::Product,
            handlers::inventory::CreateUnitPayload,
            handlers::inventory::SetBaseUnitPayload,
            handlers::inventory::ConvertQuantityPayload,
            handlers::inventory::ConvertQuantityResponse,
            handlers::inventory::CreateProductPayload,

            // --- Loja Online ---
            models::orders::OrderStatus,
            models::orders::PaymentStatus,
            models::orders::OnlineOrder,
            models::orders::OnlineOrderItem,
            models::orders::OrderDetail,
            common::error::StockShortfall,
            handlers::orders::CartItemPayload,
            handlers::orders::CreateOrderPayload,
            handlers::orders::TransitionStatusPayload,
        )
    ),
    tags(
        (name = "RBAC", description = "Avaliação e gestão de permissões"),
        (name = "Loja Online", description = "Pedidos da vitrine online e ciclo de status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}
