// src/handlers/rbac.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{db_utils::get_rls_connection, error::AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{PermUsersEdit, PermUsersView, RequirePermission},
        tenancy::TenantContext,
    },
    models::{
        auth::UserRole,
        rbac::{PermissionAction, PermissionMap, PermissionQuery},
    },
};

// ---
// Payload: checagem única
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckPermissionPayload {
    #[validate(length(min = 1, message = "O módulo é obrigatório."))]
    #[schema(example = "inventory")]
    pub module: String,
    pub action: PermissionAction,
    pub store_id: Option<Uuid>,
}

// ---
// Handler: checagem única de permissão
// ---
#[utoipa::path(
    post,
    path = "/api/rbac/check",
    tag = "RBAC",
    request_body = CheckPermissionPayload,
    responses(
        (status = 200, description = "Decisão avaliada (negação NÃO é erro)"),
        (status = 404, description = "Usuário não encontrado no tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn check_permission(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Json(payload): Json<CheckPermissionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let decision = app_state
        .permission_service
        .check_permission(
            &mut conn,
            tenant.0,
            user.0.id,
            &payload.module,
            payload.action,
            payload.store_id,
        )
        .await?;

    Ok((StatusCode::OK, Json(decision)))
}

// ---
// Payload: checagem em lote
// ---
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckBatchPayload {
    pub checks: Vec<PermissionQuery>,
}

// ---
// Handler: checagem em lote (uma resolução de contexto para N pares)
// ---
#[utoipa::path(
    post,
    path = "/api/rbac/check-batch",
    tag = "RBAC",
    request_body = CheckBatchPayload,
    responses(
        (status = 200, description = "Mapa 'module:action:scope' -> decisão")
    ),
    security(("api_jwt" = []))
)]
pub async fn check_multiple_permissions(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    Json(payload): Json<CheckBatchPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let results = app_state
        .permission_service
        .check_multiple_permissions(&mut conn, tenant.0, user.0.id, &payload.checks)
        .await?;

    Ok((StatusCode::OK, Json(results)))
}

// ---
// Payload: cargo + permissões customizadas de um usuário
// ---
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserPermissionsPayload {
    pub role: UserRole,
    /// None limpa o mapa customizado (volta ao padrão do cargo).
    #[schema(value_type = Object)]
    pub custom_permissions: Option<PermissionMap>,
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/permissions",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID do usuário")),
    request_body = UpdateUserPermissionsPayload,
    responses(
        (status = 200, description = "Usuário atualizado; cache invalidado via evento"),
        (status = 404, description = "Usuário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_user_permissions(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersEdit>,
    Path(target_user_id): Path<Uuid>,
    Json(payload): Json<UpdateUserPermissionsPayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let updated = app_state
        .user_repo
        .update_role_and_permissions(
            &mut *conn,
            tenant.0,
            target_user_id,
            payload.role,
            payload.custom_permissions,
        )
        .await?;

    Ok((StatusCode::OK, Json(updated)))
}

// ---
// Payload: vínculo usuário <-> loja
// ---
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignStorePayload {
    pub store_id: Uuid,
    pub role_override: Option<UserRole>,
    /// Override de permissões restrito a esta loja. Quando presente,
    /// SUBSTITUI (não mescla) as camadas de baixo para os módulos dele.
    #[schema(value_type = Object)]
    pub permissions: Option<PermissionMap>,
}

#[utoipa::path(
    post,
    path = "/api/users/{id}/stores",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID do usuário")),
    request_body = AssignStorePayload,
    responses((status = 201, description = "Vínculo criado/atualizado")),
    security(("api_jwt" = []))
)]
pub async fn assign_user_to_store(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersEdit>,
    Path(target_user_id): Path<Uuid>,
    Json(payload): Json<AssignStorePayload>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let assignment = app_state
        .rbac_repo
        .upsert_assignment(
            &mut *conn,
            tenant.0,
            target_user_id,
            payload.store_id,
            payload.role_override,
            payload.permissions,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}/stores/{store_id}",
    tag = "RBAC",
    params(
        ("id" = Uuid, Path, description = "ID do usuário"),
        ("store_id" = Uuid, Path, description = "ID da loja")
    ),
    responses((status = 204, description = "Vínculo removido")),
    security(("api_jwt" = []))
)]
pub async fn remove_store_assignment(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersEdit>,
    Path((target_user_id, store_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    app_state
        .rbac_repo
        .delete_assignment(&mut *conn, tenant.0, target_user_id, store_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/stores",
    tag = "RBAC",
    params(("id" = Uuid, Path, description = "ID do usuário")),
    responses((status = 200, description = "Vínculos do usuário")),
    security(("api_jwt" = []))
)]
pub async fn list_store_assignments(
    State(app_state): State<AppState>,
    user: AuthenticatedUser,
    tenant: TenantContext,
    _guard: RequirePermission<PermUsersView>,
    Path(target_user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;

    let assignments = app_state
        .rbac_repo
        .list_assignments_for_user(&mut *conn, tenant.0, target_user_id)
        .await?;

    Ok((StatusCode::OK, Json(assignments)))
}
