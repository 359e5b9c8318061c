// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::{db_utils::get_rls_connection, error::AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        tenancy::{StoreScope, TenantContext},
    },
    models::rbac::PermissionAction,
};

/// 1. O Trait que define o que é uma Permissão
pub trait PermissionDef: Send + Sync + 'static {
    const MODULE: &'static str;
    const ACTION: PermissionAction;
}

/// 2. O Extractor (Guardião): avalia (módulo, ação) para o usuário no escopo
/// atual (tenant + loja opcional) e rejeita com 403 quando negado.
pub struct RequirePermission<T>(pub PhantomData<T>);

// 3. Implementação do FromRequestParts

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        // A. Usuário (inserido pelo auth_guard)
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        // B. Escopo (tenant obrigatório, loja opcional)
        let tenant = TenantContext::from_request_parts(parts, state).await?;
        let store = StoreScope::from_request_parts(parts, state).await?;

        // C. Avalia no banco (com cache por trás)
        let mut conn = get_rls_connection(&app_state, &tenant, &user).await?;
        let decision = app_state
            .permission_service
            .check_permission(&mut conn, tenant.0, user.0.id, T::MODULE, T::ACTION, store.0)
            .await?;

        if !decision.allowed {
            return Err(AppError::PermissionDenied);
        }

        Ok(RequirePermission(PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS PERMISSÕES (TIPOS)
// ---

macro_rules! permission {
    ($name:ident, $module:expr, $action:expr) => {
        pub struct $name;
        impl PermissionDef for $name {
            const MODULE: &'static str = $module;
            const ACTION: PermissionAction = $action;
        }
    };
}

permission!(PermInventoryView, "inventory", PermissionAction::View);
permission!(PermInventoryAdd, "inventory", PermissionAction::Add);
permission!(PermInventoryEdit, "inventory", PermissionAction::Edit);
permission!(PermInventoryDelete, "inventory", PermissionAction::Delete);
permission!(PermProductsView, "products", PermissionAction::View);
permission!(PermProductsAdd, "products", PermissionAction::Add);
permission!(PermOnlineStoreView, "online_store", PermissionAction::View);
permission!(PermOnlineStoreAdd, "online_store", PermissionAction::Add);
permission!(PermOnlineStoreEdit, "online_store", PermissionAction::Edit);
permission!(PermUsersView, "users", PermissionAction::View);
permission!(PermUsersEdit, "users", PermissionAction::Edit);
