// src/models/rbac.rs

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::auth::UserRole;

/// Código fixo retornado em toda negação de permissão.
pub const PERMISSION_DENIED_CODE: &str = "PERM001";

// Ações possíveis dentro de um módulo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    View,
    Add,
    Edit,
    Delete,
}

impl PermissionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionAction::View => "view",
            PermissionAction::Add => "add",
            PermissionAction::Edit => "edit",
            PermissionAction::Delete => "delete",
        }
    }

    pub const ALL: [PermissionAction; 4] = [
        PermissionAction::View,
        PermissionAction::Add,
        PermissionAction::Edit,
        PermissionAction::Delete,
    ];
}

/// Mapa de permissões: módulo -> conjunto de ações liberadas.
/// Guardado como JSONB em users.custom_permissions e
/// user_store_assignments.permissions.
pub type PermissionMap = HashMap<String, HashSet<PermissionAction>>;

/// Módulos conhecidos do sistema. A avaliação aceita qualquer string (dados
/// desconhecidos resolvem para "sem permissão"), mas os padrões por cargo
/// são montados sobre esta lista.
pub const MODULES: [&str; 13] = [
    "dashboard",
    "products",
    "inventory",
    "sales",
    "purchases",
    "customers",
    "suppliers",
    "debts",
    "shifts",
    "reports",
    "online_store",
    "settings",
    "users",
];

// Vínculo usuário <-> loja, com overrides opcionais restritos àquela loja.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStoreAssignment {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub store_id: Uuid,
    pub role_override: Option<UserRole>,
    #[schema(ignore)]
    pub permissions: Option<Json<PermissionMap>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resultado de uma avaliação de permissão. Negação NÃO é erro: ela volta
/// com `allowed: false` e o código fixo PERM001.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "PERM001")]
    pub error_code: Option<&'static str>,
}

impl PermissionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            error_code: None,
        }
    }

    pub fn deny() -> Self {
        Self {
            allowed: false,
            error_code: Some(PERMISSION_DENIED_CODE),
        }
    }
}

// Um par (módulo, ação) de uma checagem em lote.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionQuery {
    #[schema(example = "inventory")]
    pub module: String,
    pub action: PermissionAction,
    /// Escopo opcional por loja; None avalia no escopo global do tenant.
    pub store_id: Option<Uuid>,
}
