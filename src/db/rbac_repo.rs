// src/db/rbac_repo.rs

use sqlx::types::Json;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        events::{PermissionEvent, PermissionEvents},
    },
    models::{
        auth::UserRole,
        rbac::{PermissionMap, UserStoreAssignment},
    },
};

#[derive(Clone)]
pub struct RbacRepository {
    pool: PgPool,
    events: PermissionEvents,
}

impl RbacRepository {
    pub fn new(pool: PgPool, events: PermissionEvents) -> Self {
        Self { pool, events }
    }

    pub async fn get_assignment<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        store_id: Uuid,
    ) -> Result<Option<UserStoreAssignment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let assignment = sqlx::query_as::<_, UserStoreAssignment>(
            "SELECT * FROM user_store_assignments WHERE user_id = $1 AND store_id = $2",
        )
        .bind(user_id)
        .bind(store_id)
        .fetch_optional(executor)
        .await?;
        Ok(assignment)
    }

    pub async fn list_assignments_for_user<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<UserStoreAssignment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let assignments = sqlx::query_as::<_, UserStoreAssignment>(
            r#"
            SELECT * FROM user_store_assignments
            WHERE tenant_id = $1 AND user_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_all(executor)
        .await?;
        Ok(assignments)
    }

    /// Cria ou atualiza o vínculo do usuário com a loja (UPSERT atômico).
    pub async fn upsert_assignment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        store_id: Uuid,
        role_override: Option<UserRole>,
        permissions: Option<PermissionMap>,
    ) -> Result<UserStoreAssignment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let assignment = sqlx::query_as::<_, UserStoreAssignment>(
            r#"
            INSERT INTO user_store_assignments (tenant_id, user_id, store_id, role_override, permissions)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, store_id)
            DO UPDATE SET
                role_override = $4,
                permissions = $5,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(store_id)
        .bind(role_override)
        .bind(permissions.map(Json))
        .fetch_one(executor)
        .await?;

        self.events
            .publish(PermissionEvent::AssignmentChanged { user_id, store_id });
        Ok(assignment)
    }

    pub async fn delete_assignment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
        store_id: Uuid,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            DELETE FROM user_store_assignments
            WHERE tenant_id = $1 AND user_id = $2 AND store_id = $3
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(store_id)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::StoreNotFound);
        }

        self.events
            .publish(PermissionEvent::AssignmentChanged { user_id, store_id });
        Ok(())
    }
}
