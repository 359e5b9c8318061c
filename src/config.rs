// src/config.rs

use std::sync::Arc;
use std::{env, time::Duration};

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::common::events::PermissionEvents;
use crate::db::{InventoryRepository, OrderRepository, RbacRepository, UserRepository};
use crate::services::{
    auth::AuthService,
    inventory_service::InventoryService,
    notification::LogEmailNotifier,
    order_service::OrderService,
    permission_service::{PermissionCache, PermissionService},
    unit_service::UnitService,
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub auth_service: AuthService,
    pub permission_service: PermissionService,
    pub unit_service: UnitService,
    pub inventory_service: InventoryService,
    pub order_service: OrderService,
    pub user_repo: UserRepository,
    pub rbac_repo: RbacRepository,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET deve ser definido");
        let cache_ttl_secs = env::var("PERMISSION_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        // Os repositórios que mexem em permissões publicam eventos; o cache
        // assina o canal e se invalida sozinho.
        let events = PermissionEvents::new(64);
        let permission_cache = PermissionCache::new(Duration::from_secs(cache_ttl_secs));
        tokio::spawn(permission_cache.clone().listen(events.subscribe()));

        let user_repo = UserRepository::new(db_pool.clone(), events.clone());
        let rbac_repo = RbacRepository::new(db_pool.clone(), events.clone());
        let inventory_repo = InventoryRepository::new();
        let order_repo = OrderRepository::new();

        let auth_service =
            AuthService::new(user_repo.clone(), jwt_secret.clone(), db_pool.clone());
        let permission_service =
            PermissionService::new(user_repo.clone(), rbac_repo.clone(), permission_cache);
        let unit_service = UnitService::new(inventory_repo.clone());
        let inventory_service = InventoryService::new(inventory_repo.clone());
        let order_service = OrderService::new(
            order_repo,
            inventory_repo,
            Arc::new(LogEmailNotifier),
        );

        Ok(Self {
            db_pool,
            jwt_secret,
            auth_service,
            permission_service,
            unit_service,
            inventory_service,
            order_service,
            user_repo,
            rbac_repo,
        })
    }
}
