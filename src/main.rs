//src/main.rs

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post, put},
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// Declaração dos nossos módulos
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() {
    // Inicializa o logger.
    tracing_subscriber::fmt().with_target(false).compact().init();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new()
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .expect("Falha ao rodar as migrações do banco de dados.");

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Rotas de usuário: perfil, cargo/permissões e vínculos com lojas
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route(
            "/{id}/permissions",
            put(handlers::rbac::update_user_permissions),
        )
        .route(
            "/{id}/stores",
            post(handlers::rbac::assign_user_to_store)
                .get(handlers::rbac::list_store_assignments),
        )
        .route(
            "/{id}/stores/{store_id}",
            axum::routing::delete(handlers::rbac::remove_store_assignment),
        );

    // Rotas de checagem de permissão (a checagem em si é sempre permitida)
    let rbac_routes = Router::new()
        .route("/check", post(handlers::rbac::check_permission))
        .route(
            "/check-batch",
            post(handlers::rbac::check_multiple_permissions),
        );

    let inventory_routes = Router::new()
        .route(
            "/units",
            post(handlers::inventory::create_unit).get(handlers::inventory::get_all_units),
        )
        .route(
            "/units/{id}",
            axum::routing::delete(handlers::inventory::delete_unit),
        )
        .route(
            "/units/{id}/base-unit",
            put(handlers::inventory::set_base_unit),
        )
        .route("/convert", post(handlers::inventory::convert_quantity))
        .route(
            "/products",
            post(handlers::inventory::create_product).get(handlers::inventory::get_all_products),
        );

    // Vitrine online: checkout e ciclo de vida dos pedidos
    let shop_routes = Router::new()
        .route(
            "/orders",
            post(handlers::orders::create_order).get(handlers::orders::list_orders),
        )
        .route("/orders/{id}", get(handlers::orders::get_order))
        .route(
            "/orders/{id}/status",
            put(handlers::orders::transition_order_status),
        );

    // Tudo que não é /api/auth exige um token válido.
    let protected_routes = Router::new()
        .nest("/api/users", user_routes)
        .nest("/api/rbac", rbac_routes)
        .nest("/api/inventory", inventory_routes)
        .nest("/api/shop", shop_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .merge(protected_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .with_state(app_state);

    // Inicia o servidor
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
