use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::orders::OrderStatus;

/// Item em falta numa tentativa de baixa de estoque.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    pub product_name: String,
    pub available: Decimal,
    pub requested: Decimal,
}

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Conta bloqueada temporariamente")]
    AccountLocked,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Permissão negada")]
    PermissionDenied,

    #[error("Loja não encontrada")]
    StoreNotFound,

    #[error("Unidade de medida não encontrada")]
    UnitNotFound,

    #[error("Produto não encontrado")]
    ProductNotFound,

    #[error("Pedido não encontrado")]
    OrderNotFound,

    #[error("Unidade em uso")]
    UnitInUse,

    #[error("Referência circular de unidade-base")]
    CircularBaseUnit,

    #[error("Fator de conversão inválido na unidade '{0}'")]
    InvalidConversionFactor(String),

    #[error("Unidades '{from}' e '{to}' não compartilham a mesma unidade-base")]
    IncompatibleUnits { from: String, to: String },

    #[error("Transição de status inválida: {from:?} -> {to:?}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Estoque insuficiente")]
    InsufficientStock(Vec<StockShortfall>),

    #[error("Total do pedido fora do intervalo suportado")]
    OrderTotalOutOfRange,

    #[error("SKU já existe")]
    SkuAlreadyExists,

    #[error("Cabeçalho inválido: {0}")]
    BadRequestHeader(String),

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado.
    // `anyhow::Error` é ótimo para capturar o contexto do erro.
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            // Erros com payload estruturado, para o caller poder ramificar.
            AppError::InvalidStatusTransition { from, to } => {
                let body = Json(json!({
                    "error": format!(
                        "Transição de status inválida: '{}' não pode ir para '{}'.",
                        from.as_str(),
                        to.as_str()
                    ),
                    "currentStatus": from,
                    "targetStatus": to,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::InsufficientStock(shortfalls) => {
                let body = Json(json!({
                    "error": "Estoque insuficiente para um ou mais itens do pedido.",
                    "shortfalls": shortfalls,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }

            AppError::EmailAlreadyExists => (StatusCode::CONFLICT, "Este e-mail já está em uso."),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "E-mail ou senha inválidos."),
            AppError::AccountLocked => (
                StatusCode::UNAUTHORIZED,
                "Conta bloqueada por excesso de tentativas. Tente novamente mais tarde.",
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "Token de autenticação inválido ou ausente.",
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "Você não tem permissão para realizar esta ação.",
            ),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "Usuário não encontrado."),
            AppError::StoreNotFound => (StatusCode::NOT_FOUND, "Loja não encontrada."),
            AppError::UnitNotFound => (StatusCode::NOT_FOUND, "Unidade de medida não encontrada."),
            AppError::ProductNotFound => (StatusCode::NOT_FOUND, "Produto não encontrado."),
            AppError::OrderNotFound => (StatusCode::NOT_FOUND, "Pedido não encontrado."),
            AppError::UnitInUse => (
                StatusCode::CONFLICT,
                "A unidade está em uso por produtos ou por outra unidade e não pode ser removida.",
            ),
            AppError::CircularBaseUnit => (
                StatusCode::BAD_REQUEST,
                "A unidade-base escolhida criaria uma referência circular.",
            ),
            AppError::InvalidConversionFactor(_) => (
                StatusCode::BAD_REQUEST,
                "A unidade possui um fator de conversão inválido.",
            ),
            AppError::IncompatibleUnits { .. } => (
                StatusCode::BAD_REQUEST,
                "As unidades não compartilham a mesma unidade-base.",
            ),
            AppError::OrderTotalOutOfRange => (
                StatusCode::BAD_REQUEST,
                "As quantidades do pedido excedem o limite suportado.",
            ),
            AppError::SkuAlreadyExists => (StatusCode::CONFLICT, "Este SKU já está em uso."),
            AppError::BadRequestHeader(ref msg) => {
                let body = Json(json!({ "error": msg }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::UniqueConstraintViolation(ref msg) => {
                let body = Json(json!({ "error": msg }));
                return (StatusCode::CONFLICT, body).into_response();
            }

            // Todos os outros erros (DatabaseError, InternalServerError) viram 500.
            // O `tracing` loga a mensagem detalhada; o cliente recebe algo genérico.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Ocorreu um erro inesperado.",
                )
            }
        };

        // Resposta padrão para erros simples que só têm uma mensagem.
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
