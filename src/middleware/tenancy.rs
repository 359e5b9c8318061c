// src/middleware/tenancy.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::common::error::AppError;

// Cabeçalhos HTTP customizados de escopo
const TENANT_ID_HEADER: &str = "x-tenant-id";
const STORE_ID_HEADER: &str = "x-store-id";

fn parse_uuid_header(parts: &Parts, header: &str) -> Result<Option<Uuid>, AppError> {
    match parts.headers.get(header) {
        None => Ok(None),
        Some(value) => {
            let value_str = value.to_str().map_err(|_| {
                AppError::BadRequestHeader(format!(
                    "Cabeçalho {} contém caracteres inválidos.",
                    header
                ))
            })?;
            let id = Uuid::parse_str(value_str).map_err(|_| {
                AppError::BadRequestHeader(format!(
                    "Cabeçalho {} inválido (não é um UUID).",
                    header
                ))
            })?;
            Ok(Some(id))
        }
    }
}

// O extrator de tenant: armazena o UUID do tenant que o usuário quer acessar.
// Obrigatório em toda rota escopada.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub Uuid);

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_uuid_header(parts, TENANT_ID_HEADER)?
            .map(TenantContext)
            .ok_or_else(|| {
                AppError::BadRequestHeader(format!(
                    "O cabeçalho {} é obrigatório.",
                    TENANT_ID_HEADER
                ))
            })
    }
}

// Escopo de loja OPCIONAL (checagens de permissão aceitam escopo global).
#[derive(Debug, Clone, Copy)]
pub struct StoreScope(pub Option<Uuid>);

impl<S> FromRequestParts<S> for StoreScope
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(StoreScope(parse_uuid_header(parts, STORE_ID_HEADER)?))
    }
}

// Escopo de loja OBRIGATÓRIO (produtos e vitrine online).
#[derive(Debug, Clone, Copy)]
pub struct StoreContext(pub Uuid);

impl<S> FromRequestParts<S> for StoreContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_uuid_header(parts, STORE_ID_HEADER)?
            .map(StoreContext)
            .ok_or_else(|| {
                AppError::BadRequestHeader(format!(
                    "O cabeçalho {} é obrigatório.",
                    STORE_ID_HEADER
                ))
            })
    }
}
