// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{Claims, User, UserRole, UserStatus},
};

/// Tentativas consecutivas antes do bloqueio temporário.
const MAX_FAILED_LOGINS: i32 = 5;
const LOCKOUT_MINUTES: i64 = 15;

/// Política de bloqueio: devolve o novo contador e, se estourou o limite,
/// até quando a conta fica travada.
fn next_lockout(failed_attempts: i32, now: DateTime<Utc>) -> (i32, Option<DateTime<Utc>>) {
    let attempts = failed_attempts + 1;
    if attempts >= MAX_FAILED_LOGINS {
        (attempts, Some(now + Duration::minutes(LOCKOUT_MINUTES)))
    } else {
        (attempts, None)
    }
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt_secret: String,
    pool: PgPool,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt_secret: String, pool: PgPool) -> Self {
        Self {
            user_repo,
            jwt_secret,
            pool,
        }
    }

    /// Cria a empresa (tenant) e o usuário dono dela numa única transação.
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        company_name: &str,
    ) -> Result<String, AppError> {
        // 1. Hashing fora da transação (e fora do runtime async)
        let password_clone = password.to_owned();
        let hashed_password =
            tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        let mut tx = self.pool.begin().await?;

        // 2. Cria o tenant
        let tenant_id: Uuid =
            sqlx::query_scalar("INSERT INTO tenants (name) VALUES ($1) RETURNING id")
                .bind(company_name)
                .fetch_one(&mut *tx)
                .await?;

        // 3. Cria o dono. Se falhar, o tenant é desfeito junto (rollback).
        let new_user = self
            .user_repo
            .create_user(&mut *tx, tenant_id, email, &hashed_password, UserRole::Owner)
            .await?;

        tx.commit().await?;

        self.create_token(new_user.id)
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        // Conta desativada se comporta como credencial inválida (não vaza estado)
        if user.status == UserStatus::Inactive {
            return Err(AppError::InvalidCredentials);
        }

        let now = Utc::now();
        if let Some(locked_until) = user.locked_until {
            if locked_until > now {
                return Err(AppError::AccountLocked);
            }
        }

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid =
            tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            let (attempts, locked_until) = next_lockout(user.failed_login_attempts, now);
            self.user_repo
                .record_login_failure(user.id, attempts, locked_until)
                .await?;
            if locked_until.is_some() {
                tracing::warn!("🔒 Conta {} bloqueada por excesso de tentativas.", user.id);
            }
            return Err(AppError::InvalidCredentials);
        }

        // Sucesso zera o contador e o bloqueio
        self.user_repo.reset_login_state(user.id).await?;
        self.create_token(user.id)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let validation = Validation::default();
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|_| AppError::InvalidToken)?;

        self.user_repo
            .find_by_id(token_data.claims.sub)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    fn create_token(&self, user_id: Uuid) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + Duration::days(7);

        let claims = Claims {
            sub: user_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bloqueia_na_quinta_tentativa() {
        let now = Utc::now();
        // 4 falhas anteriores: a quinta trava
        let (attempts, locked) = next_lockout(4, now);
        assert_eq!(attempts, 5);
        let until = locked.expect("quinta falha deveria bloquear");
        assert!(until > now);

        // Abaixo do limite só incrementa
        let (attempts, locked) = next_lockout(2, now);
        assert_eq!(attempts, 3);
        assert!(locked.is_none());
    }
}
