// src/services/permission_service.rs

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use sqlx::PgConnection;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    common::{error::AppError, events::PermissionEvent},
    db::{RbacRepository, UserRepository},
    models::{
        auth::{UserRole, UserStatus},
        rbac::{MODULES, PermissionAction, PermissionDecision, PermissionMap, PermissionQuery},
    },
};

// ---
// Tabela padrão de permissões por cargo
// ---

fn full_access() -> PermissionMap {
    MODULES
        .iter()
        .map(|m| (m.to_string(), PermissionAction::ALL.into_iter().collect()))
        .collect()
}

fn grant(map: &mut PermissionMap, module: &str, actions: &[PermissionAction]) {
    map.insert(module.to_string(), actions.iter().copied().collect());
}

/// Permissões-padrão de cada cargo. 'Owner' nem consulta esta tabela (bypass
/// total); 'Custom' parte de vazio e depende do mapa customizado do usuário.
pub fn role_default_permissions(role: UserRole) -> PermissionMap {
    use PermissionAction::*;

    let mut map = PermissionMap::new();
    match role {
        UserRole::Owner | UserRole::Admin => return full_access(),
        UserRole::CompanyManager => {
            map = full_access();
            // Gestão de usuários fica restrita a leitura
            grant(&mut map, "users", &[View]);
            grant(&mut map, "settings", &[View, Edit]);
        }
        UserRole::StoreManager => {
            grant(&mut map, "dashboard", &[View]);
            grant(&mut map, "products", &[View, Add, Edit]);
            grant(&mut map, "inventory", &[View, Add, Edit]);
            grant(&mut map, "sales", &[View, Add, Edit, Delete]);
            grant(&mut map, "purchases", &[View, Add]);
            grant(&mut map, "customers", &[View, Add, Edit]);
            grant(&mut map, "suppliers", &[View]);
            grant(&mut map, "debts", &[View, Add, Edit]);
            grant(&mut map, "shifts", &[View, Add, Edit]);
            grant(&mut map, "reports", &[View]);
            grant(&mut map, "online_store", &[View, Edit]);
        }
        UserRole::Salesperson => {
            grant(&mut map, "dashboard", &[View]);
            grant(&mut map, "products", &[View]);
            grant(&mut map, "sales", &[View, Add]);
            grant(&mut map, "customers", &[View, Add]);
            grant(&mut map, "shifts", &[View, Add]);
            grant(&mut map, "online_store", &[View]);
        }
        UserRole::Accountant => {
            grant(&mut map, "dashboard", &[View]);
            grant(&mut map, "sales", &[View]);
            grant(&mut map, "purchases", &[View]);
            grant(&mut map, "debts", &[View, Add, Edit]);
            grant(&mut map, "reports", &[View]);
            grant(&mut map, "shifts", &[View]);
        }
        UserRole::InventoryManager => {
            grant(&mut map, "dashboard", &[View]);
            grant(&mut map, "products", &[View, Add, Edit, Delete]);
            grant(&mut map, "inventory", &[View, Add, Edit, Delete]);
            grant(&mut map, "purchases", &[View, Add, Edit]);
            grant(&mut map, "suppliers", &[View, Add, Edit]);
            grant(&mut map, "reports", &[View]);
        }
        UserRole::Custom => {}
    }
    map
}

fn map_allows(map: &PermissionMap, module: &str, action: PermissionAction) -> bool {
    map.get(module).is_some_and(|actions| actions.contains(&action))
}

/// Resolução em camadas: override da loja (exclusivo para o módulo, quando o
/// mapa da loja existe) > mapa customizado do usuário > padrão do cargo.
/// 'Owner' ignora tudo e é sempre permitido.
pub fn resolve_decision(
    role: UserRole,
    custom: Option<&PermissionMap>,
    store_override: Option<&PermissionMap>,
    module: &str,
    action: PermissionAction,
) -> PermissionDecision {
    if role == UserRole::Owner {
        return PermissionDecision::allow();
    }

    let allowed = if let Some(store_map) = store_override {
        // Substituição total, sem fallback para as camadas de baixo.
        map_allows(store_map, module, action)
    } else if let Some(custom_map) = custom {
        map_allows(custom_map, module, action)
    } else {
        map_allows(&role_default_permissions(role), module, action)
    };

    if allowed {
        PermissionDecision::allow()
    } else {
        PermissionDecision::deny()
    }
}

// ---
// Cache de decisões (in-process, com TTL)
// ---

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    user_id: Uuid,
    tenant_id: Uuid,
    store_id: Option<Uuid>,
    module: String,
    action: PermissionAction,
}

struct CacheEntry {
    decision: PermissionDecision,
    // Cargo efetivo no momento da resolução, para invalidação por cargo.
    role: UserRole,
    expires_at: Instant,
}

/// Cache in-process de decisões de permissão. Não é distribuído: cada
/// instância do servidor tem o seu, mantido coerente pelos eventos de
/// domínio publicados pelos repositórios (ver `listen`).
#[derive(Clone)]
pub struct PermissionCache {
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    ttl: Duration,
}

impl PermissionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    fn get(&self, key: &CacheKey) -> Option<PermissionDecision> {
        let entries = self.entries.read().expect("cache de permissões envenenado");
        entries.get(key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.decision.clone())
            } else {
                None
            }
        })
    }

    fn insert(&self, key: CacheKey, decision: PermissionDecision, role: UserRole) {
        let mut entries = self.entries.write().expect("cache de permissões envenenado");
        entries.insert(
            key,
            CacheEntry {
                decision,
                role,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn invalidate_user(&self, user_id: Uuid) {
        self.retain(|key, _| key.user_id != user_id);
    }

    pub fn invalidate_tenant(&self, tenant_id: Uuid) {
        self.retain(|key, _| key.tenant_id != tenant_id);
    }

    pub fn invalidate_store(&self, store_id: Uuid) {
        self.retain(|key, _| key.store_id != Some(store_id));
    }

    pub fn invalidate_role(&self, role: UserRole) {
        self.retain(|_, entry| entry.role != role);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().expect("cache de permissões envenenado");
        entries.clear();
    }

    fn retain(&self, keep: impl Fn(&CacheKey, &CacheEntry) -> bool) {
        let mut entries = self.entries.write().expect("cache de permissões envenenado");
        entries.retain(|k, v| keep(k, v));
    }

    /// Assina o canal de eventos e traduz cada evento em invalidação.
    /// Os repositórios não conhecem o cache; só publicam o que mudou.
    pub async fn listen(self, mut rx: broadcast::Receiver<PermissionEvent>) {
        loop {
            match rx.recv().await {
                Ok(event) => self.apply(event),
                // Perdemos eventos por atraso: invalida tudo por segurança.
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Cache de permissões perdeu {} eventos; limpando tudo.",
                        skipped
                    );
                    self.clear();
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    fn apply(&self, event: PermissionEvent) {
        match event {
            PermissionEvent::UserChanged { user_id } => self.invalidate_user(user_id),
            PermissionEvent::AssignmentChanged { user_id, .. } => self.invalidate_user(user_id),
            PermissionEvent::StoreChanged { store_id } => self.invalidate_store(store_id),
            PermissionEvent::TenantChanged { tenant_id } => self.invalidate_tenant(tenant_id),
            PermissionEvent::RoleChanged { role } => self.invalidate_role(role),
        }
    }
}

// ---
// O avaliador
// ---

#[derive(Clone)]
pub struct PermissionService {
    user_repo: UserRepository,
    rbac_repo: RbacRepository,
    cache: PermissionCache,
}

impl PermissionService {
    pub fn new(
        user_repo: UserRepository,
        rbac_repo: RbacRepository,
        cache: PermissionCache,
    ) -> Self {
        Self {
            user_repo,
            rbac_repo,
            cache,
        }
    }

    /// Avalia (módulo, ação) para um usuário, opcionalmente no escopo de uma
    /// loja. Negação comum NÃO é erro; usuário inexistente no tenant é
    /// `UserNotFound`.
    pub async fn check_permission(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        user_id: Uuid,
        module: &str,
        action: PermissionAction,
        store_id: Option<Uuid>,
    ) -> Result<PermissionDecision, AppError> {
        let key = CacheKey {
            user_id,
            tenant_id,
            store_id,
            module: module.to_string(),
            action,
        };
        if let Some(decision) = self.cache.get(&key) {
            return Ok(decision);
        }

        let user = self
            .user_repo
            .find_in_tenant(&mut *conn, tenant_id, user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        // Usuário desativado não tem permissão nenhuma.
        if user.status == UserStatus::Inactive {
            let decision = PermissionDecision::deny();
            self.cache.insert(key, decision.clone(), user.role);
            return Ok(decision);
        }

        let assignment = match store_id {
            Some(store) => self.rbac_repo.get_assignment(&mut *conn, user_id, store).await?,
            None => None,
        };

        let effective_role = assignment
            .as_ref()
            .and_then(|a| a.role_override)
            .unwrap_or(user.role);
        let store_override = assignment.as_ref().and_then(|a| a.permissions.as_deref());
        let custom = user.custom_permissions.as_deref();

        let decision = resolve_decision(effective_role, custom, store_override, module, action);
        self.cache.insert(key, decision.clone(), effective_role);
        Ok(decision)
    }

    /// Avalia um lote de pares contra o mesmo contexto. A chave do resultado
    /// é "module:action:scope", onde scope é o id da loja ou "global".
    pub async fn check_multiple_permissions(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        user_id: Uuid,
        queries: &[PermissionQuery],
    ) -> Result<HashMap<String, PermissionDecision>, AppError> {
        let user = self
            .user_repo
            .find_in_tenant(&mut *conn, tenant_id, user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        // Resolve cada vínculo de loja uma única vez.
        let store_ids: HashSet<Uuid> = queries.iter().filter_map(|q| q.store_id).collect();
        let mut assignments = HashMap::new();
        for store in store_ids {
            let assignment = self.rbac_repo.get_assignment(&mut *conn, user_id, store).await?;
            assignments.insert(store, assignment);
        }

        let mut results = HashMap::with_capacity(queries.len());
        for query in queries {
            let scope = query
                .store_id
                .map(|s| s.to_string())
                .unwrap_or_else(|| "global".to_string());
            let result_key = format!("{}:{}:{}", query.module, query.action.as_str(), scope);

            let decision = if user.status == UserStatus::Inactive {
                PermissionDecision::deny()
            } else {
                let assignment = query.store_id.and_then(|s| assignments.get(&s)).and_then(|a| a.as_ref());
                let effective_role = assignment
                    .and_then(|a| a.role_override)
                    .unwrap_or(user.role);
                let store_override = assignment.and_then(|a| a.permissions.as_deref());
                resolve_decision(
                    effective_role,
                    user.custom_permissions.as_deref(),
                    store_override,
                    &query.module,
                    query.action,
                )
            };
            results.insert(result_key, decision);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rbac::PERMISSION_DENIED_CODE;

    fn map_of(module: &str, actions: &[PermissionAction]) -> PermissionMap {
        let mut map = PermissionMap::new();
        grant(&mut map, module, actions);
        map
    }

    #[test]
    fn owner_e_sempre_permitido() {
        for module in MODULES {
            for action in PermissionAction::ALL {
                let d = resolve_decision(UserRole::Owner, None, None, module, action);
                assert!(d.allowed, "owner negado em {}:{:?}", module, action);
                assert!(d.error_code.is_none());
            }
        }
    }

    #[test]
    fn owner_ignora_overrides_restritivos() {
        let vazio = PermissionMap::new();
        let d = resolve_decision(
            UserRole::Owner,
            Some(&vazio),
            Some(&vazio),
            "settings",
            PermissionAction::Delete,
        );
        assert!(d.allowed);
    }

    #[test]
    fn negacao_carrega_o_codigo_fixo() {
        let d = resolve_decision(
            UserRole::Salesperson,
            None,
            None,
            "settings",
            PermissionAction::Delete,
        );
        assert!(!d.allowed);
        assert_eq!(d.error_code, Some(PERMISSION_DENIED_CODE));
    }

    #[test]
    fn padrao_do_cargo_e_usado_sem_overrides() {
        let d = resolve_decision(
            UserRole::Salesperson,
            None,
            None,
            "sales",
            PermissionAction::Add,
        );
        assert!(d.allowed);
    }

    #[test]
    fn mapa_customizado_substitui_o_padrao_do_cargo() {
        // O cargo permitiria sales:add, mas o mapa customizado não o inclui.
        let custom = map_of("reports", &[PermissionAction::View]);
        let d = resolve_decision(
            UserRole::Salesperson,
            Some(&custom),
            None,
            "sales",
            PermissionAction::Add,
        );
        assert!(!d.allowed);

        let d = resolve_decision(
            UserRole::Salesperson,
            Some(&custom),
            None,
            "reports",
            PermissionAction::View,
        );
        assert!(d.allowed);
    }

    #[test]
    fn override_de_loja_substitui_sem_mesclar() {
        // Custom permite inventory:edit; o override da loja só dá view.
        let custom = map_of("inventory", &[PermissionAction::View, PermissionAction::Edit]);
        let store = map_of("inventory", &[PermissionAction::View]);

        let d = resolve_decision(
            UserRole::StoreManager,
            Some(&custom),
            Some(&store),
            "inventory",
            PermissionAction::Edit,
        );
        assert!(!d.allowed, "override da loja deveria substituir, não mesclar");

        let d = resolve_decision(
            UserRole::StoreManager,
            Some(&custom),
            Some(&store),
            "inventory",
            PermissionAction::View,
        );
        assert!(d.allowed);
    }

    #[test]
    fn override_de_loja_vazio_nega_tudo_no_modulo() {
        // Mapa presente mas sem o módulo: sem fallback para as outras camadas.
        let store = map_of("sales", &[PermissionAction::View]);
        let d = resolve_decision(
            UserRole::StoreManager,
            None,
            Some(&store),
            "inventory",
            PermissionAction::View,
        );
        assert!(!d.allowed);
    }

    #[test]
    fn dados_malformados_viram_sem_permissao() {
        // Mapa vazio (o que um JSON corrompido resolve ao desserializar)
        let vazio = PermissionMap::new();
        let d = resolve_decision(
            UserRole::Custom,
            Some(&vazio),
            None,
            "sales",
            PermissionAction::View,
        );
        assert!(!d.allowed);
    }

    // --- Cache ---

    fn key(user: Uuid, store: Option<Uuid>) -> CacheKey {
        CacheKey {
            user_id: user,
            tenant_id: Uuid::nil(),
            store_id: store,
            module: "sales".into(),
            action: PermissionAction::View,
        }
    }

    #[test]
    fn cache_expira_pelo_ttl() {
        let cache = PermissionCache::new(Duration::from_millis(10));
        let k = key(Uuid::new_v4(), None);
        cache.insert(k.clone(), PermissionDecision::allow(), UserRole::Admin);
        assert!(cache.get(&k).is_some());

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&k).is_none());
    }

    #[test]
    fn invalidacao_por_usuario_e_loja() {
        let cache = PermissionCache::new(Duration::from_secs(60));
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let store = Uuid::new_v4();

        cache.insert(key(user_a, None), PermissionDecision::allow(), UserRole::Admin);
        cache.insert(key(user_b, Some(store)), PermissionDecision::deny(), UserRole::Salesperson);

        cache.invalidate_user(user_a);
        assert!(cache.get(&key(user_a, None)).is_none());
        assert!(cache.get(&key(user_b, Some(store))).is_some());

        cache.invalidate_store(store);
        assert!(cache.get(&key(user_b, Some(store))).is_none());
    }

    #[test]
    fn invalidacao_por_cargo() {
        let cache = PermissionCache::new(Duration::from_secs(60));
        let k1 = key(Uuid::new_v4(), None);
        let k2 = key(Uuid::new_v4(), None);
        cache.insert(k1.clone(), PermissionDecision::allow(), UserRole::Salesperson);
        cache.insert(k2.clone(), PermissionDecision::allow(), UserRole::Accountant);

        cache.invalidate_role(UserRole::Salesperson);
        assert!(cache.get(&k1).is_none());
        assert!(cache.get(&k2).is_some());
    }

    #[tokio::test]
    async fn eventos_invalidam_via_canal() {
        use crate::common::events::PermissionEvents;

        let cache = PermissionCache::new(Duration::from_secs(60));
        let events = PermissionEvents::new(16);
        let listener = tokio::spawn(cache.clone().listen(events.subscribe()));

        let user = Uuid::new_v4();
        cache.insert(key(user, None), PermissionDecision::allow(), UserRole::Admin);

        events.publish(PermissionEvent::UserChanged { user_id: user });
        // Dá uma folga para a task do listener processar.
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get(&key(user, None)).is_none());
        listener.abort();
    }
}
