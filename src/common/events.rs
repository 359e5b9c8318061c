// src/common/events.rs

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::auth::UserRole;

/// Eventos de domínio disparados pelos repositórios quando algo que afeta
/// a resolução de permissões muda. O cache de permissões assina este canal
/// e traduz cada evento em invalidação (ver services/permission_service.rs).
#[derive(Debug, Clone)]
pub enum PermissionEvent {
    /// Cargo ou permissões customizadas de um usuário mudaram.
    UserChanged { user_id: Uuid },
    /// Vínculo usuário <-> loja criado, alterado ou removido.
    AssignmentChanged { user_id: Uuid, store_id: Uuid },
    /// Uma loja foi removida ou teve overrides alterados em massa.
    StoreChanged { store_id: Uuid },
    /// Algo mudou no tenant inteiro (ex.: remoção em cascata).
    TenantChanged { tenant_id: Uuid },
    /// O conjunto-padrão de permissões de um cargo mudou.
    RoleChanged { role: UserRole },
}

/// Publicador compartilhado pelos repositórios.
#[derive(Clone)]
pub struct PermissionEvents {
    sender: broadcast::Sender<PermissionEvent>,
}

impl PermissionEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publica sem bloquear. Se ninguém estiver ouvindo, o evento é descartado.
    pub fn publish(&self, event: PermissionEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::debug!("Evento de permissão sem assinantes: {:?}", e.0);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PermissionEvent> {
        self.sender.subscribe()
    }
}
