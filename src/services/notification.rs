// src/services/notification.rs

use async_trait::async_trait;

use crate::models::orders::{OnlineOrder, OrderStatus};

/// Colaborador externo: envia e-mails de notificação de pedido.
/// O envio é fire-and-forget — falha aqui NUNCA desfaz uma transição já
/// commitada (ver order_service).
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    async fn order_status_changed(
        &self,
        order: &OnlineOrder,
        previous_status: OrderStatus,
    ) -> anyhow::Result<()>;

    async fn order_placed(&self, order: &OnlineOrder) -> anyhow::Result<()>;
}

/// Implementação de desenvolvimento: só registra no log.
pub struct LogEmailNotifier;

#[async_trait]
impl EmailNotifier for LogEmailNotifier {
    async fn order_status_changed(
        &self,
        order: &OnlineOrder,
        previous_status: OrderStatus,
    ) -> anyhow::Result<()> {
        tracing::info!(
            "📧 [{}] Pedido {}: {} -> {}",
            order.customer_email,
            order.id,
            previous_status.as_str(),
            order.status.as_str()
        );
        Ok(())
    }

    async fn order_placed(&self, order: &OnlineOrder) -> anyhow::Result<()> {
        tracing::info!(
            "📧 [{}] Pedido {} recebido (total {}).",
            order.customer_email,
            order.id,
            order.total
        );
        Ok(())
    }
}
