// src/services/order_service.rs

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use sqlx::{Acquire, PgConnection};
use uuid::Uuid;

use crate::{
    common::error::{AppError, StockShortfall},
    db::{InventoryRepository, OrderRepository},
    models::{
        inventory::Product,
        orders::{OnlineOrder, OnlineOrderItem, OrderDetail, OrderStatus},
    },
    services::notification::EmailNotifier,
};

/// Um item do carrinho no checkout.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: Decimal,
}

/// Dados do cliente/entrega capturados no checkout.
#[derive(Debug, Clone)]
pub struct CheckoutInfo {
    pub payment_method: String,
    pub customer_name: String,
    pub customer_email: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal_code: Option<String>,
}

/// Compara o pedido com o saldo disponível e lista TODOS os produtos que
/// faltam. Linhas repetidas do mesmo produto contam JUNTAS contra o saldo —
/// senão duas linhas individualmente cobertas baixariam mais do que existe.
/// A transição só acontece se esta lista voltar vazia — nunca há baixa
/// parcial.
pub fn compute_shortfalls(
    items: &[OnlineOrderItem],
    products: &HashMap<Uuid, Product>,
) -> Vec<StockShortfall> {
    // Agrega por produto preservando a ordem das linhas.
    let mut requested: Vec<(Uuid, String, Decimal)> = Vec::new();
    for item in items {
        match requested.iter_mut().find(|(id, _, _)| *id == item.product_id) {
            Some((_, _, total)) => *total += item.quantity,
            None => requested.push((item.product_id, item.product_name.clone(), item.quantity)),
        }
    }

    let mut shortfalls = Vec::new();
    for (product_id, product_name, quantity) in requested {
        let available = products
            .get(&product_id)
            .map(|p| p.stock_quantity)
            .unwrap_or(Decimal::ZERO);
        if available < quantity {
            shortfalls.push(StockShortfall {
                product_name,
                available,
                requested: quantity,
            });
        }
    }
    shortfalls
}

/// Soma uma linha ao total do pedido com aritmética checada: quantidade vem
/// do cliente, e estourar `Decimal` seria um panic no meio do handler.
fn add_line_total(total: Decimal, price: Decimal, quantity: Decimal) -> Result<Decimal, AppError> {
    price
        .checked_mul(quantity)
        .and_then(|line| total.checked_add(line))
        .ok_or(AppError::OrderTotalOutOfRange)
}

#[derive(Clone)]
pub struct OrderService {
    order_repo: OrderRepository,
    inventory_repo: InventoryRepository,
    notifier: Arc<dyn EmailNotifier>,
}

impl OrderService {
    pub fn new(
        order_repo: OrderRepository,
        inventory_repo: InventoryRepository,
        notifier: Arc<dyn EmailNotifier>,
    ) -> Self {
        Self {
            order_repo,
            inventory_repo,
            notifier,
        }
    }

    // --- CHECKOUT ---
    // Cria o pedido (status pending) a partir do snapshot do carrinho.
    // Nome e preço de cada produto são congelados aqui; o total é calculado
    // no servidor. A baixa de estoque só acontece na confirmação.
    pub async fn create_order(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
        lines: &[CartLine],
        info: CheckoutInfo,
    ) -> Result<OrderDetail, AppError> {
        let mut tx = conn.begin().await?;

        // 1. Resolve os produtos e calcula o total
        let mut resolved = Vec::with_capacity(lines.len());
        let mut total = Decimal::ZERO;
        for line in lines {
            let product = self
                .inventory_repo
                .get_product(&mut *tx, tenant_id, line.product_id)
                .await?
                .ok_or(AppError::ProductNotFound)?;
            if product.store_id != store_id {
                return Err(AppError::ProductNotFound);
            }
            total = add_line_total(total, product.price, line.quantity)?;
            resolved.push((product, line.quantity));
        }

        // 2. Grava o cabeçalho
        let order = self
            .order_repo
            .create_order(
                &mut *tx,
                tenant_id,
                store_id,
                &info.payment_method,
                &info.customer_name,
                &info.customer_email,
                &info.shipping_address,
                &info.shipping_city,
                info.shipping_postal_code.as_deref(),
                total,
            )
            .await?;

        // 3. Grava os itens (snapshot de nome/preço)
        let mut items = Vec::with_capacity(resolved.len());
        for (product, quantity) in resolved {
            let item = self
                .order_repo
                .insert_order_item(
                    &mut *tx,
                    tenant_id,
                    order.id,
                    product.id,
                    &product.name,
                    quantity,
                    product.price,
                )
                .await?;
            items.push(item);
        }

        tx.commit().await?;

        // 4. Notificação fora da transação, fire-and-forget
        let notifier = Arc::clone(&self.notifier);
        let order_for_mail = order.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.order_placed(&order_for_mail).await {
                tracing::warn!("Falha ao notificar novo pedido {}: {}", order_for_mail.id, e);
            }
        });

        Ok(OrderDetail { order, items })
    }

    // --- TRANSIÇÃO DE STATUS ---
    // Valida contra a tabela fixa e, quando o novo status mexe em estoque,
    // faz a baixa (ou devolução, no cancelamento) na MESMA transação que
    // grava o status. As linhas de pedido e de produto ficam travadas
    // (FOR UPDATE) até o commit.
    pub async fn transition_status(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
        order_id: Uuid,
        target: OrderStatus,
    ) -> Result<OnlineOrder, AppError> {
        let mut tx = conn.begin().await?;

        // 1. Trava o pedido no escopo da loja online
        let order = self
            .order_repo
            .get_order_for_update(&mut *tx, tenant_id, store_id, order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;

        // 2. Tabela de transições
        if !order.status.can_transition_to(target) {
            return Err(AppError::InvalidStatusTransition {
                from: order.status,
                to: target,
            });
        }

        // 3. Efeito no estoque
        if target.deducts_stock_on_entry() {
            self.deduct_stock(&mut tx, tenant_id, order_id).await?;
        } else if target == OrderStatus::Cancelled && order.status.has_deducted_stock() {
            self.restore_stock(&mut tx, tenant_id, order_id).await?;
        }

        // 4. Grava o novo status e fecha a transação
        let updated = self
            .order_repo
            .update_status(&mut *tx, tenant_id, order_id, target)
            .await?;
        tx.commit().await?;

        // 5. E-mail fora da transação; falha só vira log.
        let notifier = Arc::clone(&self.notifier);
        let previous = order.status;
        let order_for_mail = updated.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .order_status_changed(&order_for_mail, previous)
                .await
            {
                tracing::warn!(
                    "Falha ao notificar transição do pedido {}: {}",
                    order_for_mail.id,
                    e
                );
            }
        });

        Ok(updated)
    }

    /// Baixa o estoque de todos os itens, ou de nenhum. Os produtos são
    /// travados em ordem estável de id para evitar deadlock entre transições
    /// concorrentes.
    async fn deduct_stock(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), AppError> {
        let items = self
            .order_repo
            .list_order_items(&mut **tx, tenant_id, order_id)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products = self
            .inventory_repo
            .get_products_for_update(&mut **tx, tenant_id, &product_ids)
            .await?;
        let by_id: HashMap<Uuid, Product> = products.into_iter().map(|p| (p.id, p)).collect();

        // Primeiro valida tudo; qualquer falta aborta a transição inteira.
        let shortfalls = compute_shortfalls(&items, &by_id);
        if !shortfalls.is_empty() {
            return Err(AppError::InsufficientStock(shortfalls));
        }

        for item in &items {
            self.inventory_repo
                .adjust_stock(&mut **tx, tenant_id, item.product_id, -item.quantity)
                .await?;
        }
        Ok(())
    }

    /// Devolve exatamente as quantidades baixadas na confirmação.
    async fn restore_stock(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), AppError> {
        let items = self
            .order_repo
            .list_order_items(&mut **tx, tenant_id, order_id)
            .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        self.inventory_repo
            .get_products_for_update(&mut **tx, tenant_id, &product_ids)
            .await?;

        for item in &items {
            self.inventory_repo
                .adjust_stock(&mut **tx, tenant_id, item.product_id, item.quantity)
                .await?;
        }
        Ok(())
    }

    pub async fn get_order_detail(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
        order_id: Uuid,
    ) -> Result<OrderDetail, AppError> {
        let order = self
            .order_repo
            .get_order(&mut *conn, tenant_id, store_id, order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;
        let items = self
            .order_repo
            .list_order_items(&mut *conn, tenant_id, order_id)
            .await?;
        Ok(OrderDetail { order, items })
    }

    pub async fn list_orders(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        store_id: Uuid,
    ) -> Result<Vec<OnlineOrder>, AppError> {
        self.order_repo.list_orders(&mut *conn, tenant_id, store_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::prelude::FromPrimitive;

    fn product(name: &str, stock: f64) -> Product {
        Product {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            store_id: Uuid::nil(),
            unit_id: Uuid::nil(),
            sku: name.to_uppercase(),
            name: name.to_string(),
            price: Decimal::from_f64(10.0).unwrap(),
            stock_quantity: Decimal::from_f64(stock).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(product: &Product, qty: f64) -> OnlineOrderItem {
        OnlineOrderItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            order_id: Uuid::nil(),
            product_id: product.id,
            product_name: product.name.clone(),
            quantity: Decimal::from_f64(qty).unwrap(),
            unit_price: product.price,
        }
    }

    #[test]
    fn sem_faltas_quando_ha_saldo() {
        let a = product("caneta", 10.0);
        let b = product("caderno", 5.0);
        let items = vec![item(&a, 3.0), item(&b, 5.0)];
        let by_id = HashMap::from([(a.id, a), (b.id, b)]);

        assert!(compute_shortfalls(&items, &by_id).is_empty());
    }

    #[test]
    fn lista_todas_as_faltas_de_uma_vez() {
        // Cenário do exemplo: A pede 3 (tem 10), B pede 2 (tem 1).
        // Só B falta, mas a transição inteira aborta — nada é baixado.
        let a = product("produto-a", 10.0);
        let b = product("produto-b", 1.0);
        let items = vec![item(&a, 3.0), item(&b, 2.0)];
        let by_id = HashMap::from([(a.id, a), (b.id, b.clone())]);

        let shortfalls = compute_shortfalls(&items, &by_id);
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].product_name, "produto-b");
        assert_eq!(shortfalls[0].available, Decimal::from_f64(1.0).unwrap());
        assert_eq!(shortfalls[0].requested, Decimal::from_f64(2.0).unwrap());
    }

    #[test]
    fn produto_inexistente_conta_como_saldo_zero() {
        let a = product("fantasma", 100.0);
        let items = vec![item(&a, 1.0)];
        // Mapa vazio: o produto sumiu entre o checkout e a confirmação.
        let by_id = HashMap::new();

        let shortfalls = compute_shortfalls(&items, &by_id);
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].available, Decimal::ZERO);
    }

    #[test]
    fn saldo_exato_nao_e_falta() {
        let a = product("exato", 2.0);
        let items = vec![item(&a, 2.0)];
        let by_id = HashMap::from([(a.id, a)]);
        assert!(compute_shortfalls(&items, &by_id).is_empty());
    }

    #[test]
    fn linhas_duplicadas_do_mesmo_produto_contam_juntas() {
        // Saldo 5, duas linhas de 3 do mesmo produto: cada linha isolada
        // caberia, mas a soma (6) não — a baixa deixaria o saldo negativo.
        let a = product("repetido", 5.0);
        let items = vec![item(&a, 3.0), item(&a, 3.0)];
        let by_id = HashMap::from([(a.id, a)]);

        let shortfalls = compute_shortfalls(&items, &by_id);
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].product_name, "repetido");
        assert_eq!(shortfalls[0].available, Decimal::from_f64(5.0).unwrap());
        assert_eq!(shortfalls[0].requested, Decimal::from_f64(6.0).unwrap());

        // Somando 2 + 3 cabe no saldo 5.
        let b = product("cabe", 5.0);
        let items = vec![item(&b, 2.0), item(&b, 3.0)];
        let by_id = HashMap::from([(b.id, b)]);
        assert!(compute_shortfalls(&items, &by_id).is_empty());
    }

    #[test]
    fn total_estourado_vira_erro_e_nao_panico() {
        let err = add_line_total(Decimal::ZERO, Decimal::MAX, Decimal::from_f64(2.0).unwrap())
            .unwrap_err();
        assert!(matches!(err, AppError::OrderTotalOutOfRange));

        let err = add_line_total(Decimal::MAX, Decimal::ONE, Decimal::ONE).unwrap_err();
        assert!(matches!(err, AppError::OrderTotalOutOfRange));

        let total = add_line_total(
            Decimal::from_f64(10.0).unwrap(),
            Decimal::from_f64(2.5).unwrap(),
            Decimal::from_f64(4.0).unwrap(),
        )
        .unwrap();
        assert_eq!(total, Decimal::from_f64(20.0).unwrap());
    }
}
