// src/services/unit_service.rs

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use sqlx::{Acquire, PgConnection};
use uuid::Uuid;

use crate::{
    common::error::AppError, db::InventoryRepository, models::inventory::UnitOfMeasure,
};

/// Unidade-base efetiva: uma unidade sem base é a própria base.
fn base_of(unit: &UnitOfMeasure) -> Uuid {
    unit.base_unit_id.unwrap_or(unit.id)
}

/// Fator efetivo: 1 desta unidade = fator unidades-base. Fator não-positivo
/// numa unidade com base é dado corrompido e vira erro, nunca um número
/// silenciosamente errado.
fn factor_of(unit: &UnitOfMeasure) -> Result<Decimal, AppError> {
    if unit.base_unit_id.is_none() {
        return Ok(Decimal::ONE);
    }
    if unit.conversion_factor <= Decimal::ZERO {
        return Err(AppError::InvalidConversionFactor(unit.name.clone()));
    }
    Ok(unit.conversion_factor)
}

/// Converte `quantity` entre duas unidades que compartilham a mesma base
/// (diretamente, ou sendo uma delas a própria base).
pub fn convert_quantity(
    quantity: Decimal,
    from: &UnitOfMeasure,
    to: &UnitOfMeasure,
) -> Result<Decimal, AppError> {
    if from.id == to.id {
        return Ok(quantity);
    }
    if base_of(from) != base_of(to) {
        return Err(AppError::IncompatibleUnits {
            from: from.name.clone(),
            to: to.name.clone(),
        });
    }
    let in_base = quantity * factor_of(from)?;
    Ok(in_base / factor_of(to)?)
}

/// Caminha a cadeia inteira de unidades-base a partir de `candidate_base_id`
/// e responde se `unit_id` aparece nela. Cobre auto-referência, ciclo direto
/// e ciclos transitivos; um conjunto de visitados protege contra cadeias já
/// corrompidas no banco.
pub fn would_create_cycle(
    units_by_id: &HashMap<Uuid, &UnitOfMeasure>,
    unit_id: Uuid,
    candidate_base_id: Uuid,
) -> bool {
    if unit_id == candidate_base_id {
        return true;
    }

    let mut visited = HashSet::new();
    let mut current = Some(candidate_base_id);
    while let Some(id) = current {
        if id == unit_id {
            return true;
        }
        if !visited.insert(id) {
            // Cadeia já circular no banco; não piore.
            return true;
        }
        current = units_by_id.get(&id).and_then(|u| u.base_unit_id);
    }
    false
}

#[derive(Clone)]
pub struct UnitService {
    repo: InventoryRepository,
}

impl UnitService {
    pub fn new(repo: InventoryRepository) -> Self {
        Self { repo }
    }

    pub async fn get_all_units(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
    ) -> Result<Vec<UnitOfMeasure>, AppError> {
        self.repo.get_all_units(&mut *conn, tenant_id).await
    }

    pub async fn create_unit(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        name: &str,
        symbol: &str,
        base_unit_id: Option<Uuid>,
        conversion_factor: Decimal,
    ) -> Result<UnitOfMeasure, AppError> {
        if let Some(base_id) = base_unit_id {
            // A base precisa existir e o fator ser positivo.
            self.repo
                .get_unit(&mut *conn, tenant_id, base_id)
                .await?
                .ok_or(AppError::UnitNotFound)?;
            if conversion_factor <= Decimal::ZERO {
                return Err(AppError::InvalidConversionFactor(name.to_string()));
            }
        }
        self.repo
            .create_unit(&mut *conn, tenant_id, name, symbol, base_unit_id, conversion_factor)
            .await
    }

    /// Converte uma quantidade entre duas unidades do tenant.
    pub async fn convert(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        quantity: Decimal,
        from_unit_id: Uuid,
        to_unit_id: Uuid,
    ) -> Result<Decimal, AppError> {
        let from = self
            .repo
            .get_unit(&mut *conn, tenant_id, from_unit_id)
            .await?
            .ok_or(AppError::UnitNotFound)?;
        let to = self
            .repo
            .get_unit(&mut *conn, tenant_id, to_unit_id)
            .await?
            .ok_or(AppError::UnitNotFound)?;
        convert_quantity(quantity, &from, &to)
    }

    /// Responde se `candidate_base_id` pode virar a base de `unit_id` sem
    /// criar referência circular.
    pub async fn can_set_as_base_unit(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        unit_id: Uuid,
        candidate_base_id: Uuid,
    ) -> Result<bool, AppError> {
        let units = self.repo.get_all_units(&mut *conn, tenant_id).await?;
        let by_id: HashMap<Uuid, &UnitOfMeasure> = units.iter().map(|u| (u.id, u)).collect();
        if !by_id.contains_key(&unit_id) || !by_id.contains_key(&candidate_base_id) {
            return Err(AppError::UnitNotFound);
        }
        Ok(!would_create_cycle(&by_id, unit_id, candidate_base_id))
    }

    /// Reatribui (ou remove, com None) a unidade-base de uma unidade.
    pub async fn set_base_unit(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        unit_id: Uuid,
        base_unit_id: Option<Uuid>,
        conversion_factor: Decimal,
    ) -> Result<UnitOfMeasure, AppError> {
        let mut tx = conn.begin().await?;

        if let Some(base_id) = base_unit_id {
            if conversion_factor <= Decimal::ZERO {
                let unit = self
                    .repo
                    .get_unit(&mut *tx, tenant_id, unit_id)
                    .await?
                    .ok_or(AppError::UnitNotFound)?;
                return Err(AppError::InvalidConversionFactor(unit.name));
            }
            if !self
                .can_set_as_base_unit(&mut *tx, tenant_id, unit_id, base_id)
                .await?
            {
                return Err(AppError::CircularBaseUnit);
            }
        }

        let factor = if base_unit_id.is_some() {
            conversion_factor
        } else {
            Decimal::ONE
        };
        let unit = self
            .repo
            .set_base_unit(&mut *tx, tenant_id, unit_id, base_unit_id, factor)
            .await?;

        tx.commit().await?;
        Ok(unit)
    }

    /// Remove uma unidade, desde que nenhum produto a use e nenhuma outra
    /// unidade a tenha como base.
    pub async fn delete_unit(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        unit_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = conn.begin().await?;

        self.repo
            .get_unit(&mut *tx, tenant_id, unit_id)
            .await?
            .ok_or(AppError::UnitNotFound)?;

        let products = self
            .repo
            .count_products_using_unit(&mut *tx, tenant_id, unit_id)
            .await?;
        let dependents = self
            .repo
            .count_units_with_base(&mut *tx, tenant_id, unit_id)
            .await?;
        if products > 0 || dependents > 0 {
            return Err(AppError::UnitInUse);
        }

        self.repo.delete_unit(&mut *tx, tenant_id, unit_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::prelude::FromPrimitive;

    fn unit(name: &str, base: Option<Uuid>, factor: f64) -> UnitOfMeasure {
        UnitOfMeasure {
            id: Uuid::new_v4(),
            tenant_id: Uuid::nil(),
            name: name.to_string(),
            symbol: name.to_string(),
            base_unit_id: base,
            conversion_factor: Decimal::from_f64(factor).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn dec(v: f64) -> Decimal {
        Decimal::from_f64(v).unwrap()
    }

    #[test]
    fn converte_entre_irmas_da_mesma_base() {
        let grama = unit("grama", None, 1.0);
        let kg = unit("kg", Some(grama.id), 1000.0);
        let libra = unit("libra", Some(grama.id), 453.592);

        // 2 kg = 2000 g
        assert_eq!(convert_quantity(dec(2.0), &kg, &grama).unwrap(), dec(2000.0));
        // 500 g = 0.5 kg
        assert_eq!(convert_quantity(dec(500.0), &grama, &kg).unwrap(), dec(0.5));

        // kg -> libra via a base comum
        let kg_em_libras = convert_quantity(dec(1.0), &kg, &libra).unwrap();
        assert!((kg_em_libras - dec(2.204624)).abs() < dec(0.0001));
    }

    #[test]
    fn ida_e_volta_preserva_a_quantidade() {
        let unidade = unit("unidade", None, 1.0);
        let caixa = unit("caixa", Some(unidade.id), 12.0);

        let ida = convert_quantity(dec(7.0), &caixa, &unidade).unwrap();
        let volta = convert_quantity(ida, &unidade, &caixa).unwrap();
        assert!((volta - dec(7.0)).abs() < dec(0.000001));
    }

    #[test]
    fn mesma_unidade_e_identidade() {
        let kg = unit("kg", None, 1.0);
        assert_eq!(convert_quantity(dec(3.25), &kg, &kg).unwrap(), dec(3.25));
    }

    #[test]
    fn bases_diferentes_sao_rejeitadas() {
        let grama = unit("grama", None, 1.0);
        let litro = unit("litro", None, 1.0);
        let kg = unit("kg", Some(grama.id), 1000.0);
        let ml = unit("ml", Some(litro.id), 0.001);

        let err = convert_quantity(dec(1.0), &kg, &ml).unwrap_err();
        assert!(matches!(err, AppError::IncompatibleUnits { .. }));
    }

    #[test]
    fn fator_invalido_e_rejeitado() {
        let grama = unit("grama", None, 1.0);
        let quebrada = unit("quebrada", Some(grama.id), 0.0);
        let err = convert_quantity(dec(1.0), &quebrada, &grama).unwrap_err();
        assert!(matches!(err, AppError::InvalidConversionFactor(_)));
    }

    #[test]
    fn detecta_auto_referencia_e_ciclo_direto() {
        let a = unit("a", None, 1.0);
        let b = unit("b", Some(a.id), 10.0);
        let by_id: HashMap<Uuid, &UnitOfMeasure> = [(a.id, &a), (b.id, &b)].into();

        // a não pode ser base dela mesma
        assert!(would_create_cycle(&by_id, a.id, a.id));
        // b já aponta para a; a apontar para b fecharia o ciclo
        assert!(would_create_cycle(&by_id, a.id, b.id));
        // c novo apontar para a é inofensivo
        let c = unit("c", None, 1.0);
        assert!(!would_create_cycle(&by_id, c.id, a.id));
    }

    #[test]
    fn detecta_ciclo_transitivo() {
        // c -> b -> a; fazer a apontar para c fecha um ciclo de 3 nós.
        let a = unit("a", None, 1.0);
        let b = unit("b", Some(a.id), 10.0);
        let c = unit("c", Some(b.id), 10.0);
        let by_id: HashMap<Uuid, &UnitOfMeasure> =
            [(a.id, &a), (b.id, &b), (c.id, &c)].into();

        assert!(would_create_cycle(&by_id, a.id, c.id));
        assert!(would_create_cycle(&by_id, b.id, c.id));
        assert!(!would_create_cycle(&by_id, c.id, a.id));
    }
}
