//! Sale settlement: gross revenue, tax withholding, cost basis and margin for
//! a batch of cattle priced per arroba.
//!
//! All arithmetic runs on full-precision decimals. Rounding happens once, in
//! [`SettlementResult::rounded`], when a result is about to be shown.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::error::CoreError;
use crate::model::AnimalForSale;

/// Live weight in kg per pricing unit (arroba).
pub const KG_PER_ARROBA: Decimal = dec!(15);

/// FUNRURAL withholding on gross value.
pub const FUNRURAL_RATE: Decimal = dec!(0.023);
/// ICMS on gross value.
pub const ICMS_RATE: Decimal = dec!(0.10);
/// Remaining fees on gross value.
pub const OTHER_TAX_RATE: Decimal = dec!(0.01);

/// Decimal places used when a result is presented.
pub const DISPLAY_DP: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxBreakdown {
    pub funrural: Decimal,
    pub icms: Decimal,
    pub outros: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementResult {
    pub total_weight_kg: Decimal,
    pub arrobas: Decimal,
    pub gross_value: Decimal,
    pub taxes: TaxBreakdown,
    pub net_value: Decimal,
    pub cost_basis: Decimal,
    pub net_profit: Decimal,
    /// Net profit over cost basis, in percent. Zero when cost basis is zero.
    pub margin_percent: Decimal,
    pub animal_count: usize,
}

impl SettlementResult {
    /// Presentation copy: every figure rounded to [`DISPLAY_DP`] places, half
    /// away from zero. Never feed the output back into further math.
    pub fn rounded(&self) -> Self {
        let r = |d: Decimal| d.round_dp_with_strategy(DISPLAY_DP, RoundingStrategy::MidpointAwayFromZero);
        Self {
            total_weight_kg: r(self.total_weight_kg),
            arrobas: r(self.arrobas),
            gross_value: r(self.gross_value),
            taxes: TaxBreakdown {
                funrural: r(self.taxes.funrural),
                icms: r(self.taxes.icms),
                outros: r(self.taxes.outros),
                total: r(self.taxes.total),
            },
            net_value: r(self.net_value),
            cost_basis: r(self.cost_basis),
            net_profit: r(self.net_profit),
            margin_percent: r(self.margin_percent),
            animal_count: self.animal_count,
        }
    }
}

/// Compute the settlement of selling `animals` at `price_per_arroba`.
///
/// Empty input is valid and yields zeros everywhere, including the margin.
/// Negative weights, costs or price are rejected rather than clamped.
pub fn compute_settlement(
    animals: &[AnimalForSale],
    price_per_arroba: Decimal,
) -> Result<SettlementResult, CoreError> {
    if price_per_arroba < Decimal::ZERO {
        return Err(CoreError::validation(format!(
            "price per arroba must not be negative (got {price_per_arroba})"
        )));
    }

    let mut total_weight = Decimal::ZERO;
    let mut cost_basis = Decimal::ZERO;

    for animal in animals {
        validate_animal(animal)?;
        total_weight = add(total_weight, animal.weight_kg)?;
        let acquisition = animal.acquisition_cost.unwrap_or(Decimal::ZERO);
        cost_basis = add(cost_basis, add(acquisition, animal.accumulated_cost)?)?;
    }

    let arrobas = div(total_weight, KG_PER_ARROBA)?;
    let gross_value = mul(arrobas, price_per_arroba)?;

    let funrural = mul(gross_value, FUNRURAL_RATE)?;
    let icms = mul(gross_value, ICMS_RATE)?;
    let outros = mul(gross_value, OTHER_TAX_RATE)?;
    let total_tax = funrural + icms + outros;

    let net_value = gross_value - total_tax;
    let net_profit = net_value - cost_basis;
    let margin_percent = margin_percent(net_profit, cost_basis)?;

    Ok(SettlementResult {
        total_weight_kg: total_weight,
        arrobas,
        gross_value,
        taxes: TaxBreakdown {
            funrural,
            icms,
            outros,
            total: total_tax,
        },
        net_value,
        cost_basis,
        net_profit,
        margin_percent,
        animal_count: animals.len(),
    })
}

/// `profit / cost * 100`, or zero when there is no cost to measure against.
pub fn margin_percent(net_profit: Decimal, cost_basis: Decimal) -> Result<Decimal, CoreError> {
    if cost_basis <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    mul(div(net_profit, cost_basis)?, dec!(100))
}

fn validate_animal(animal: &AnimalForSale) -> Result<(), CoreError> {
    if animal.weight_kg < Decimal::ZERO {
        return Err(CoreError::validation(format!(
            "animal {}: weight must not be negative (got {})",
            animal.id, animal.weight_kg
        )));
    }
    if let Some(cost) = animal.acquisition_cost {
        if cost < Decimal::ZERO {
            return Err(CoreError::validation(format!(
                "animal {}: acquisition cost must not be negative (got {cost})",
                animal.id
            )));
        }
    }
    if animal.accumulated_cost < Decimal::ZERO {
        return Err(CoreError::validation(format!(
            "animal {}: accumulated cost must not be negative (got {})",
            animal.id, animal.accumulated_cost
        )));
    }
    Ok(())
}

pub(crate) fn add(a: Decimal, b: Decimal) -> Result<Decimal, CoreError> {
    a.checked_add(b)
        .ok_or_else(|| CoreError::validation("amount out of range"))
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal, CoreError> {
    a.checked_mul(b)
        .ok_or_else(|| CoreError::validation("amount out of range"))
}

pub(crate) fn div(a: Decimal, b: Decimal) -> Result<Decimal, CoreError> {
    a.checked_div(b)
        .ok_or_else(|| CoreError::validation("amount out of range"))
}
