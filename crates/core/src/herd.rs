//! Herd rules: animal registration checks, sale readiness, and resolving a
//! list of animal ids into settlement input.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::CoreError;
use crate::model::{AnimalForSale, AnimalRecord, AnimalStatus};
use crate::ports::AnimalRepository;
use crate::settlement::{add, compute_settlement, div, SettlementResult};

/// Minimum live weight for an animal to be offered for sale.
pub const MIN_SALE_WEIGHT_KG: Decimal = dec!(450);

/// Registration payload for a new animal.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAnimal {
    pub tag: String,
    pub weight_kg: Decimal,
    #[serde(default)]
    pub acquisition_cost: Option<Decimal>,
    #[serde(default)]
    pub accumulated_cost: Decimal,
    #[serde(default)]
    pub status: Option<AnimalStatus>,
}

impl NewAnimal {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tag.trim().is_empty() {
            return Err(CoreError::validation("tag must not be empty"));
        }
        if self.weight_kg <= Decimal::ZERO {
            return Err(CoreError::validation(format!(
                "weight must be positive (got {})",
                self.weight_kg
            )));
        }
        if self.acquisition_cost.is_some_and(|c| c < Decimal::ZERO) {
            return Err(CoreError::validation("acquisition cost must not be negative"));
        }
        if self.accumulated_cost < Decimal::ZERO {
            return Err(CoreError::validation("accumulated cost must not be negative"));
        }
        Ok(())
    }

    pub fn into_record(self, id: String, created_at: DateTime<Utc>) -> AnimalRecord {
        AnimalRecord {
            id,
            tag: self.tag.trim().to_string(),
            weight_kg: self.weight_kg,
            acquisition_cost: self.acquisition_cost,
            accumulated_cost: self.accumulated_cost,
            status: self.status.unwrap_or(AnimalStatus::Ativo),
            created_at,
        }
    }
}

pub fn is_ready_for_sale(animal: &AnimalRecord) -> bool {
    animal.status == AnimalStatus::Ativo && animal.weight_kg >= MIN_SALE_WEIGHT_KG
}

/// Active animals at or above sale weight, heaviest first.
pub fn ready_for_sale(
    repo: &(impl AnimalRepository + ?Sized),
) -> Result<Vec<AnimalRecord>, CoreError> {
    let mut ready: Vec<AnimalRecord> = repo
        .animals_with_status(AnimalStatus::Ativo)
        .map_err(CoreError::store("failed to list animals"))?
        .into_iter()
        .filter(is_ready_for_sale)
        .collect();
    ready.sort_by(|a, b| b.weight_kg.cmp(&a.weight_kg).then_with(|| a.id.cmp(&b.id)));
    Ok(ready)
}

/// Parse a `status` filter value. Case is ignored.
pub fn parse_status(raw: &str) -> Result<AnimalStatus, CoreError> {
    AnimalStatus::parse(&raw.trim().to_ascii_uppercase())
        .ok_or_else(|| CoreError::validation(format!("unknown animal status: {raw}")))
}

/// The registry, newest first, optionally narrowed to one status.
pub fn list_animals(
    repo: &(impl AnimalRepository + ?Sized),
    status: Option<AnimalStatus>,
) -> Result<Vec<AnimalRecord>, CoreError> {
    let animals = match status {
        Some(status) => repo.animals_with_status(status),
        None => repo.animals(),
    };
    animals.map_err(CoreError::store("failed to list animals"))
}

/// Herd-wide totals over every registered animal, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct HerdOverview {
    pub total_animals: usize,
    pub total_weight_kg: Decimal,
    /// Sum of acquisition costs; animals without one count as zero.
    pub invested: Decimal,
    pub accumulated_cost: Decimal,
    /// Zero for an empty herd.
    pub average_weight_kg: Decimal,
    pub by_status: BTreeMap<AnimalStatus, usize>,
}

pub fn overview(repo: &(impl AnimalRepository + ?Sized)) -> Result<HerdOverview, CoreError> {
    let animals = list_animals(repo, None)?;

    let mut total_weight_kg = Decimal::ZERO;
    let mut invested = Decimal::ZERO;
    let mut accumulated_cost = Decimal::ZERO;
    let mut by_status = BTreeMap::new();
    for a in &animals {
        total_weight_kg = add(total_weight_kg, a.weight_kg)?;
        invested = add(invested, a.acquisition_cost.unwrap_or(Decimal::ZERO))?;
        accumulated_cost = add(accumulated_cost, a.accumulated_cost)?;
        *by_status.entry(a.status).or_insert(0) += 1;
    }

    let average_weight_kg = if animals.is_empty() {
        Decimal::ZERO
    } else {
        div(total_weight_kg, Decimal::from(animals.len()))?
    };

    Ok(HerdOverview {
        total_animals: animals.len(),
        total_weight_kg,
        invested,
        accumulated_cost,
        average_weight_kg,
        by_status,
    })
}

/// Resolve `ids` through the registry and settle them at `price_per_arroba`.
///
/// Duplicate ids count once. Any id the registry does not know fails the
/// whole request with `NotFound`.
pub fn settle_animals(
    repo: &(impl AnimalRepository + ?Sized),
    ids: &[String],
    price_per_arroba: Decimal,
) -> Result<SettlementResult, CoreError> {
    let wanted: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
    if wanted.is_empty() {
        return compute_settlement(&[], price_per_arroba);
    }

    let unique: Vec<String> = wanted.iter().map(|s| s.to_string()).collect();
    let found = repo
        .animals_by_ids(&unique)
        .map_err(CoreError::store("failed to load animals"))?;

    let found_ids: BTreeSet<&str> = found.iter().map(|a| a.id.as_str()).collect();
    let missing: Vec<&str> = wanted.difference(&found_ids).copied().collect();
    if !missing.is_empty() {
        return Err(CoreError::NotFound(format!(
            "unknown animal id(s): {}",
            missing.join(", ")
        )));
    }

    let animals: Vec<AnimalForSale> = found.iter().map(AnimalForSale::from).collect();
    compute_settlement(&animals, price_per_arroba)
}
