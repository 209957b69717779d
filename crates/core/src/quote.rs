//! Slaughterhouse (packer) price quotes per arroba.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::error::CoreError;

/// How long a quote stays valid.
pub const QUOTE_VALIDITY_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Packer {
    Jbs,
    Marfrig,
    Minerva,
}

impl Packer {
    pub const ALL: [Packer; 3] = [Packer::Jbs, Packer::Marfrig, Packer::Minerva];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JBS" => Some(Self::Jbs),
            "MARFRIG" => Some(Self::Marfrig),
            "MINERVA" => Some(Self::Minerva),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jbs => "JBS",
            Self::Marfrig => "MARFRIG",
            Self::Minerva => "MINERVA",
        }
    }
}

/// Cattle category as priced by packers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Finished steer.
    Boi,
    /// Cull cow.
    Vaca,
}

impl Category {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BOI" => Some(Self::Boi),
            "VACA" => Some(Self::Vaca),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boi => "BOI",
            Self::Vaca => "VACA",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackerQuote {
    pub packer: Packer,
    pub category: Category,
    pub price_per_arroba: Decimal,
    pub quoted_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

fn table_price(packer: Packer, category: Category) -> Decimal {
    match (packer, category) {
        (Packer::Jbs, Category::Boi) => dec!(285.50),
        (Packer::Jbs, Category::Vaca) => dec!(245.80),
        (Packer::Marfrig, Category::Boi) => dec!(283.20),
        (Packer::Marfrig, Category::Vaca) => dec!(243.50),
        (Packer::Minerva, Category::Boi) => dec!(287.10),
        (Packer::Minerva, Category::Vaca) => dec!(247.20),
    }
}

/// Quote `category` at `packer`, valid for [`QUOTE_VALIDITY_HOURS`] from `now`.
pub fn packer_quote(packer: &str, category: &str, now: DateTime<Utc>) -> Result<PackerQuote, CoreError> {
    let p = Packer::parse(packer)
        .ok_or_else(|| CoreError::NotFound(format!("unknown packer '{packer}'")))?;
    let c = Category::parse(category)
        .ok_or_else(|| CoreError::NotFound(format!("unknown category '{category}'")))?;

    Ok(PackerQuote {
        packer: p,
        category: c,
        price_per_arroba: table_price(p, c),
        quoted_at: now,
        valid_until: now + Duration::hours(QUOTE_VALIDITY_HOURS),
    })
}

/// Best `category` price across all packers. Ties go to the first in [`Packer::ALL`].
pub fn best_quote(category: &str, now: DateTime<Utc>) -> Result<PackerQuote, CoreError> {
    let c = Category::parse(category)
        .ok_or_else(|| CoreError::NotFound(format!("unknown category '{category}'")))?;
    let mut best = packer_quote(Packer::ALL[0].as_str(), c.as_str(), now)?;
    for p in &Packer::ALL[1..] {
        let q = packer_quote(p.as_str(), c.as_str(), now)?;
        if q.price_per_arroba > best.price_per_arroba {
            best = q;
        }
    }
    Ok(best)
}
