use bovinext_core::settlement::{compute_settlement, KG_PER_ARROBA};
use bovinext_core::AnimalForSale;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn tolerance() -> Decimal {
    dec!(0.000001)
}

fn animal_strategy() -> impl Strategy<Value = AnimalForSale> {
    (0u32..1_200_000, proptest::option::of(0i64..1_500_000), 0i64..500_000).prop_map(
        |(grams, acq_cents, acc_cents)| AnimalForSale {
            id: format!("g{grams}"),
            weight_kg: Decimal::new(grams as i64, 3),
            acquisition_cost: acq_cents.map(|c| Decimal::new(c, 2)),
            accumulated_cost: Decimal::new(acc_cents, 2),
        },
    )
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000).prop_map(|c| Decimal::new(c, 2))
}

proptest! {
    #[test]
    fn gross_is_arrobas_times_price(
        animals in prop::collection::vec(animal_strategy(), 1..20),
        price in price_strategy(),
    ) {
        let result = compute_settlement(&animals, price).unwrap();
        let weight: Decimal = animals.iter().map(|a| a.weight_kg).sum();
        let expected = weight / KG_PER_ARROBA * price;
        prop_assert!((result.gross_value - expected).abs() <= tolerance());
    }

    #[test]
    fn total_tax_is_13_3_percent(
        animals in prop::collection::vec(animal_strategy(), 0..20),
        price in price_strategy(),
    ) {
        let result = compute_settlement(&animals, price).unwrap();
        let expected = result.gross_value * dec!(0.133);
        prop_assert!((result.taxes.total - expected).abs() <= tolerance());
        prop_assert_eq!(
            result.taxes.total,
            result.taxes.funrural + result.taxes.icms + result.taxes.outros
        );
    }

    #[test]
    fn net_plus_tax_is_gross(
        animals in prop::collection::vec(animal_strategy(), 0..20),
        price in price_strategy(),
    ) {
        let result = compute_settlement(&animals, price).unwrap();
        prop_assert!((result.net_value + result.taxes.total - result.gross_value).abs() <= tolerance());
    }

    #[test]
    fn margin_is_zero_without_cost_basis(
        grams in prop::collection::vec(0u32..1_200_000, 0..10),
        price in price_strategy(),
    ) {
        let animals: Vec<AnimalForSale> = grams
            .iter()
            .map(|g| AnimalForSale {
                id: format!("g{g}"),
                weight_kg: Decimal::new(*g as i64, 3),
                acquisition_cost: None,
                accumulated_cost: Decimal::ZERO,
            })
            .collect();
        let result = compute_settlement(&animals, price).unwrap();
        prop_assert_eq!(result.cost_basis, Decimal::ZERO);
        prop_assert_eq!(result.margin_percent, Decimal::ZERO);
    }

    #[test]
    fn rounding_is_presentation_only(
        animals in prop::collection::vec(animal_strategy(), 1..10),
        price in price_strategy(),
    ) {
        let result = compute_settlement(&animals, price).unwrap();
        let shown = result.rounded();
        prop_assert!((shown.gross_value - result.gross_value).abs() <= dec!(0.005));
        prop_assert!(shown.arrobas.scale() <= 2);
    }
}
