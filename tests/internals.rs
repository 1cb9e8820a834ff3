use billing_recon::fingerprint;
use billing_recon::model::ShipmentType;
use billing_recon::normalize::{
    clean_name, normalize_shipment_type, normalize_status, parse_amount, parse_date,
};
use proptest::prelude::*;

#[test]
fn parse_amount_handles_the_documented_cases() {
    assert_eq!(parse_amount("$1,234.56"), 1234.56);
    assert_eq!(parse_amount("garbage"), 0.0);
}

#[test]
fn shipment_normalization_handles_the_documented_cases() {
    assert_eq!(normalize_shipment_type("2 Day"), ShipmentType::TwoDay);
    assert_eq!(normalize_shipment_type("BICYCLE"), ShipmentType::Unknown);
}

proptest! {
    // The parsers are total functions: any string input produces a typed
    // value, never a panic.
    #[test]
    fn parse_amount_is_total(input in ".*") {
        let value = parse_amount(&input);
        prop_assert!(!value.is_nan());
    }

    #[test]
    fn parse_date_is_total(input in ".*") {
        let _ = parse_date(&input);
    }

    #[test]
    fn normalizers_are_total(input in ".*") {
        let _ = normalize_status(&input);
        let _ = normalize_shipment_type(&input);
        let _ = clean_name(&input);
    }

    #[test]
    fn parse_amount_recovers_formatted_dollars(cents in 0u64..100_000_000u64) {
        let dollars = cents / 100;
        let remainder = cents % 100;
        let formatted = format!("${}.{:02}", group_thousands(dollars), remainder);
        let parsed = parse_amount(&formatted);
        let expected = cents as f64 / 100.0;
        prop_assert!((parsed - expected).abs() < 1e-9, "{formatted} -> {parsed}");
    }

    #[test]
    fn fingerprint_ignores_field_order(a in "[a-z]{1,8}", b in "[A-Z0-9]{1,8}") {
        let forward = fingerprint::digest(&[
            ("first", Some(a.clone())),
            ("second", Some(b.clone())),
        ]);
        let reversed = fingerprint::digest(&[
            ("second", Some(b)),
            ("first", Some(a)),
        ]);
        prop_assert_eq!(forward, reversed);
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::new();
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
