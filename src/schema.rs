//! Schema-variant detection and header remapping for source batches.
//!
//! Client and invoice files arrive in one of a closed set of column layouts.
//! Each layout is described by a [`SchemaVariant`]: the marker columns that
//! identify it and the rename table that maps its columns onto the canonical
//! field names. Detection walks the variant list in priority order and the
//! first match wins; the identity layout sits last with no markers so it
//! always matches. Header comparison is case-insensitive and treats internal
//! whitespace as `_`.
//!
//! Columns a variant does not map are still carried over when their name
//! already equals a canonical field, so a v2 client file with an extra
//! `status` column keeps it. Columns absent from the source are simply left
//! unset; the normalizers fill type-appropriate defaults downstream.

use std::collections::BTreeMap;

use log::debug;

/// A batch of raw rows read from one source file, untyped and unmapped.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One row after remapping: canonical field name to raw value. Fields the
/// source did not supply are absent.
pub type MappedRow = BTreeMap<String, String>;

/// One known source layout: its detection markers and its rename table.
#[derive(Debug, Clone, Copy)]
pub struct SchemaVariant {
    pub name: &'static str,
    /// Normalized header names that must all be present for this variant to
    /// match. Empty means "always matches" (the identity fallback).
    pub markers: &'static [&'static str],
    /// `(source column, canonical field)` pairs, in priority order when two
    /// sources feed the same field.
    pub renames: &'static [(&'static str, &'static str)],
}

/// Canonical layout and known variants for one entity type.
#[derive(Debug, Clone, Copy)]
pub struct EntitySchema {
    pub entity: &'static str,
    pub fields: &'static [&'static str],
    pub variants: &'static [SchemaVariant],
}

pub const CLIENT_FIELDS: &[&str] = &[
    "client_id",
    "client_name",
    "status",
    "tier",
    "created_at",
    "currency",
];

pub const INVOICE_FIELDS: &[&str] = &[
    "invoice_id",
    "client_id",
    "client_name",
    "invoice_date",
    "amount",
    "currency",
    "shipment_type",
];

pub const CLIENT_SCHEMA: EntitySchema = EntitySchema {
    entity: "client",
    fields: CLIENT_FIELDS,
    variants: &[
        SchemaVariant {
            name: "v2",
            markers: &["id", "tier"],
            renames: &[
                ("id", "client_id"),
                ("name", "client_name"),
                ("tier", "tier"),
                ("acct_open_date", "created_at"),
            ],
        },
        SchemaVariant {
            name: "v3",
            markers: &["customer_key", "display_name"],
            renames: &[
                ("customer_key", "client_id"),
                ("display_name", "client_name"),
                ("active_flag", "status"),
                ("signup_ts", "created_at"),
                ("currency", "currency"),
            ],
        },
        SchemaVariant {
            name: "v1",
            markers: &[],
            renames: &[],
        },
    ],
};

pub const INVOICE_SCHEMA: EntitySchema = EntitySchema {
    entity: "invoice",
    fields: INVOICE_FIELDS,
    variants: &[
        SchemaVariant {
            name: "v2",
            markers: &["inv_no", "customer_key"],
            renames: &[
                ("inv_no", "invoice_id"),
                ("customer_key", "client_id"),
                ("inv_dt", "invoice_date"),
                ("total", "amount"),
                ("subtotal", "amount"),
                ("curr", "currency"),
                ("ship_type", "shipment_type"),
            ],
        },
        // v3 identifies clients by display name, not id.
        SchemaVariant {
            name: "v3",
            markers: &["invoice_uid", "client_ref"],
            renames: &[
                ("invoice_uid", "invoice_id"),
                ("client_ref", "client_name"),
                ("issued_on", "invoice_date"),
                ("amount_usd", "amount"),
                ("shipment_category", "shipment_type"),
            ],
        },
        SchemaVariant {
            name: "v1",
            markers: &[],
            renames: &[],
        },
    ],
};

/// Lowercases and trims a header, mapping internal whitespace to `_`, so
/// `" Inv No "` and `inv_no` compare equal.
pub fn normalize_header(name: &str) -> String {
    name.trim()
        .to_ascii_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

impl EntitySchema {
    /// First variant whose markers are all present; the identity fallback
    /// guarantees a match.
    pub fn detect(&self, headers: &[String]) -> &'static SchemaVariant {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        self.variants
            .iter()
            .find(|variant| {
                variant
                    .markers
                    .iter()
                    .all(|marker| normalized.iter().any(|h| h == marker))
            })
            .expect("identity variant always matches")
    }

    /// Remaps a batch into canonical field names using the detected variant.
    pub fn map_batch(&self, batch: &RawBatch) -> Vec<MappedRow> {
        let variant = self.detect(&batch.headers);
        debug!(
            "Detected {} schema {} for '{}'",
            self.entity, variant.name, batch.source
        );

        let normalized: Vec<String> = batch.headers.iter().map(|h| normalize_header(h)).collect();
        let column_of = |name: &str| normalized.iter().position(|h| h == name);

        // Resolve one source column per canonical field: renames first (in
        // declaration order), then a same-named column as identity.
        let mut columns: Vec<(&'static str, usize)> = Vec::new();
        for &field in self.fields {
            let renamed = variant
                .renames
                .iter()
                .filter(|(_, target)| *target == field)
                .find_map(|(source, _)| column_of(source));
            if let Some(idx) = renamed.or_else(|| column_of(field)) {
                columns.push((field, idx));
            }
        }

        batch
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .filter_map(|&(field, idx)| {
                        row.get(idx).map(|value| (field.to_string(), value.clone()))
                    })
                    .collect::<MappedRow>()
            })
            .collect()
    }
}
