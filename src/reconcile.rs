//! Cross-source reconciliation of clients and invoices.
//!
//! Clients and invoices are deliberately treated differently. Clients are
//! evolving entities: rows describing the same client are merged into one
//! canonical record, preferring the newest/most-active row as the base and
//! backfilling only the fields the base is missing. Invoices are immutable
//! transactions: the first row seen for an `invoice_id` wins and later
//! duplicates are dropped outright, never merged.
//!
//! The client merge key is the `client_id` when it matches the `C#####`
//! pattern, else the client name, which is what lets name-keyed sources
//! (invoice schema v3 and friends) collapse into the same canonical client as
//! id-keyed sources.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use chrono::NaiveDate;
use log::{debug, info, warn};
use regex::Regex;

use crate::{
    model::{ClientRecord, InvoiceRecord, Status},
    normalize,
    schema::{CLIENT_SCHEMA, INVOICE_SCHEMA, MappedRow, RawBatch},
};

/// Canonical client identifiers look like `C00042`.
pub fn valid_client_id(id: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^C\d{5}$").expect("client id pattern is valid"))
        .is_match(id)
}

/// Literal placeholders that count as "no value" wherever they appear.
fn is_placeholder(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_uppercase().as_str(),
        "" | "NONE" | "NAN" | "NULL"
    )
}

const TIER_UNKNOWN: &str = "UNKNOWN";
const DEFAULT_CURRENCY: &str = "USD";

/// A client row after normalization, before fingerprinting. `None`, `Unknown`
/// status, and `UNKNOWN` tier all mean "missing" for backfill purposes.
#[derive(Debug, Clone)]
struct WorkingClient {
    client_id: Option<String>,
    client_name: Option<String>,
    status: Status,
    tier: String,
    created_at: Option<NaiveDate>,
    currency: String,
}

fn non_placeholder<'a>(row: &'a MappedRow, field: &str) -> Option<&'a str> {
    row.get(field)
        .map(|value| value.trim())
        .filter(|value| !is_placeholder(value))
}

fn normalize_client_row(row: &MappedRow) -> WorkingClient {
    let client_id = non_placeholder(row, "client_id").map(|id| id.to_ascii_uppercase());
    let client_name = row
        .get("client_name")
        .and_then(|name| normalize::clean_name(name))
        .map(|name| name.to_uppercase());
    let status = normalize::normalize_status(row.get("status").map(String::as_str).unwrap_or(""));
    let tier = non_placeholder(row, "tier")
        .map(|tier| tier.to_ascii_uppercase())
        .unwrap_or_else(|| TIER_UNKNOWN.to_string());
    let created_at = row
        .get("created_at")
        .and_then(|raw| normalize::parse_date(raw));
    let currency = non_placeholder(row, "currency")
        .map(|currency| currency.to_ascii_uppercase())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    WorkingClient {
        client_id,
        client_name,
        status,
        tier,
        created_at,
        currency,
    }
}

/// Descending date order with missing dates sorted last.
fn created_desc_nulls_last(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(left), Some(right)) => right.cmp(&left),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Keeps the best row per `client_id` within one source file: sort by id,
/// then status preference, then recency, and keep the first of each run.
fn dedup_batch(mut rows: Vec<WorkingClient>) -> Vec<WorkingClient> {
    rows.sort_by(|a, b| {
        let id_order = (a.client_id.is_none(), &a.client_id)
            .cmp(&(b.client_id.is_none(), &b.client_id));
        id_order
            .then_with(|| b.status.rank().cmp(&a.status.rank()))
            .then_with(|| created_desc_nulls_last(a.created_at, b.created_at))
    });
    rows.dedup_by(|next, kept| next.client_id == kept.client_id);
    rows
}

fn merge_key(row: &WorkingClient) -> Option<String> {
    match &row.client_id {
        Some(id) if valid_client_id(id) => Some(id.clone()),
        _ => row.client_name.clone(),
    }
}

fn tier_missing(tier: &str) -> bool {
    tier.eq_ignore_ascii_case(TIER_UNKNOWN) || is_placeholder(tier)
}

/// Collapses one merge group into its canonical record: the newest,
/// most-active row is the base, and every other row may only contribute
/// fields the base is missing. Backfill never overwrites.
fn merge_group(key: &str, mut rows: Vec<WorkingClient>) -> ClientRecord {
    rows.sort_by(|a, b| {
        created_desc_nulls_last(a.created_at, b.created_at)
            .then_with(|| b.status.rank().cmp(&a.status.rank()))
    });

    let mut base = rows[0].clone();
    for row in &rows[1..] {
        if base.client_id.is_none() {
            base.client_id = row.client_id.clone();
        }
        if base.client_name.is_none() {
            base.client_name = row.client_name.clone();
        }
        if base.status == Status::Unknown {
            base.status = row.status;
        }
        if tier_missing(&base.tier) && !tier_missing(&row.tier) {
            base.tier = row.tier.clone();
        }
        if base.created_at.is_none() {
            base.created_at = row.created_at;
        }
        if is_placeholder(&base.currency) {
            base.currency = row.currency.clone();
        }
    }

    // A base without a valid id keeps the merge key as an opaque identifier,
    // so name-keyed clients cannot collide in the id-keyed store.
    let client_id = match &base.client_id {
        Some(id) if valid_client_id(id) => id.clone(),
        _ => key.to_string(),
    };

    let mut record = ClientRecord {
        client_id,
        client_name: base.client_name,
        status: base.status,
        tier: base.tier,
        created_at: base.created_at,
        currency: base.currency,
        row_hash: String::new(),
    };
    record.row_hash = record.fingerprint();
    record
}

/// Reconciles all client batches into one canonical record per merge key.
pub fn reconcile_clients(batches: &[RawBatch]) -> Vec<ClientRecord> {
    let mut combined: Vec<WorkingClient> = Vec::new();
    for batch in batches {
        let mapped = CLIENT_SCHEMA.map_batch(batch);
        info!(
            "Normalizing {} client row(s) from '{}'",
            mapped.len(),
            batch.source
        );
        let rows: Vec<WorkingClient> = mapped.iter().map(normalize_client_row).collect();
        let deduped = dedup_batch(rows);
        combined.extend(deduped);
    }

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<WorkingClient>> = HashMap::new();
    for row in combined {
        let Some(key) = merge_key(&row) else {
            warn!("Dropping client row with neither a valid id nor a name");
            continue;
        };
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(row);
    }

    let merged: Vec<ClientRecord> = order
        .iter()
        .map(|key| {
            let rows = groups.remove(key).expect("group exists for ordered key");
            merge_group(key, rows)
        })
        .collect();
    info!("Merged to {} unique client record(s)", merged.len());
    merged
}

fn normalize_invoice_row(row: &MappedRow) -> InvoiceRecord {
    let invoice_id = non_placeholder(row, "invoice_id").map(|id| id.to_ascii_uppercase());
    let client_id = non_placeholder(row, "client_id").map(|id| id.to_ascii_uppercase());
    let client_name = row
        .get("client_name")
        .and_then(|name| normalize::clean_name(name))
        .map(|name| name.to_uppercase());
    let invoice_date = row
        .get("invoice_date")
        .and_then(|raw| normalize::parse_date(raw));
    let amount = normalize::parse_amount(row.get("amount").map(String::as_str).unwrap_or(""));
    let currency = non_placeholder(row, "currency")
        .map(|currency| currency.to_ascii_uppercase())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    let shipment_type =
        normalize::normalize_shipment_type(row.get("shipment_type").map(String::as_str).unwrap_or(""));

    let mut record = InvoiceRecord {
        invoice_id,
        client_id,
        client_name,
        invoice_date,
        amount,
        currency,
        shipment_type,
        row_hash: String::new(),
    };
    record.row_hash = record.fingerprint();
    record
}

/// Reconciles all invoice batches, keeping the first row seen per
/// `invoice_id` in file order and dropping later duplicates.
pub fn reconcile_invoices(batches: &[RawBatch]) -> Vec<InvoiceRecord> {
    let mut seen: HashSet<Option<String>> = HashSet::new();
    let mut records: Vec<InvoiceRecord> = Vec::new();
    for batch in batches {
        let mapped = INVOICE_SCHEMA.map_batch(batch);
        info!(
            "Normalizing {} invoice row(s) from '{}'",
            mapped.len(),
            batch.source
        );
        for row in &mapped {
            let record = normalize_invoice_row(row);
            if !seen.insert(record.invoice_id.clone()) {
                debug!(
                    "Dropping duplicate invoice '{}' from '{}'",
                    record.invoice_id.as_deref().unwrap_or("<missing>"),
                    batch.source
                );
                continue;
            }
            records.push(record);
        }
    }
    info!("Merged to {} unique invoice record(s)", records.len());
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShipmentType;

    fn client_batch(source: &str, headers: &[&str], rows: &[&[&str]]) -> RawBatch {
        RawBatch {
            source: source.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }

    const V1_HEADERS: &[&str] = &["client_id", "client_name", "status", "tier", "created_at", "currency"];

    #[test]
    fn intra_batch_dedup_keeps_active_and_newest() {
        let batch = client_batch(
            "clients_a.csv",
            V1_HEADERS,
            &[
                &["C00001", "Acme", "inactive", "GOLD", "2023-01-01", "USD"],
                &["C00001", "Acme", "active", "GOLD", "2024-06-01", "USD"],
            ],
        );
        let merged = reconcile_clients(&[batch]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, Status::Active);
        assert_eq!(
            merged[0].created_at,
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
    }

    #[test]
    fn merge_backfills_missing_fields_without_overwriting() {
        let newer = client_batch(
            "clients_a.csv",
            V1_HEADERS,
            &[&["C00001", "Acme", "active", "", "2024-06-01", "USD"]],
        );
        let older = client_batch(
            "clients_b.csv",
            V1_HEADERS,
            &[&["C00001", "Acme", "inactive", "GOLD", "2023-01-01", "USD"]],
        );
        let merged = reconcile_clients(&[newer, older]);
        assert_eq!(merged.len(), 1);
        // Base is the newer/active row; tier arrives by backfill only.
        assert_eq!(merged[0].status, Status::Active);
        assert_eq!(merged[0].tier, "GOLD");
    }

    #[test]
    fn backfill_never_replaces_an_existing_tier() {
        let newer = client_batch(
            "clients_a.csv",
            V1_HEADERS,
            &[&["C00001", "Acme", "active", "SILVER", "2024-06-01", "USD"]],
        );
        let older = client_batch(
            "clients_b.csv",
            V1_HEADERS,
            &[&["C00001", "Acme", "active", "GOLD", "2023-01-01", "USD"]],
        );
        let merged = reconcile_clients(&[newer, older]);
        assert_eq!(merged[0].tier, "SILVER");
    }

    #[test]
    fn valid_id_and_name_fallback_keys_stay_separate() {
        let id_keyed = client_batch(
            "clients_a.csv",
            V1_HEADERS,
            &[&["C00001", "Acme Shipping", "active", "GOLD", "2024-01-01", "USD"]],
        );
        let name_keyed = client_batch(
            "clients_b.csv",
            &["client_id", "client_name", "status", "created_at"],
            &[&["", "acme   shipping", "", "2023-01-01"]],
        );
        let merged = reconcile_clients(&[id_keyed, name_keyed]);
        // The nameless-id row has merge key "ACME SHIPPING"; it only merges
        // with the id-keyed row if their keys differ, so both records exist.
        assert_eq!(merged.len(), 2);
        let fallback = merged
            .iter()
            .find(|c| c.client_id == "ACME SHIPPING")
            .expect("fallback-keyed record");
        assert_eq!(fallback.client_name.as_deref(), Some("ACME SHIPPING"));
    }

    #[test]
    fn invalid_id_groups_under_name_and_keeps_fallback_key() {
        let batch = client_batch(
            "clients_a.csv",
            V1_HEADERS,
            &[
                &["BAD-1", "Globex", "active", "", "2024-01-01", "USD"],
                &["", "Globex", "inactive", "SILVER", "2023-01-01", "USD"],
            ],
        );
        let merged = reconcile_clients(&[batch]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].client_id, "GLOBEX");
        assert_eq!(merged[0].tier, "SILVER");
        assert_eq!(merged[0].status, Status::Active);
    }

    #[test]
    fn client_fields_are_uppercased() {
        let batch = client_batch(
            "clients_a.csv",
            V1_HEADERS,
            &[&["c00004", "initech llc", "active", "gold", "2024-01-01", "usd"]],
        );
        let merged = reconcile_clients(&[batch]);
        assert_eq!(merged[0].client_id, "C00004");
        assert_eq!(merged[0].client_name.as_deref(), Some("INITECH LLC"));
        assert_eq!(merged[0].tier, "GOLD");
        assert_eq!(merged[0].currency, "USD");
    }

    #[test]
    fn reconciliation_is_deterministic_across_runs() {
        let batches = || {
            vec![client_batch(
                "clients_a.csv",
                V1_HEADERS,
                &[
                    &["C00001", "Acme", "active", "GOLD", "2024-01-01", "USD"],
                    &["C00002", "Globex", "inactive", "", "2023-05-01", "EUR"],
                ],
            )]
        };
        let first = reconcile_clients(&batches());
        let second = reconcile_clients(&batches());
        assert_eq!(first, second);
        assert_eq!(first[0].row_hash, second[0].row_hash);
    }

    fn invoice_batch(source: &str, rows: &[&[&str]]) -> RawBatch {
        RawBatch {
            source: source.to_string(),
            headers: [
                "invoice_id",
                "client_id",
                "client_name",
                "invoice_date",
                "amount",
                "currency",
                "shipment_type",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn invoice_duplicates_keep_first_across_files() {
        let first = invoice_batch(
            "invoices_a.csv",
            &[&["INV-1", "C00001", "", "2024-01-15", "100.00", "USD", "ground"]],
        );
        let second = invoice_batch(
            "invoices_b.csv",
            &[&["INV-1", "C00001", "", "2024-02-20", "999.99", "USD", "express"]],
        );
        let merged = reconcile_invoices(&[first, second]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].amount, 100.0);
        assert_eq!(merged[0].shipment_type, ShipmentType::Ground);
    }

    #[test]
    fn invoice_amount_and_shipment_are_normalized() {
        let batch = invoice_batch(
            "invoices_a.csv",
            &[
                &["inv-2", "c00001", "", "2024-03-01", "$1,234.56", "usd", "2 Day"],
                &["INV-3", "", "acme co", "2024-03-02", "garbage", "", "bicycle"],
            ],
        );
        let merged = reconcile_invoices(&[batch]);
        assert_eq!(merged[0].invoice_id.as_deref(), Some("INV-2"));
        assert_eq!(merged[0].amount, 1234.56);
        assert_eq!(merged[0].shipment_type, ShipmentType::TwoDay);
        assert_eq!(merged[1].amount, 0.0);
        assert_eq!(merged[1].shipment_type, ShipmentType::Unknown);
        assert_eq!(merged[1].client_name.as_deref(), Some("ACME CO"));
        assert_eq!(merged[1].currency, "USD");
    }
}
