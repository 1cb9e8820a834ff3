//! Fact-table derivation: joining canonical invoices to canonical clients and
//! computing the billed cost.
//!
//! The fact table is a materialized view. Every run clears it and recomputes
//! the full join, so reruns are idempotent by construction rather than by
//! upsert bookkeeping. Client matching prefers an id match; only when the
//! invoice carries no matching id does a case-insensitive name match apply,
//! and a name shared by several clients resolves to the lowest `client_id`.

use std::collections::HashMap;

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::FactsArgs,
    config::RateSheet,
    io_utils,
    model::{ClientRecord, FactRecord, InvoiceRecord, format_date},
    store::{self, Store},
};

pub fn execute(args: &FactsArgs) -> Result<()> {
    let store = Store::open(&args.store).context("Opening store")?;
    let rates = match &args.rates {
        Some(path) => RateSheet::load(path)?,
        None => RateSheet::default(),
    };
    rebuild(&store, &rates)?;
    if let Some(path) = &args.export {
        export_csv(&store, path)?;
    }
    Ok(())
}

/// Joins invoices to clients and computes `calculated_cost = amount × rate`.
/// Invoices without an `invoice_id` are skipped; invoices without a rate for
/// their shipment type get a null rate and null cost.
pub fn derive_facts(
    clients: &[ClientRecord],
    invoices: &[InvoiceRecord],
    rates: &RateSheet,
) -> Vec<FactRecord> {
    let by_id: HashMap<&str, &ClientRecord> = clients
        .iter()
        .map(|client| (client.client_id.as_str(), client))
        .collect();

    let mut by_name: HashMap<String, Vec<&ClientRecord>> = HashMap::new();
    for client in clients {
        if let Some(name) = &client.client_name {
            by_name.entry(name.to_uppercase()).or_default().push(client);
        }
    }
    // Ties on a shared name resolve to the lowest client_id.
    for candidates in by_name.values_mut() {
        candidates.sort_by(|a, b| a.client_id.cmp(&b.client_id));
    }

    let mut facts = Vec::new();
    for invoice in invoices {
        let Some(invoice_id) = &invoice.invoice_id else {
            continue;
        };

        let id_match = invoice
            .client_id
            .as_deref()
            .and_then(|id| by_id.get(id).copied());
        let matched = id_match.or_else(|| {
            invoice
                .client_name
                .as_deref()
                .and_then(|name| by_name.get(&name.to_uppercase()))
                .and_then(|candidates| candidates.first().copied())
        });

        let rate_per_unit = rates.rate_for(invoice.shipment_type);
        let calculated_cost = rate_per_unit.map(|rate| invoice.amount * rate);

        facts.push(FactRecord {
            client_id: matched
                .map(|client| client.client_id.clone())
                .or_else(|| invoice.client_id.clone()),
            client_name: matched
                .and_then(|client| client.client_name.clone())
                .or_else(|| invoice.client_name.clone()),
            client_status: matched.map(|client| client.status),
            client_tier: matched.map(|client| client.tier.clone()),
            invoice_id: invoice_id.clone(),
            invoice_date: invoice.invoice_date,
            invoice_amount: invoice.amount,
            shipment_type: invoice.shipment_type,
            rate_per_unit,
            calculated_cost,
        });
    }
    facts
}

/// Clears and repopulates the fact table from the canonical tables.
pub fn rebuild(store: &Store, rates: &RateSheet) -> Result<usize> {
    let clients: Vec<ClientRecord> = store
        .load(store::CLIENTS_TABLE)
        .context("Loading canonical clients for fact derivation")?;
    let invoices: Vec<InvoiceRecord> = store
        .load(store::INVOICES_TABLE)
        .context("Loading canonical invoices for fact derivation")?;

    let facts = derive_facts(&clients, &invoices, rates);

    store
        .clear(store::FACTS_TABLE)
        .context("Clearing fact table before rebuild")?;
    store
        .upsert(store::FACTS_TABLE, &facts, |fact| {
            store::compound_key(&[fact.client_id.as_deref(), Some(&fact.invoice_id)])
        })
        .context("Writing fact table")?;

    info!("Created {} fact record(s)", facts.len());
    Ok(facts.len())
}

/// Writes the fact table as CSV, for handoff to external tooling.
pub fn export_csv(store: &Store, path: &std::path::Path) -> Result<usize> {
    let facts: Vec<FactRecord> = store
        .load(store::FACTS_TABLE)
        .context("Loading fact table for export")?;
    let delimiter = io_utils::resolve_input_delimiter(path, None);
    let mut writer = io_utils::open_csv_writer(path, delimiter)?;
    writer
        .write_record([
            "client_id",
            "client_name",
            "client_status",
            "client_tier",
            "invoice_id",
            "invoice_date",
            "invoice_amount",
            "shipment_type",
            "rate_per_unit",
            "calculated_cost",
        ])
        .context("Writing fact export header")?;
    for fact in &facts {
        writer
            .write_record([
                fact.client_id.clone().unwrap_or_default(),
                fact.client_name.clone().unwrap_or_default(),
                fact.client_status
                    .map(|status| status.as_str().to_string())
                    .unwrap_or_default(),
                fact.client_tier.clone().unwrap_or_default(),
                fact.invoice_id.clone(),
                fact.invoice_date.map(format_date).unwrap_or_default(),
                format!("{:.2}", fact.invoice_amount),
                fact.shipment_type.as_str().to_string(),
                fact.rate_per_unit
                    .map(|rate| format!("{rate:.2}"))
                    .unwrap_or_default(),
                fact.calculated_cost
                    .map(|cost| format!("{cost:.2}"))
                    .unwrap_or_default(),
            ])
            .context("Writing fact export row")?;
    }
    io_utils::flush_writer(&mut writer)?;
    info!("Exported {} fact record(s) to {:?}", facts.len(), path);
    Ok(facts.len())
}
