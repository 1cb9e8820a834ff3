//! Plain-text rendering of the analysis results.
//!
//! The report layer only formats; every number it prints comes straight from
//! `analysis` result structs. Sections mirror the four business questions
//! plus the summary block.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use log::info;

use crate::{
    analysis::{self, AnalysisReport},
    cli::ReportArgs,
    config::RateSheet,
    model::{FactRecord, format_date},
    store::{self, Store},
    table,
};

const RULE_WIDTH: usize = 80;
const SECTION_RULE_WIDTH: usize = 50;

pub fn execute(args: &ReportArgs) -> Result<()> {
    let store = Store::open(&args.store).context("Opening store")?;
    let rates = match &args.rates {
        Some(path) => RateSheet::load(path)?,
        None => RateSheet::default(),
    };
    let facts: Vec<FactRecord> = store
        .load(store::FACTS_TABLE)
        .context("Loading fact table for reporting")?;
    let report = analysis::run_all(&facts, &rates, args.top);
    print!("{}", render(&report));
    info!("Analysis report complete");
    Ok(())
}

/// Builds the full report as one string; the caller decides where it goes.
pub fn render(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "BILLING RECONCILIATION - ANALYSIS REPORT");
    let _ = writeln!(out, "{rule}");

    section(&mut out, "SUMMARY STATISTICS");
    for insight in &report.summary.insights {
        let _ = writeln!(out, "* {insight}");
    }
    if let (Some(earliest), Some(latest)) =
        (report.summary.earliest_invoice, report.summary.latest_invoice)
    {
        let _ = writeln!(
            out,
            "* Date range: {} to {}",
            format_date(earliest),
            format_date(latest)
        );
    }

    section(&mut out, "QUERY 1: TOP CLIENTS BY COSTS");
    for (idx, row) in report.top_clients.rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} ({}) - ${} ({} invoices)",
            idx + 1,
            row.client_name,
            row.client_id,
            analysis::format_money(row.total_cost),
            row.invoice_count
        );
    }

    section(&mut out, "QUERY 2: MONTH-OVER-MONTH GROWTH ANALYSIS");
    if report.growth.rows.is_empty() {
        let _ = writeln!(out, "No month-over-month growth data available");
    } else {
        for insight in &report.growth.insights {
            let _ = writeln!(out, "* {insight}");
        }
        let _ = writeln!(out, "\nGrowth periods:");
        let _ = write!(
            out,
            "{}",
            table::render_table(
                crate::analysis::MonthlyGrowth::COLUMNS,
                &report.growth.table_rows()
            )
        );
    }

    section(&mut out, "QUERY 3: DISCOUNT SCENARIO - NEW TOP SPENDERS");
    for (idx, row) in report.discounts.rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} - ${} after discounts (saved ${}, {:.1}%)",
            idx + 1,
            row.client_name,
            analysis::format_money(row.total_discounted),
            analysis::format_money(row.total_savings),
            row.savings_percentage
        );
    }
    for insight in &report.discounts.insights {
        let _ = writeln!(out, "* {insight}");
    }

    section(&mut out, "QUERY 4: EXPRESS->GROUND RECLASSIFICATION SAVINGS");
    let reclass = &report.reclassification;
    let _ = writeln!(
        out,
        "Total potential savings: ${}",
        analysis::format_money(reclass.total_potential_savings)
    );
    let _ = writeln!(
        out,
        "Clients with >50% savings: {}",
        reclass.clients_over_50_percent.len()
    );
    let _ = writeln!(
        out,
        "Clients with >$500k savings: {}",
        reclass.clients_over_500k.len()
    );
    if !reclass.clients_over_500k.is_empty() {
        let _ = writeln!(out, "\nClients with >$500k savings opportunity:");
        for client in reclass.clients_over_500k.iter().take(10) {
            let _ = writeln!(out, "  * {client}");
        }
    }
    if !reclass.rows.is_empty() {
        let _ = writeln!(out, "\nPer-client reclassification detail:");
        let _ = write!(
            out,
            "{}",
            table::render_table(
                crate::analysis::ReclassificationScenario::COLUMNS,
                &reclass.table_rows()
            )
        );
    }

    section(&mut out, "SHIPMENT TYPE BREAKDOWN");
    for row in &report.summary.shipment_breakdown {
        let _ = writeln!(
            out,
            "{}: {} shipments, ${} total (avg: ${})",
            row.shipment_type,
            row.shipment_count,
            analysis::format_money(row.shipment_costs),
            analysis::format_money(row.avg_shipment_cost)
        );
    }

    let _ = writeln!(out, "\n{rule}");
    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{title}");
    let _ = writeln!(out, "{}", "-".repeat(SECTION_RULE_WIDTH));
}
