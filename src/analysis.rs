//! Read-only analytical aggregations over the fact table.
//!
//! Four fixed business questions plus summary statistics. All of them are
//! pure functions of the fact rows and the rate sheet; nothing here touches
//! the store or mutates shared state, so scenarios can be re-run with
//! substitute tables in tests. Rows with a null `calculated_cost` (unknown
//! shipment types) contribute to counts but not to cost sums, mirroring how
//! SQL aggregates skip NULL.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use log::info;

use crate::{
    config::RateSheet,
    model::{FactRecord, ShipmentType},
};

/// Growth analysis only considers invoices issued inside this window.
pub const GROWTH_WINDOW_START: (i32, u32) = (2024, 1);
pub const GROWTH_WINDOW_END: (i32, u32) = (2026, 1);
/// Maximum growth rows surfaced in the report.
const GROWTH_ROW_LIMIT: usize = 20;
/// Discount ranking depth used for the savings insights.
const DISCOUNT_RANKING_DEPTH: usize = 10;
/// Reclassification flags: savings share of total spend, absolute savings.
const RECLASS_PERCENT_THRESHOLD: f64 = 50.0;
const RECLASS_SAVINGS_THRESHOLD: f64 = 500_000.0;

#[derive(Debug, Clone)]
pub struct ClientSpendRow {
    pub client_id: String,
    pub client_name: String,
    pub client_status: String,
    pub total_cost: f64,
    pub invoice_count: usize,
    pub avg_invoice_cost: f64,
}

#[derive(Debug, Clone)]
pub struct TopClients {
    pub rows: Vec<ClientSpendRow>,
    pub insights: Vec<String>,
}

impl TopClients {
    pub const COLUMNS: &'static [&'static str] = &[
        "client_id",
        "client_name",
        "client_status",
        "total_cost",
        "invoice_count",
        "avg_invoice_cost",
    ];

    pub fn table_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                vec![
                    row.client_id.clone(),
                    row.client_name.clone(),
                    row.client_status.clone(),
                    format_money(row.total_cost),
                    row.invoice_count.to_string(),
                    format_money(row.avg_invoice_cost),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct GrowthRow {
    pub client_id: String,
    pub client_name: String,
    pub month: NaiveDate,
    pub monthly_cost: f64,
    pub prev_month_cost: f64,
    pub monthly_invoices: usize,
    pub prev_month_invoices: usize,
    /// `None` when the preceding month's total is zero.
    pub growth_percentage: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MonthlyGrowth {
    pub rows: Vec<GrowthRow>,
    pub insights: Vec<String>,
}

impl MonthlyGrowth {
    pub const COLUMNS: &'static [&'static str] = &[
        "client_id",
        "client_name",
        "month",
        "monthly_cost",
        "prev_month_cost",
        "monthly_invoices",
        "prev_month_invoices",
        "growth_percentage",
    ];

    pub fn table_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                vec![
                    row.client_id.clone(),
                    row.client_name.clone(),
                    row.month.format("%Y-%m").to_string(),
                    format_money(row.monthly_cost),
                    format_money(row.prev_month_cost),
                    row.monthly_invoices.to_string(),
                    row.prev_month_invoices.to_string(),
                    row.growth_percentage
                        .map(|pct| format!("{pct:+.1}%"))
                        .unwrap_or_default(),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct DiscountRow {
    pub client_id: String,
    pub client_name: String,
    pub total_original: f64,
    pub total_discounted: f64,
    pub total_savings: f64,
    pub savings_percentage: f64,
    pub total_shipments: usize,
}

#[derive(Debug, Clone)]
pub struct DiscountScenario {
    pub rows: Vec<DiscountRow>,
    pub insights: Vec<String>,
}

impl DiscountScenario {
    pub const COLUMNS: &'static [&'static str] = &[
        "client_id",
        "client_name",
        "original_cost",
        "discounted_cost",
        "total_savings",
        "savings_percentage",
        "total_shipments",
    ];

    pub fn table_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                vec![
                    row.client_id.clone(),
                    row.client_name.clone(),
                    format_money(row.total_original),
                    format_money(row.total_discounted),
                    format_money(row.total_savings),
                    format!("{:.1}%", row.savings_percentage),
                    row.total_shipments.to_string(),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ReclassRow {
    pub client_id: String,
    pub client_name: String,
    pub express_shipments: usize,
    pub express_cost: f64,
    pub ground_equivalent_cost: f64,
    pub total_savings: f64,
    pub savings_percentage: f64,
    pub over_50_percent_savings: bool,
    pub over_500k_savings: bool,
    pub total_cost: f64,
}

#[derive(Debug, Clone)]
pub struct ReclassificationScenario {
    pub rows: Vec<ReclassRow>,
    pub clients_over_50_percent: Vec<String>,
    pub clients_over_500k: Vec<String>,
    pub total_potential_savings: f64,
    pub insights: Vec<String>,
}

impl ReclassificationScenario {
    pub const COLUMNS: &'static [&'static str] = &[
        "client_id",
        "client_name",
        "express_shipments",
        "express_cost",
        "ground_equivalent_cost",
        "total_savings",
        "savings_percentage",
        "over_50_percent",
        "over_500k",
        "total_cost",
    ];

    pub fn table_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                vec![
                    row.client_id.clone(),
                    row.client_name.clone(),
                    row.express_shipments.to_string(),
                    format_money(row.express_cost),
                    format_money(row.ground_equivalent_cost),
                    format_money(row.total_savings),
                    format!("{:.1}%", row.savings_percentage),
                    yes_no(row.over_50_percent_savings),
                    yes_no(row.over_500k_savings),
                    format_money(row.total_cost),
                ]
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ShipmentBreakdownRow {
    pub shipment_type: ShipmentType,
    pub shipment_count: usize,
    pub shipment_costs: f64,
    pub avg_shipment_cost: f64,
}

#[derive(Debug, Clone)]
pub struct SummaryStats {
    pub unique_clients: usize,
    pub unique_invoices: usize,
    pub total_costs: f64,
    pub average_invoice_cost: f64,
    pub earliest_invoice: Option<NaiveDate>,
    pub latest_invoice: Option<NaiveDate>,
    pub unique_shipment_types: usize,
    pub shipment_breakdown: Vec<ShipmentBreakdownRow>,
    pub insights: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub summary: SummaryStats,
    pub top_clients: TopClients,
    pub growth: MonthlyGrowth,
    pub discounts: DiscountScenario,
    pub reclassification: ReclassificationScenario,
}

/// Runs every aggregation. `top` bounds the top-spender rankings.
pub fn run_all(facts: &[FactRecord], rates: &RateSheet, top: usize) -> AnalysisReport {
    info!("Running business analysis over {} fact record(s)", facts.len());
    AnalysisReport {
        summary: summary_statistics(facts),
        top_clients: top_clients(facts, top),
        growth: month_over_month_growth(facts),
        discounts: discount_scenario(facts, rates, top),
        reclassification: reclassification_scenario(facts, rates),
    }
}

fn attributed<'a>(facts: &'a [FactRecord]) -> impl Iterator<Item = (&'a str, &'a FactRecord)> {
    facts
        .iter()
        .filter_map(|fact| fact.client_id.as_deref().map(|id| (id, fact)))
}

fn display_name(fact: &FactRecord) -> String {
    fact.client_name.clone().unwrap_or_default()
}

fn desc_by_f64(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Query 1: top clients by total calculated cost.
pub fn top_clients(facts: &[FactRecord], top: usize) -> TopClients {
    #[derive(Default)]
    struct Acc {
        name: String,
        status: String,
        total: f64,
        costed: usize,
        invoices: usize,
    }

    let mut groups: BTreeMap<String, Acc> = BTreeMap::new();
    for (client_id, fact) in attributed(facts) {
        let acc = groups.entry(client_id.to_string()).or_default();
        if acc.name.is_empty() {
            acc.name = display_name(fact);
        }
        if acc.status.is_empty()
            && let Some(status) = fact.client_status
        {
            acc.status = status.as_str().to_string();
        }
        acc.invoices += 1;
        if let Some(cost) = fact.calculated_cost {
            acc.total += cost;
            acc.costed += 1;
        }
    }

    let mut rows: Vec<ClientSpendRow> = groups
        .into_iter()
        .map(|(client_id, acc)| ClientSpendRow {
            client_id,
            client_name: acc.name,
            client_status: acc.status,
            total_cost: acc.total,
            invoice_count: acc.invoices,
            avg_invoice_cost: if acc.costed > 0 {
                acc.total / acc.costed as f64
            } else {
                0.0
            },
        })
        .collect();
    rows.sort_by(|a, b| {
        desc_by_f64(a.total_cost, b.total_cost).then_with(|| a.client_id.cmp(&b.client_id))
    });
    rows.truncate(top);

    let mut insights = Vec::new();
    if let Some(leader) = rows.first() {
        insights.push(format!(
            "Top client: {} with ${} in costs",
            leader.client_name,
            format_money(leader.total_cost)
        ));
        let combined: f64 = rows.iter().map(|row| row.total_cost).sum();
        insights.push(format!(
            "Total costs from top {}: ${}",
            rows.len(),
            format_money(combined)
        ));
        let invoices: usize = rows.iter().map(|row| row.invoice_count).sum();
        insights.push(format!(
            "Average invoices per top client: {:.1}",
            invoices as f64 / rows.len() as f64
        ));
    }

    TopClients { rows, insights }
}

fn month_of(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("first of month is valid")
}

fn previous_month(month: NaiveDate) -> NaiveDate {
    if month.month() == 1 {
        NaiveDate::from_ymd_opt(month.year() - 1, 12, 1)
    } else {
        NaiveDate::from_ymd_opt(month.year(), month.month() - 1, 1)
    }
    .expect("first of month is valid")
}

fn in_growth_window(date: NaiveDate) -> bool {
    let start = NaiveDate::from_ymd_opt(GROWTH_WINDOW_START.0, GROWTH_WINDOW_START.1, 1)
        .expect("window start is valid");
    let end = NaiveDate::from_ymd_opt(GROWTH_WINDOW_END.0, GROWTH_WINDOW_END.1, 1)
        .expect("window end is valid");
    date >= start && date < end
}

/// Query 2: month-over-month cost growth per client. A month only produces a
/// row when the immediately preceding calendar month has a total; growth is
/// null when that total is zero.
pub fn month_over_month_growth(facts: &[FactRecord]) -> MonthlyGrowth {
    #[derive(Default)]
    struct MonthAcc {
        name: String,
        total: f64,
        invoices: usize,
    }

    let mut monthly: BTreeMap<(String, NaiveDate), MonthAcc> = BTreeMap::new();
    for (client_id, fact) in attributed(facts) {
        let Some(date) = fact.invoice_date else {
            continue;
        };
        if !in_growth_window(date) {
            continue;
        }
        let acc = monthly
            .entry((client_id.to_string(), month_of(date)))
            .or_default();
        if acc.name.is_empty() {
            acc.name = display_name(fact);
        }
        acc.invoices += 1;
        if let Some(cost) = fact.calculated_cost {
            acc.total += cost;
        }
    }

    // BTreeMap ordering gives (client_id, month) ascending, which is the
    // report order; the previous calendar month is a direct lookup.
    let mut rows = Vec::new();
    for ((client_id, month), acc) in &monthly {
        let prev_key = (client_id.clone(), previous_month(*month));
        let Some(prev) = monthly.get(&prev_key) else {
            continue;
        };
        let growth = if prev.total == 0.0 {
            None
        } else {
            Some((acc.total - prev.total) / prev.total * 100.0)
        };
        rows.push(GrowthRow {
            client_id: client_id.clone(),
            client_name: acc.name.clone(),
            month: *month,
            monthly_cost: acc.total,
            prev_month_cost: prev.total,
            monthly_invoices: acc.invoices,
            prev_month_invoices: prev.invoices,
            growth_percentage: growth,
        });
        if rows.len() >= GROWTH_ROW_LIMIT {
            break;
        }
    }

    let growth_values: Vec<f64> = rows.iter().filter_map(|row| row.growth_percentage).collect();
    let positive = growth_values.iter().filter(|pct| **pct > 0.0).count();
    let negative = growth_values.iter().filter(|pct| **pct < 0.0).count();
    let mut insights = vec![
        format!("Periods with positive growth: {positive}"),
        format!("Periods with negative growth: {negative}"),
    ];
    if !growth_values.is_empty() {
        let min = growth_values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = growth_values
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        insights.push(format!("Growth rate range: {min:.1}% to {max:.1}%"));
    }

    MonthlyGrowth { rows, insights }
}

/// Query 3: re-rank client spend after applying the per-shipment-type
/// discounts from the rate sheet.
pub fn discount_scenario(facts: &[FactRecord], rates: &RateSheet, top: usize) -> DiscountScenario {
    #[derive(Default)]
    struct Acc {
        name: String,
        original: f64,
        discounted: f64,
        shipments: usize,
    }

    let mut groups: BTreeMap<String, Acc> = BTreeMap::new();
    for (client_id, fact) in attributed(facts) {
        let acc = groups.entry(client_id.to_string()).or_default();
        if acc.name.is_empty() {
            acc.name = display_name(fact);
        }
        acc.shipments += 1;
        if let Some(cost) = fact.calculated_cost {
            acc.original += cost;
            acc.discounted += cost * (1.0 - rates.discount_for(fact.shipment_type));
        }
    }

    let mut ranked: Vec<DiscountRow> = groups
        .into_iter()
        .map(|(client_id, acc)| {
            let savings = acc.original - acc.discounted;
            DiscountRow {
                client_id,
                client_name: acc.name,
                total_original: acc.original,
                total_discounted: acc.discounted,
                total_savings: savings,
                savings_percentage: if acc.original != 0.0 {
                    savings / acc.original * 100.0
                } else {
                    0.0
                },
                total_shipments: acc.shipments,
            }
        })
        .collect();
    ranked.sort_by(|a, b| {
        desc_by_f64(a.total_discounted, b.total_discounted)
            .then_with(|| a.client_id.cmp(&b.client_id))
    });
    ranked.truncate(DISCOUNT_RANKING_DEPTH.max(top));

    let total_savings: f64 = ranked.iter().map(|row| row.total_savings).sum();
    let total_original: f64 = ranked.iter().map(|row| row.total_original).sum();
    let mut insights = Vec::new();
    if let Some(leader) = ranked.first() {
        insights.push(format!(
            "Total savings for top {} clients: ${}",
            ranked.len(),
            format_money(total_savings)
        ));
        if total_original != 0.0 {
            insights.push(format!(
                "Average savings percentage: {:.1}%",
                total_savings / total_original * 100.0
            ));
        }
        insights.push(format!(
            "New #1 spender after discounts: {} (${})",
            leader.client_name,
            format_money(leader.total_discounted)
        ));
    }

    let mut rows = ranked;
    rows.truncate(top);
    DiscountScenario { rows, insights }
}

/// Query 4: savings from re-billing every EXPRESS shipment at the GROUND
/// rate, with threshold flags per client.
pub fn reclassification_scenario(
    facts: &[FactRecord],
    rates: &RateSheet,
) -> ReclassificationScenario {
    #[derive(Default)]
    struct Acc {
        name: String,
        express_shipments: usize,
        express_cost: f64,
        total_cost: f64,
    }

    let ratio = rates.ground_equivalent_ratio();
    let mut groups: BTreeMap<String, Acc> = BTreeMap::new();
    for (client_id, fact) in attributed(facts) {
        let acc = groups.entry(client_id.to_string()).or_default();
        if acc.name.is_empty() {
            acc.name = display_name(fact);
        }
        if fact.shipment_type == ShipmentType::Express {
            acc.express_shipments += 1;
        }
        if let Some(cost) = fact.calculated_cost {
            acc.total_cost += cost;
            if fact.shipment_type == ShipmentType::Express {
                acc.express_cost += cost;
            }
        }
    }

    let mut rows: Vec<ReclassRow> = groups
        .into_iter()
        .filter(|(_, acc)| acc.express_shipments > 0)
        .map(|(client_id, acc)| {
            let ground_equivalent = acc.express_cost * ratio;
            let savings = acc.express_cost - ground_equivalent;
            let savings_percentage = if acc.total_cost != 0.0 {
                savings / acc.total_cost * 100.0
            } else {
                0.0
            };
            ReclassRow {
                client_id,
                client_name: acc.name,
                express_shipments: acc.express_shipments,
                express_cost: acc.express_cost,
                ground_equivalent_cost: ground_equivalent,
                total_savings: savings,
                savings_percentage,
                over_50_percent_savings: savings_percentage > RECLASS_PERCENT_THRESHOLD,
                over_500k_savings: savings > RECLASS_SAVINGS_THRESHOLD,
                total_cost: acc.total_cost,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        desc_by_f64(a.total_savings, b.total_savings).then_with(|| a.client_id.cmp(&b.client_id))
    });

    let total_potential_savings: f64 = rows.iter().map(|row| row.total_savings).sum();
    let clients_over_50_percent: Vec<String> = rows
        .iter()
        .filter(|row| row.over_50_percent_savings)
        .map(|row| row.client_name.clone())
        .collect();
    let clients_over_500k: Vec<String> = rows
        .iter()
        .filter(|row| row.over_500k_savings)
        .map(|row| row.client_name.clone())
        .collect();

    let mut insights = vec![
        format!(
            "Total potential savings across all clients: ${}",
            format_money(total_potential_savings)
        ),
        format!(
            "Clients with >{RECLASS_PERCENT_THRESHOLD:.0}% savings: {} clients",
            clients_over_50_percent.len()
        ),
        format!(
            "Clients with >${} savings: {} clients",
            format_money(RECLASS_SAVINGS_THRESHOLD),
            clients_over_500k.len()
        ),
    ];
    if let Some(leader) = rows.first() {
        insights.push(format!(
            "Biggest savings opportunity: {} (${})",
            leader.client_name,
            format_money(leader.total_savings)
        ));
    }

    rows.truncate(10);
    ReclassificationScenario {
        rows,
        clients_over_50_percent,
        clients_over_500k,
        total_potential_savings,
        insights,
    }
}

/// Overall pipeline statistics plus a per-shipment-type breakdown.
pub fn summary_statistics(facts: &[FactRecord]) -> SummaryStats {
    let unique_clients = facts
        .iter()
        .filter_map(|fact| fact.client_id.as_deref())
        .collect::<BTreeSet<_>>()
        .len();
    let unique_invoices = facts
        .iter()
        .map(|fact| fact.invoice_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    let costs: Vec<f64> = facts.iter().filter_map(|fact| fact.calculated_cost).collect();
    let total_costs: f64 = costs.iter().sum();
    let average_invoice_cost = if costs.is_empty() {
        0.0
    } else {
        total_costs / costs.len() as f64
    };
    let earliest_invoice = facts.iter().filter_map(|fact| fact.invoice_date).min();
    let latest_invoice = facts.iter().filter_map(|fact| fact.invoice_date).max();

    #[derive(Default)]
    struct Acc {
        count: usize,
        costs: f64,
        costed: usize,
    }
    let mut by_type: BTreeMap<ShipmentType, Acc> = BTreeMap::new();
    for fact in facts {
        let acc = by_type.entry(fact.shipment_type).or_default();
        acc.count += 1;
        if let Some(cost) = fact.calculated_cost {
            acc.costs += cost;
            acc.costed += 1;
        }
    }
    let mut shipment_breakdown: Vec<ShipmentBreakdownRow> = by_type
        .into_iter()
        .map(|(shipment_type, acc)| ShipmentBreakdownRow {
            shipment_type,
            shipment_count: acc.count,
            shipment_costs: acc.costs,
            avg_shipment_cost: if acc.costed > 0 {
                acc.costs / acc.costed as f64
            } else {
                0.0
            },
        })
        .collect();
    shipment_breakdown.sort_by(|a, b| desc_by_f64(a.shipment_costs, b.shipment_costs));

    let mut insights = vec![
        format!("Data covers {unique_clients} unique clients and {unique_invoices} invoices"),
        format!(
            "Total calculated costs processed: ${}",
            format_money(total_costs)
        ),
        format!(
            "Average invoice cost: ${}",
            format_money(average_invoice_cost)
        ),
    ];
    if let Some(leader) = shipment_breakdown.first() {
        insights.push(format!(
            "Most valuable shipment type: {} (${})",
            leader.shipment_type,
            format_money(leader.shipment_costs)
        ));
    }

    SummaryStats {
        unique_clients,
        unique_invoices,
        total_costs,
        average_invoice_cost,
        earliest_invoice,
        latest_invoice,
        unique_shipment_types: shipment_breakdown.len(),
        shipment_breakdown,
        insights,
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "YES" } else { "NO" }.to_string()
}

/// `1234567.891` → `"1,234,567.89"`.
pub fn format_money(value: f64) -> String {
    let negative = value < 0.0;
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').expect("fixed format has a decimal point");
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx).is_multiple_of(3) {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;

    fn fact(
        client_id: &str,
        name: &str,
        invoice_id: &str,
        date: (i32, u32, u32),
        amount: f64,
        st: ShipmentType,
        rates: &RateSheet,
    ) -> FactRecord {
        let rate = rates.rate_for(st);
        FactRecord {
            client_id: Some(client_id.to_string()),
            client_name: Some(name.to_string()),
            client_status: Some(Status::Active),
            client_tier: Some("GOLD".to_string()),
            invoice_id: invoice_id.to_string(),
            invoice_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            invoice_amount: amount,
            shipment_type: st,
            rate_per_unit: rate,
            calculated_cost: rate.map(|r| amount * r),
        }
    }

    #[test]
    fn top_clients_rank_by_total_cost() {
        let rates = RateSheet::default();
        let facts = vec![
            fact("C00001", "ACME", "I1", (2024, 1, 10), 100.0, ShipmentType::Ground, &rates),
            fact("C00002", "GLOBEX", "I2", (2024, 1, 11), 100.0, ShipmentType::Express, &rates),
            fact("C00001", "ACME", "I3", (2024, 1, 12), 50.0, ShipmentType::Ground, &rates),
        ];
        let result = top_clients(&facts, 5);
        assert_eq!(result.rows[0].client_id, "C00002");
        assert_eq!(result.rows[0].total_cost, 1000.0);
        assert_eq!(result.rows[1].client_id, "C00001");
        assert_eq!(result.rows[1].total_cost, 150.0);
        assert_eq!(result.rows[1].invoice_count, 2);
        assert_eq!(result.rows[1].avg_invoice_cost, 75.0);
    }

    #[test]
    fn growth_requires_the_immediately_preceding_month() {
        let rates = RateSheet::default();
        let facts = vec![
            fact("C00001", "ACME", "I1", (2024, 1, 5), 100.0, ShipmentType::Ground, &rates),
            fact("C00001", "ACME", "I2", (2024, 2, 5), 150.0, ShipmentType::Ground, &rates),
            // Gap: no March. April must not produce a growth row.
            fact("C00001", "ACME", "I3", (2024, 4, 5), 300.0, ShipmentType::Ground, &rates),
        ];
        let result = month_over_month_growth(&facts);
        assert_eq!(result.rows.len(), 1);
        let row = &result.rows[0];
        assert_eq!(row.month, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(row.prev_month_cost, 100.0);
        assert_eq!(row.growth_percentage, Some(50.0));
    }

    #[test]
    fn growth_ignores_invoices_outside_the_window() {
        let rates = RateSheet::default();
        let facts = vec![
            fact("C00001", "ACME", "I1", (2023, 11, 5), 100.0, ShipmentType::Ground, &rates),
            fact("C00001", "ACME", "I2", (2023, 12, 5), 150.0, ShipmentType::Ground, &rates),
        ];
        let result = month_over_month_growth(&facts);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn growth_is_null_when_previous_month_total_is_zero() {
        let rates = RateSheet::default();
        let facts = vec![
            // UNKNOWN shipment: counted, but contributes no cost.
            fact("C00001", "ACME", "I1", (2024, 1, 5), 100.0, ShipmentType::Unknown, &rates),
            fact("C00001", "ACME", "I2", (2024, 2, 5), 150.0, ShipmentType::Ground, &rates),
        ];
        let result = month_over_month_growth(&facts);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].growth_percentage, None);
        assert_eq!(result.rows[0].prev_month_invoices, 1);
    }

    #[test]
    fn discount_scenario_applies_published_discounts() {
        let rates = RateSheet::default();
        let facts = vec![fact(
            "C00001",
            "ACME",
            "I1",
            (2024, 1, 5),
            1000.0,
            ShipmentType::Ground,
            &rates,
        )];
        let result = discount_scenario(&facts, &rates, 5);
        let row = &result.rows[0];
        assert_eq!(row.total_original, 1000.0);
        assert_eq!(row.total_discounted, 800.0);
        assert_eq!(row.total_savings, 200.0);
        assert_eq!(row.savings_percentage, 20.0);
    }

    #[test]
    fn discount_scenario_reranks_clients() {
        let rates = RateSheet::default();
        let facts = vec![
            // 2DAY gets 50% off: 500 -> 250 after discount.
            fact("C00001", "ACME", "I1", (2024, 1, 5), 100.0, ShipmentType::TwoDay, &rates),
            // GROUND gets 20% off: 400 -> 320 after discount.
            fact("C00002", "GLOBEX", "I2", (2024, 1, 6), 400.0, ShipmentType::Ground, &rates),
        ];
        let result = discount_scenario(&facts, &rates, 5);
        assert_eq!(result.rows[0].client_id, "C00002");
        assert_eq!(result.rows[0].total_discounted, 320.0);
        assert_eq!(result.rows[1].total_discounted, 250.0);
    }

    #[test]
    fn reclassification_flags_over_fifty_percent() {
        let rates = RateSheet::default();
        let facts = vec![fact(
            "C00001",
            "ACME",
            "I1",
            (2024, 1, 5),
            100.0,
            ShipmentType::Express,
            &rates,
        )];
        let result = reclassification_scenario(&facts, &rates);
        let row = &result.rows[0];
        assert_eq!(row.express_cost, 1000.0);
        assert_eq!(row.ground_equivalent_cost, 100.0);
        assert_eq!(row.total_savings, 900.0);
        assert_eq!(row.savings_percentage, 90.0);
        assert!(row.over_50_percent_savings);
        assert!(!row.over_500k_savings);
        assert_eq!(result.clients_over_50_percent, vec!["ACME".to_string()]);
    }

    #[test]
    fn reclassification_skips_clients_without_express() {
        let rates = RateSheet::default();
        let facts = vec![fact(
            "C00001",
            "ACME",
            "I1",
            (2024, 1, 5),
            100.0,
            ShipmentType::Ground,
            &rates,
        )];
        let result = reclassification_scenario(&facts, &rates);
        assert!(result.rows.is_empty());
        assert_eq!(result.total_potential_savings, 0.0);
    }

    #[test]
    fn summary_counts_distinct_entities_and_types() {
        let rates = RateSheet::default();
        let facts = vec![
            fact("C00001", "ACME", "I1", (2024, 1, 5), 100.0, ShipmentType::Ground, &rates),
            fact("C00001", "ACME", "I2", (2024, 3, 5), 100.0, ShipmentType::Express, &rates),
            fact("C00002", "GLOBEX", "I3", (2024, 2, 5), 100.0, ShipmentType::Ground, &rates),
        ];
        let stats = summary_statistics(&facts);
        assert_eq!(stats.unique_clients, 2);
        assert_eq!(stats.unique_invoices, 3);
        assert_eq!(stats.total_costs, 1200.0);
        assert_eq!(stats.unique_shipment_types, 2);
        assert_eq!(stats.earliest_invoice, NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(stats.latest_invoice, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(stats.shipment_breakdown[0].shipment_type, ShipmentType::Express);
    }

    #[test]
    fn format_money_groups_thousands() {
        assert_eq!(format_money(1234567.891), "1,234,567.89");
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(-9876.5), "-9,876.50");
        assert_eq!(format_money(999.0), "999.00");
    }
}
