//! Canonical record types shared across the pipeline.
//!
//! Source rows arrive in several mutually-incompatible schemas; once a row has
//! passed through the schema mapper and the field normalizers it is expressed
//! as one of the types here. [`ClientRecord`] and [`InvoiceRecord`] are the
//! persisted canonical entities, [`FactRecord`] is the derived join of the two
//! and is always rebuilt from scratch, never edited in place.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fingerprint;

/// Client activity status. `Unknown` doubles as the "no usable value" sentinel
/// and is treated as backfillable during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Active,
    Inactive,
    Unknown,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "ACTIVE",
            Status::Inactive => "INACTIVE",
            Status::Unknown => "UNKNOWN",
        }
    }

    /// Preference order used by the reconciler when two rows describe the same
    /// client: ACTIVE beats INACTIVE beats UNKNOWN.
    pub fn rank(&self) -> u8 {
        match self {
            Status::Active => 2,
            Status::Inactive => 1,
            Status::Unknown => 0,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShipmentType {
    #[serde(rename = "GROUND")]
    Ground,
    #[serde(rename = "2DAY")]
    TwoDay,
    #[serde(rename = "EXPRESS")]
    Express,
    #[serde(rename = "FREIGHT")]
    Freight,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl ShipmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentType::Ground => "GROUND",
            ShipmentType::TwoDay => "2DAY",
            ShipmentType::Express => "EXPRESS",
            ShipmentType::Freight => "FREIGHT",
            ShipmentType::Unknown => "UNKNOWN",
        }
    }

    /// The four billable codes, in rate-sheet order.
    pub fn billable() -> &'static [ShipmentType] {
        &[
            ShipmentType::Ground,
            ShipmentType::TwoDay,
            ShipmentType::Express,
            ShipmentType::Freight,
        ]
    }
}

impl fmt::Display for ShipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ShipmentType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GROUND" => Ok(ShipmentType::Ground),
            "2DAY" => Ok(ShipmentType::TwoDay),
            "EXPRESS" => Ok(ShipmentType::Express),
            "FREIGHT" => Ok(ShipmentType::Freight),
            "UNKNOWN" => Ok(ShipmentType::Unknown),
            other => Err(anyhow!("Unknown shipment type '{other}'")),
        }
    }
}

/// One reconciled client. Exactly one record exists per merge key after
/// reconciliation; `client_id` is either a valid `C#####` identifier or the
/// opaque fallback key the record was merged under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub client_id: String,
    pub client_name: Option<String>,
    pub status: Status,
    pub tier: String,
    pub created_at: Option<NaiveDate>,
    pub currency: String,
    pub row_hash: String,
}

impl ClientRecord {
    /// Content hash over the six canonical fields, field names sorted.
    pub fn fingerprint(&self) -> String {
        fingerprint::digest(&[
            ("client_id", Some(self.client_id.clone())),
            ("client_name", self.client_name.clone()),
            ("created_at", self.created_at.map(format_date)),
            ("currency", Some(self.currency.clone())),
            ("status", Some(self.status.as_str().to_string())),
            ("tier", Some(self.tier.clone())),
        ])
    }
}

/// One reconciled invoice. Invoices are immutable transactional records:
/// duplicates are dropped keep-first, never merged. `invoice_id` is `None`
/// only for source rows that carried no usable identifier; such rows are
/// excluded from fact derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub invoice_id: Option<String>,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub amount: f64,
    pub currency: String,
    pub shipment_type: ShipmentType,
    pub row_hash: String,
}

impl InvoiceRecord {
    pub fn fingerprint(&self) -> String {
        fingerprint::digest(&[
            ("amount", Some(format_amount(self.amount))),
            ("client_id", self.client_id.clone()),
            ("client_name", self.client_name.clone()),
            ("currency", Some(self.currency.clone())),
            ("invoice_date", self.invoice_date.map(format_date)),
            ("invoice_id", self.invoice_id.clone()),
            ("shipment_type", Some(self.shipment_type.as_str().to_string())),
        ])
    }
}

/// One row of the derived fact table: an invoice joined to its client with the
/// billed cost computed from the rate sheet. Owned entirely by fact
/// derivation and rebuilt on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub client_status: Option<Status>,
    pub client_tier: Option<String>,
    pub invoice_id: String,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_amount: f64,
    pub shipment_type: ShipmentType,
    pub rate_per_unit: Option<f64>,
    pub calculated_cost: Option<f64>,
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Canonical rendering of an amount for hashing: fixed two decimal places so
/// `100` and `100.0` fingerprint identically.
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}
