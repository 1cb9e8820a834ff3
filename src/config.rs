//! Static pipeline configuration: the rate sheet, the discount sheet, and the
//! source-file naming conventions.
//!
//! The tables are plain values passed explicitly into fact derivation and the
//! scenario aggregations rather than ambient globals, so tests can substitute
//! alternates. A YAML override file can replace either table wholesale.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::ShipmentType;

/// Filename prefix for client source files (`clients*.csv`).
pub const CLIENT_FILE_PREFIX: &str = "clients";
/// Filename prefix for invoice source files (`invoices*.csv`).
pub const INVOICE_FILE_PREFIX: &str = "invoices";

/// Billing rates and scenario discounts, keyed by canonical shipment code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSheet {
    #[serde(default = "default_rates")]
    pub rates: BTreeMap<String, f64>,
    #[serde(default = "default_discounts")]
    pub discounts: BTreeMap<String, f64>,
}

impl Default for RateSheet {
    fn default() -> Self {
        RateSheet {
            rates: default_rates(),
            discounts: default_discounts(),
        }
    }
}

impl RateSheet {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening rate sheet {path:?}"))?;
        let reader = BufReader::new(file);
        let sheet: RateSheet =
            serde_yaml::from_reader(reader).context("Parsing rate sheet YAML")?;
        Ok(sheet)
    }

    /// Billing rate for a shipment type; `None` for anything outside the
    /// sheet, which propagates into a null calculated cost.
    pub fn rate_for(&self, shipment_type: ShipmentType) -> Option<f64> {
        self.rates.get(shipment_type.as_str()).copied()
    }

    /// Scenario discount fraction for a shipment type; types without a
    /// configured discount are charged in full.
    pub fn discount_for(&self, shipment_type: ShipmentType) -> f64 {
        self.discounts
            .get(shipment_type.as_str())
            .copied()
            .unwrap_or(0.0)
    }

    /// Cost multiplier for re-billing an EXPRESS shipment at the GROUND rate.
    /// With the default sheet this is 1.0 / 10.0.
    pub fn ground_equivalent_ratio(&self) -> f64 {
        match (
            self.rate_for(ShipmentType::Ground),
            self.rate_for(ShipmentType::Express),
        ) {
            (Some(ground), Some(express)) if express != 0.0 => ground / express,
            _ => 0.0,
        }
    }
}

fn default_rates() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("GROUND".to_string(), 1.0),
        ("2DAY".to_string(), 5.0),
        ("EXPRESS".to_string(), 10.0),
        ("FREIGHT".to_string(), 20.0),
    ])
}

fn default_discounts() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("GROUND".to_string(), 0.20),
        ("FREIGHT".to_string(), 0.30),
        ("2DAY".to_string(), 0.50),
    ])
}
