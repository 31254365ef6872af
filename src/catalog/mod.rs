// Catalog module
// Laptop records and CSV ingestion into the catalog store

pub mod ingest;

#[cfg(test)]
pub(crate) mod fixtures;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use std::fmt;
use std::str::FromStr;

pub use ingest::{CSV_COLUMNS, CatalogError, read_catalog_csv, read_catalog_from_reader};

/// One laptop from the catalog. Rows are immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LaptopRecord {
    /// Stable catalog row id
    pub id: i64,
    pub company: String,
    pub product: String,
    pub type_name: String,
    /// Screen diagonal in inches
    pub inches: Option<f64>,
    /// RAM in GB
    pub ram: u32,
    pub os: String,
    /// Weight in kg
    pub weight: f64,
    /// Price in euros
    pub price: f64,
    pub screen: String,
    pub screen_w: Option<u32>,
    pub screen_h: Option<u32>,
    pub touchscreen: bool,
    pub ips: bool,
    pub retina: bool,
    pub cpu_company: String,
    /// CPU base frequency in GHz
    pub cpu_freq: Option<f64>,
    pub cpu_model: String,
    /// Primary storage in GB
    pub primary_storage: u32,
    /// Secondary storage in GB, 0 when absent
    pub secondary_storage: u32,
    pub primary_storage_type: StorageType,
    pub secondary_storage_type: StorageType,
    pub gpu_company: String,
    pub gpu_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT")]
pub enum StorageType {
    #[serde(rename = "HDD")]
    #[sqlx(rename = "HDD")]
    Hdd,
    #[serde(rename = "SSD")]
    #[sqlx(rename = "SSD")]
    Ssd,
    #[serde(rename = "Flash Storage")]
    #[sqlx(rename = "Flash Storage")]
    Flash,
    #[serde(rename = "Hybrid")]
    #[sqlx(rename = "Hybrid")]
    Hybrid,
    /// No drive in this slot
    #[serde(rename = "No")]
    #[sqlx(rename = "No")]
    None,
}

impl fmt::Display for StorageType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StorageType::Hdd => write!(f, "HDD"),
            StorageType::Ssd => write!(f, "SSD"),
            StorageType::Flash => write!(f, "Flash Storage"),
            StorageType::Hybrid => write!(f, "Hybrid"),
            StorageType::None => write!(f, "No"),
        }
    }
}

impl FromStr for StorageType {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hdd" => Ok(StorageType::Hdd),
            "ssd" => Ok(StorageType::Ssd),
            "flash storage" | "flash" => Ok(StorageType::Flash),
            "hybrid" => Ok(StorageType::Hybrid),
            "no" | "none" | "" => Ok(StorageType::None),
            other => Err(format!("unknown storage type: {other}")),
        }
    }
}

impl LaptopRecord {
    /// Price, RAM and weight bounds every indexed record satisfies
    #[inline]
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.company.trim().is_empty() {
            return Err("company is empty".to_string());
        }
        if self.product.trim().is_empty() {
            return Err("product is empty".to_string());
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(format!("price must be >= 0, got {}", self.price));
        }
        if self.ram == 0 {
            return Err("ram must be > 0".to_string());
        }
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(format!("weight must be > 0, got {}", self.weight));
        }
        Ok(())
    }

    #[inline]
    pub fn has_secondary_storage(&self) -> bool {
        self.secondary_storage > 0 && self.secondary_storage_type != StorageType::None
    }

    /// e.g. "Apple MacBook Pro"
    #[inline]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.company, self.product)
    }
}
