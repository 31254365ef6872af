
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{LaptopRecord, StorageType};

/// Header row of the catalog CSV, in file order
pub const CSV_COLUMNS: [&str; 23] = [
    "Company",
    "Product",
    "TypeName",
    "Inches",
    "Ram",
    "OS",
    "Weight",
    "Price_euros",
    "Screen",
    "ScreenW",
    "ScreenH",
    "Touchscreen",
    "IPSpanel",
    "RetinaDisplay",
    "CPU_company",
    "CPU_freq",
    "CPU_model",
    "PrimaryStorage",
    "SecondaryStorage",
    "PrimaryStorageType",
    "SecondaryStorageType",
    "GPU_company",
    "GPU_model",
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Csv(#[from] csv::Error),
    #[error("Catalog header is missing column {0:?}")]
    MissingColumn(String),
    #[error("Row {row} is invalid: {reason}")]
    InvalidRecord { row: usize, reason: String },
    #[error("Catalog contains no usable records")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "Company")]
    company: String,
    #[serde(rename = "Product")]
    product: String,
    #[serde(rename = "TypeName")]
    type_name: String,
    #[serde(rename = "Inches")]
    inches: Option<f64>,
    #[serde(rename = "Ram")]
    ram: u32,
    #[serde(rename = "OS")]
    os: String,
    #[serde(rename = "Weight")]
    weight: f64,
    #[serde(rename = "Price_euros")]
    price: f64,
    #[serde(rename = "Screen")]
    screen: String,
    #[serde(rename = "ScreenW")]
    screen_w: Option<u32>,
    #[serde(rename = "ScreenH")]
    screen_h: Option<u32>,
    #[serde(rename = "Touchscreen")]
    touchscreen: String,
    #[serde(rename = "IPSpanel")]
    ips: String,
    #[serde(rename = "RetinaDisplay")]
    retina: String,
    #[serde(rename = "CPU_company")]
    cpu_company: String,
    #[serde(rename = "CPU_freq")]
    cpu_freq: Option<f64>,
    #[serde(rename = "CPU_model")]
    cpu_model: String,
    #[serde(rename = "PrimaryStorage")]
    primary_storage: u32,
    #[serde(rename = "SecondaryStorage")]
    secondary_storage: Option<u32>,
    #[serde(rename = "PrimaryStorageType")]
    primary_storage_type: String,
    #[serde(rename = "SecondaryStorageType")]
    secondary_storage_type: String,
    #[serde(rename = "GPU_company")]
    gpu_company: String,
    #[serde(rename = "GPU_model")]
    gpu_model: String,
}

impl CsvRow {
    fn into_record(self, id: i64) -> Result<LaptopRecord, String> {
        let primary_storage_type = self.primary_storage_type.parse::<StorageType>()?;
        let secondary_storage_type = self.secondary_storage_type.parse::<StorageType>()?;

        let record = LaptopRecord {
            id,
            company: self.company,
            product: self.product,
            type_name: self.type_name,
            inches: self.inches,
            ram: self.ram,
            os: self.os,
            weight: self.weight,
            price: self.price,
            screen: self.screen,
            screen_w: self.screen_w,
            screen_h: self.screen_h,
            touchscreen: parse_flag(&self.touchscreen),
            ips: parse_flag(&self.ips),
            retina: parse_flag(&self.retina),
            cpu_company: self.cpu_company,
            cpu_freq: self.cpu_freq,
            cpu_model: self.cpu_model,
            primary_storage: self.primary_storage,
            secondary_storage: self.secondary_storage.unwrap_or(0),
            primary_storage_type,
            secondary_storage_type,
            gpu_company: self.gpu_company,
            gpu_model: self.gpu_model,
        };

        record.check_invariants()?;
        Ok(record)
    }
}

/// "Yes"/"No" style display flags
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "yes" | "true" | "1" | "y"
    )
}

/// Read and validate every row of a catalog CSV.
///
/// Row ids are the 1-based data row numbers, so re-ingesting the same file
/// yields the same ids. Rows that fail to parse or violate the record
/// invariants are skipped with a warning. A missing header column, or a file
/// with no usable rows, is an error.
#[inline]
pub fn read_catalog_csv<P: AsRef<Path>>(path: P) -> Result<Vec<LaptopRecord>, CatalogError> {
    let path = path.as_ref();
    info!("Reading laptop catalog from {}", path.display());

    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    read_catalog(reader)
}

/// Same as [`read_catalog_csv`] for any reader, used for in-memory catalogs
#[inline]
pub fn read_catalog_from_reader<R: std::io::Read>(
    input: R,
) -> Result<Vec<LaptopRecord>, CatalogError> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    read_catalog(reader)
}

fn read_catalog<R: std::io::Read>(
    mut reader: csv::Reader<R>,
) -> Result<Vec<LaptopRecord>, CatalogError> {
    let headers = reader.headers()?.clone();
    for column in CSV_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(CatalogError::MissingColumn(column.to_string()));
        }
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (index, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row_number = index + 1;
        let id = i64::try_from(row_number).map_err(|_| CatalogError::InvalidRecord {
            row: row_number,
            reason: "row number overflows record id".to_string(),
        })?;

        let parsed = row
            .map_err(|e| e.to_string())
            .and_then(|row| row.into_record(id));

        match parsed {
            Ok(record) => records.push(record),
            Err(reason) => {
                let err = CatalogError::InvalidRecord {
                    row: row_number,
                    reason,
                };
                warn!("Skipping catalog row: {}", err);
                skipped += 1;
            }
        }
    }

    if records.is_empty() {
        return Err(CatalogError::Empty);
    }

    debug!(
        "Parsed {} catalog records ({} skipped)",
        records.len(),
        skipped
    );
    Ok(records)
}
