// Shared laptop records for unit tests

use super::{LaptopRecord, StorageType};

pub(crate) const SAMPLE_CATALOG: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/data/laptops_sample.csv"
));

pub(crate) fn sample_record(id: i64) -> LaptopRecord {
    LaptopRecord {
        id,
        company: "Dell".to_string(),
        product: "XPS 13".to_string(),
        type_name: "Ultrabook".to_string(),
        inches: Some(13.3),
        ram: 8,
        os: "Windows 10".to_string(),
        weight: 1.2,
        price: 1379.0,
        screen: "Full HD".to_string(),
        screen_w: Some(1920),
        screen_h: Some(1080),
        touchscreen: true,
        ips: false,
        retina: false,
        cpu_company: "Intel".to_string(),
        cpu_freq: Some(1.8),
        cpu_model: "Core i7 8550U".to_string(),
        primary_storage: 256,
        secondary_storage: 0,
        primary_storage_type: StorageType::Ssd,
        secondary_storage_type: StorageType::None,
        gpu_company: "Intel".to_string(),
        gpu_model: "UHD Graphics 620".to_string(),
    }
}

/// A record with the attributes the search filters look at
pub(crate) fn laptop(
    id: i64,
    company: &str,
    product: &str,
    ram: u32,
    gpu_model: &str,
    price: f64,
    weight: f64,
) -> LaptopRecord {
    LaptopRecord {
        company: company.to_string(),
        product: product.to_string(),
        ram,
        gpu_model: gpu_model.to_string(),
        price,
        weight,
        ..sample_record(id)
    }
}

pub(crate) fn sample_catalog() -> Vec<LaptopRecord> {
    super::read_catalog_from_reader(SAMPLE_CATALOG.as_bytes())
        .expect("bundled sample catalog parses")
}
