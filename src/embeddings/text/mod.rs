
use anyhow::{Result, bail};
use std::fmt::Write as _;

use crate::catalog::LaptopRecord;

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

/// Push `value` unless it is blank
fn push_text(parts: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        parts.push(value.to_string());
    }
}

/// Build the descriptive sentence a laptop is embedded from.
///
/// Attributes always appear in the same order: brand, product, type, size,
/// RAM, OS, weight, screen, display flags, CPU, storage, GPU, price. Blank
/// optional fields are left out. A record without a company or product
/// cannot be described.
#[inline]
pub fn describe_laptop(record: &LaptopRecord) -> Result<String> {
    let company = record.company.trim();
    let product = record.product.trim();
    if company.is_empty() {
        bail!("laptop {} has no company", record.id);
    }
    if product.is_empty() {
        bail!("laptop {} has no product name", record.id);
    }

    let mut heading = format!("{company} {product}");
    let type_name = record.type_name.trim();
    if !type_name.is_empty() {
        heading.push(' ');
        heading.push_str(type_name);
    }
    if let Some(inches) = record.inches {
        write!(heading, " {inches} inch")?;
    }

    let mut parts = vec![heading, format!("{}GB RAM", record.ram)];
    push_text(&mut parts, &record.os);
    parts.push(format!("{}kg", record.weight));

    let mut screen = record.screen.trim().to_string();
    if let (Some(w), Some(h)) = (record.screen_w, record.screen_h) {
        if !screen.is_empty() {
            screen.push(' ');
        }
        write!(screen, "{w}x{h}")?;
    }
    push_text(&mut parts, &screen);

    parts.push(format!("Touchscreen: {}", yes_no(record.touchscreen)));
    parts.push(format!("IPS: {}", yes_no(record.ips)));
    parts.push(format!("Retina: {}", yes_no(record.retina)));

    let mut cpu = format!("{} {}", record.cpu_company.trim(), record.cpu_model.trim());
    if let Some(freq) = record.cpu_freq {
        write!(cpu, " @ {freq}GHz")?;
    }
    push_text(&mut parts, &cpu);

    parts.push(format!(
        "{}GB {}",
        record.primary_storage, record.primary_storage_type
    ));
    if record.has_secondary_storage() {
        parts.push(format!(
            "{}GB {}",
            record.secondary_storage, record.secondary_storage_type
        ));
    }

    let gpu = format!("{} {}", record.gpu_company.trim(), record.gpu_model.trim());
    push_text(&mut parts, &gpu);

    parts.push(format!("Price: {} euros", record.price));

    Ok(parts.join(", "))
}
