
use std::fmt;
use tracing::debug;

use super::intent::QueryIntent;
use crate::catalog::LaptopRecord;

/// Weight limit for "lightweight" and the portable use cases, in kg.
///
/// Applies to every category, so gaming plus lightweight queries often
/// leave nothing.
pub const LIGHTWEIGHT_MAX_KG: f64 = 2.0;

/// Student budgets stay strictly below this price, in euros
pub const STUDENT_MAX_PRICE: f64 = 1000.0;

/// A named use case: the phrases that select it and the laptops it accepts
pub struct UseCaseRule {
    pub name: &'static str,
    pub synonyms: &'static [&'static str],
    pub accepts: fn(&LaptopRecord) -> bool,
}

impl fmt::Debug for UseCaseRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UseCaseRule")
            .field("name", &self.name)
            .field("synonyms", &self.synonyms)
            .finish_non_exhaustive()
    }
}

impl PartialEq for UseCaseRule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

fn gpu_matches(record: &LaptopRecord, families: &[&str]) -> bool {
    let gpu = record.gpu_model.to_lowercase();
    families.iter().any(|family| gpu.contains(family))
}

fn gaming(record: &LaptopRecord) -> bool {
    record.ram >= 8 && gpu_matches(record, &["gtx", "rtx"])
}

fn student(record: &LaptopRecord) -> bool {
    record.weight < LIGHTWEIGHT_MAX_KG && record.price < STUDENT_MAX_PRICE
}

fn office(record: &LaptopRecord) -> bool {
    record.weight < LIGHTWEIGHT_MAX_KG
}

fn video_editing(record: &LaptopRecord) -> bool {
    record.ram >= 16 && gpu_matches(record, &["gtx", "rtx", "quadro"])
}

/// Checked in order; the first rule with a synonym inside the query's use
/// case wins
pub static USE_CASE_RULES: [UseCaseRule; 4] = [
    UseCaseRule {
        name: "gaming",
        synonyms: &["gaming", "gamer"],
        accepts: gaming,
    },
    UseCaseRule {
        name: "student",
        synonyms: &["student", "college", "school"],
        accepts: student,
    },
    UseCaseRule {
        name: "office",
        synonyms: &["office", "business", "work"],
        accepts: office,
    },
    UseCaseRule {
        name: "video editing",
        synonyms: &["video editing", "content creation", "editing"],
        accepts: video_editing,
    },
];

/// Map free text like "Gamer" or "college work" to a rule, if any matches
#[inline]
pub fn normalize_use_case(raw: &str) -> Option<&'static UseCaseRule> {
    let use_case = raw.trim().to_lowercase();
    if use_case.is_empty() {
        return None;
    }

    USE_CASE_RULES
        .iter()
        .find(|rule| rule.synonyms.iter().any(|s| use_case.contains(s)))
}

/// One narrowing step of the structured filter
#[derive(Debug, PartialEq)]
pub enum AttributeFilter {
    PriceUnder(f64),
    PriceAbove(f64),
    Lightweight,
    /// Lowercased substring of the company
    Brand(String),
    /// Lowercased substring of the product name
    Model(String),
    UseCase(&'static UseCaseRule),
}

impl AttributeFilter {
    #[inline]
    pub fn matches(&self, record: &LaptopRecord) -> bool {
        match self {
            Self::PriceUnder(bound) => record.price <= *bound,
            Self::PriceAbove(bound) => record.price >= *bound,
            Self::Lightweight => record.weight < LIGHTWEIGHT_MAX_KG,
            Self::Brand(brand) => record.company.to_lowercase().contains(brand.as_str()),
            Self::Model(model) => record.product.to_lowercase().contains(model.as_str()),
            Self::UseCase(rule) => (rule.accepts)(record),
        }
    }
}

impl fmt::Display for AttributeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PriceUnder(bound) => write!(f, "price <= {bound}"),
            Self::PriceAbove(bound) => write!(f, "price >= {bound}"),
            Self::Lightweight => write!(f, "weight < {LIGHTWEIGHT_MAX_KG}kg"),
            Self::Brand(brand) => write!(f, "brand ~ {brand}"),
            Self::Model(model) => write!(f, "model ~ {model}"),
            Self::UseCase(rule) => write!(f, "use case {}", rule.name),
        }
    }
}

fn lowered(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

/// The filters an intent asks for, in application order. Absent or blank
/// attributes and unknown use cases produce no filter.
#[inline]
pub fn filters_for(intent: &QueryIntent) -> Vec<AttributeFilter> {
    let mut filters = Vec::new();

    if let Some(bound) = intent.price_under {
        filters.push(AttributeFilter::PriceUnder(bound));
    }
    if let Some(bound) = intent.price_above {
        filters.push(AttributeFilter::PriceAbove(bound));
    }
    if intent.lightweight == Some(true) {
        filters.push(AttributeFilter::Lightweight);
    }
    if let Some(brand) = lowered(intent.brand.as_ref()) {
        filters.push(AttributeFilter::Brand(brand));
    }
    if let Some(model) = lowered(intent.model.as_ref()) {
        filters.push(AttributeFilter::Model(model));
    }
    if let Some(use_case) = intent.use_case.as_deref() {
        match normalize_use_case(use_case) {
            Some(rule) => filters.push(AttributeFilter::UseCase(rule)),
            None => debug!("Ignoring unrecognised use case {:?}", use_case),
        }
    }

    filters
}

/// Narrow `candidates` by each filter in turn. Candidate order is kept.
#[inline]
pub fn apply_filters(filters: &[AttributeFilter], candidates: Vec<LaptopRecord>) -> Vec<LaptopRecord> {
    let mut remaining = candidates;
    debug!("Filtering {} candidates", remaining.len());

    for filter in filters {
        remaining.retain(|record| filter.matches(record));
        debug!("{} candidates left after {}", remaining.len(), filter);
    }

    remaining
}
