/// Investor pack generation
///
/// Two stages: [`assemble`] turns a deal, its photos and a layout into a
/// [`PackDocument`] (pure, no I/O), and [`pdf::render`] lays that document
/// out as an A4 PDF.
///
/// # Example
///
/// ```no_run
/// use dealsource_shared::pack::{assemble, pdf, PackLayout};
///
/// # fn example(deal: &dealsource_shared::models::deal::Deal) -> Result<(), Box<dyn std::error::Error>> {
/// let document = assemble(deal, &[], &PackLayout::built_in(), chrono::Utc::now().date_naive());
/// let bytes = pdf::render(&document)?;
/// assert!(bytes.starts_with(b"%PDF-"));
/// # Ok(())
/// # }
/// ```

pub mod pdf;

use chrono::NaiveDate;

use crate::models::deal::Deal;
use crate::models::deal_photo::DealPhoto;
use crate::models::investor_pack_template::{InvestorPackTemplate, PackSectionKind};

const BUILT_IN_COMPANY: &str = "DealSource";
const BUILT_IN_INTRO: &str = "This pack summarises an investment opportunity sourced by our team. \
     Figures are indicative and should be verified independently before committing funds.";
const BUILT_IN_FOOTER: &str = "Confidential. Prepared for the named investor only.";

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("Failed to write PDF: {0}")]
    Pdf(String),

    #[error("Document has no pages")]
    Empty,
}

/// Branding and section order used for one pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackLayout {
    pub company_name: String,
    pub intro_text: Option<String>,
    pub footer_text: Option<String>,
    pub sections: Vec<PackSectionKind>,
}

impl PackLayout {
    /// Layout used when no template exists
    pub fn built_in() -> Self {
        Self {
            company_name: BUILT_IN_COMPANY.to_string(),
            intro_text: Some(BUILT_IN_INTRO.to_string()),
            footer_text: Some(BUILT_IN_FOOTER.to_string()),
            sections: PackSectionKind::DEFAULT_ORDER.to_vec(),
        }
    }
}

impl From<&InvestorPackTemplate> for PackLayout {
    fn from(template: &InvestorPackTemplate) -> Self {
        let mut sections: Vec<PackSectionKind> = Vec::new();
        for kind in template.sections.iter() {
            if !sections.contains(kind) {
                sections.push(*kind);
            }
        }
        if sections.is_empty() {
            sections = PackSectionKind::DEFAULT_ORDER.to_vec();
        }

        Self {
            company_name: template
                .company_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| BUILT_IN_COMPANY.to_string()),
            intro_text: template.intro_text.clone(),
            footer_text: template.footer_text.clone(),
            sections,
        }
    }
}

/// Derived financial figures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DealMetrics {
    /// Annual rent as a percentage of the asking price
    pub gross_yield_pct: Option<f64>,

    /// How far below estimated value the asking price sits, in percent
    pub discount_pct: Option<f64>,

    /// Asking price plus refurbishment cost
    pub total_investment: Option<i64>,
}

impl DealMetrics {
    pub fn for_deal(deal: &Deal) -> Self {
        let asking = deal.asking_price.filter(|price| *price > 0);

        // f64 throughout: stored amounts are not bounded
        let gross_yield_pct = match (deal.monthly_rent, asking) {
            (Some(rent), Some(price)) => Some(rent as f64 * 12.0 / price as f64 * 100.0),
            _ => None,
        };

        let discount_pct = match (deal.estimated_value.filter(|v| *v > 0), asking) {
            (Some(value), Some(price)) => Some((value as f64 - price as f64) / value as f64 * 100.0),
            _ => None,
        };

        // omitted when the sum does not fit
        let total_investment =
            asking.and_then(|price| price.checked_add(deal.refurb_cost.unwrap_or(0)));

        Self {
            gross_yield_pct,
            discount_pct,
            total_investment,
        }
    }
}

/// One line of a pack section
#[derive(Debug, Clone, PartialEq)]
pub enum PackLine {
    Paragraph(String),
    Field { label: String, value: String },
    Bullet(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackSection {
    pub heading: String,
    pub lines: Vec<PackLine>,
}

/// Layout-independent content of an investor pack
#[derive(Debug, Clone, PartialEq)]
pub struct PackDocument {
    pub title: String,
    pub subtitle: String,
    pub company_name: String,
    pub intro: Option<String>,
    pub sections: Vec<PackSection>,
    pub footer: String,
}

fn field(label: &str, value: impl Into<String>) -> PackLine {
    PackLine::Field {
        label: label.to_string(),
        value: value.into(),
    }
}

/// Builds the pack content for a deal
///
/// Sections with nothing to show (no photos, no description) are left out
/// rather than printed empty.
pub fn assemble(
    deal: &Deal,
    photos: &[DealPhoto],
    layout: &PackLayout,
    generated_on: NaiveDate,
) -> PackDocument {
    let metrics = DealMetrics::for_deal(deal);
    let mut sections = Vec::new();

    for kind in &layout.sections {
        let lines = match kind {
            PackSectionKind::Overview => {
                let mut lines = vec![
                    field("Address", deal.address.clone()),
                    field("Status", deal.status.label()),
                ];
                if let Some(postcode) = &deal.postcode {
                    lines.insert(1, field("Postcode", postcode.clone()));
                }
                if let Some(price) = deal.asking_price {
                    lines.push(field("Asking price", format_gbp(price)));
                }
                lines
            }
            PackSectionKind::PropertyDetails => {
                let mut lines = Vec::new();
                if let Some(kind) = &deal.property_type {
                    lines.push(field("Property type", kind.clone()));
                }
                if let Some(bedrooms) = deal.bedrooms {
                    lines.push(field("Bedrooms", bedrooms.to_string()));
                }
                if let Some(bathrooms) = deal.bathrooms {
                    lines.push(field("Bathrooms", bathrooms.to_string()));
                }
                lines
            }
            PackSectionKind::Financials => {
                let mut lines = Vec::new();
                if let Some(price) = deal.asking_price {
                    lines.push(field("Asking price", format_gbp(price)));
                }
                if let Some(value) = deal.estimated_value {
                    lines.push(field("Estimated value", format_gbp(value)));
                }
                if let Some(refurb) = deal.refurb_cost {
                    lines.push(field("Refurbishment", format_gbp(refurb)));
                }
                if let Some(total) = metrics.total_investment {
                    lines.push(field("Total investment", format_gbp(total)));
                }
                if let Some(rent) = deal.monthly_rent {
                    lines.push(field("Monthly rent", format_gbp(rent)));
                }
                if let Some(pct) = metrics.gross_yield_pct {
                    lines.push(field("Gross yield", format_pct(pct)));
                }
                if let Some(pct) = metrics.discount_pct {
                    lines.push(field("Discount to value", format_pct(pct)));
                }
                lines
            }
            PackSectionKind::Description => deal
                .description
                .iter()
                .flat_map(|text| text.split("\n\n"))
                .map(str::trim)
                .filter(|para| !para.is_empty())
                .map(|para| PackLine::Paragraph(para.to_string()))
                .collect(),
            PackSectionKind::Photos => photos
                .iter()
                .map(|photo| {
                    let caption = photo.caption.as_deref().unwrap_or("Photo");
                    let cover = if photo.is_cover { " (cover)" } else { "" };
                    PackLine::Bullet(format!("{}{}: {}", caption, cover, photo.url))
                })
                .collect(),
            PackSectionKind::Contact => vec![PackLine::Paragraph(format!(
                "To register interest or arrange a viewing, contact {} quoting reference {}.",
                layout.company_name,
                deal_reference(deal)
            ))],
        };

        if !lines.is_empty() {
            sections.push(PackSection {
                heading: kind.heading().to_string(),
                lines,
            });
        }
    }

    let footer = match &layout.footer_text {
        Some(text) if !text.trim().is_empty() => format!("{} | {}", layout.company_name, text.trim()),
        _ => layout.company_name.clone(),
    };

    PackDocument {
        title: deal.title.clone(),
        subtitle: format!(
            "Investor pack prepared {}",
            generated_on.format("%-d %B %Y")
        ),
        company_name: layout.company_name.clone(),
        intro: layout.intro_text.clone().filter(|text| !text.trim().is_empty()),
        sections,
        footer,
    }
}

/// Short reference printed on packs: first block of the deal id, upper-cased
pub fn deal_reference(deal: &Deal) -> String {
    deal.id
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase()
}

/// `250000` -> `£250,000`
pub fn format_gbp(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if amount < 0 {
        format!("-£{}", grouped)
    } else {
        format!("£{}", grouped)
    }
}

pub fn format_pct(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Lower-case, dash-separated form of a deal title for file names
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }

        if slug.len() >= 60 {
            break;
        }
    }

    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "deal".to_string()
    } else {
        slug
    }
}

/// `investor-pack-<slug>.pdf`
pub fn pack_filename(deal: &Deal) -> String {
    format!("investor-pack-{}.pdf", slugify(&deal.title))
}
