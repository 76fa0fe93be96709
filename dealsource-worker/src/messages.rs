/// Outbound SMS wording
///
/// Kept under 160 GSM characters for typical names and addresses so each
/// message goes out as a single segment.

use dealsource_shared::models::vendor::Vendor;

pub const OPT_OUT_HINT: &str = "Reply STOP to opt out.";

/// Street part of the address, e.g. "12 Acacia Avenue" from
/// "12 Acacia Avenue, Leeds, LS1 1AA"
fn short_address(address: &str) -> &str {
    address.split(',').next().unwrap_or(address).trim()
}

pub fn intro(vendor: &Vendor) -> String {
    format!(
        "Hi {}, we buy homes for cash and saw {} may be for sale. Could we make you an offer? {}",
        vendor.first_name,
        short_address(&vendor.property_address),
        OPT_OUT_HINT
    )
}

/// `attempt` is 1 for the first follow-up
pub fn follow_up(vendor: &Vendor, attempt: i32) -> String {
    if attempt <= 1 {
        format!(
            "Hi {}, just checking in about {}. Still thinking of selling? A quick yes or no helps. {}",
            vendor.first_name,
            short_address(&vendor.property_address),
            OPT_OUT_HINT
        )
    } else {
        format!(
            "Hi {}, last message from us about {}. Reply any time if you'd like a cash offer. {}",
            vendor.first_name,
            short_address(&vendor.property_address),
            OPT_OUT_HINT
        )
    }
}
