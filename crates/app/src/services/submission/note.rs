//! Customer notes, tags and the messages returned to the storefront.

use std::fmt::Write as _;

use shopiform_core::FormCode;

use super::parse::{AddressParts, CompanyDetails};

pub const MSG_PLUS_SUCCESS: &str =
    "Company, location, and customer created successfully! Customer is assigned as the main contact.";
pub const MSG_FALLBACK_SUCCESS: &str = "Customer created with company information! (Note: B2B company creation requires Shopify Plus. Company details saved in customer profile.)";
pub const NOTE_FALLBACK: &str = "Company information has been saved in the customer's address and notes. Upgrade to Shopify Plus to use B2B company features.";
pub const MSG_STANDARD_SUCCESS: &str = "Form submitted successfully and customer created!";

pub const MSG_NO_SESSION: &str = "Form submitted but customer could not be created (no session)";
pub const NOTE_NO_SESSION: &str =
    "The app may not be installed on this shop or the session expired.";
pub const MSG_INVALID_SESSION: &str =
    "Form submitted but customer could not be created (invalid session)";
pub const MSG_MISSING_SCOPE: &str =
    "The app needs to be reinstalled with updated permissions (write_customers scope required)";
pub const NOTE_MISSING_SCOPE: &str =
    "Please reinstall the app from the Shopify admin to grant the updated permissions.";

/// `Created via ShopiForm: <title> (Code: <code>)`
#[must_use]
pub fn provenance_note(title: &str, code: &FormCode) -> String {
    format!("Created via ShopiForm: {title} (Code: {code})")
}

/// Tags applied to every customer a form creates.
#[must_use]
pub fn customer_tags(code: &FormCode, company: Option<&CompanyDetails>) -> Vec<String> {
    let mut tags = vec![format!("form-{code}"), "form-submission".to_string()];
    if let Some(company) = company {
        tags.push("company-customer".to_string());
        tags.push(format!("company:{}", company.name));
    }
    tags
}

/// Provenance note followed by the company and its addresses, for shops that
/// cannot hold company records.
#[must_use]
pub fn fallback_note(title: &str, code: &FormCode, company: &CompanyDetails) -> String {
    let mut note = provenance_note(title, code);
    let _ = write!(note, "\n\nCompany Information:\n- Company: {}\n", company.name);

    note.push_str("\nBilling Address:\n");
    write_address(&mut note, &company.billing);

    if let Some(shipping) = &company.shipping {
        note.push_str("\nShipping Address:\n");
        write_address(&mut note, shipping);
    }
    note
}

fn write_address(note: &mut String, parts: &AddressParts) {
    let lines = [
        ("Address", parts.street_line()),
        ("City", parts.city.clone()),
        ("State/Province", parts.province.clone()),
        ("Postal Code", parts.postal_code.clone()),
        ("Country", parts.country.clone()),
        ("Phone", parts.phone.clone()),
    ];
    for (label, value) in lines {
        if let Some(value) = value {
            let _ = writeln!(note, "- {label}: {value}");
        }
    }
}
