//! Equipment string handling.
//!
//! An asset's accompanying equipment is stored by the inventory system as a
//! single comma-joined string, e.g. `"Mouse, Adaptor (s/n: ABC123), Bag"`.
//! Adaptor entries carry the adaptor's own serial number, so membership and
//! comparison treat any token starting with [`ADAPTOR`] as the adaptor.

use std::sync::LazyLock;

use regex::Regex;

/// Canonical equipment name whose entries embed a serial number suffix.
pub const ADAPTOR: &str = "Adaptor";

/// Serial written into an adaptor entry when none was entered.
pub const ADAPTOR_SERIAL_PLACEHOLDER: &str = "N/A";

/// Separator used when re-joining equipment tokens.
pub const EQUIPMENT_SEPARATOR: &str = ", ";

static ADAPTOR_SERIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(\s*s/n:\s*([^)]*?)\s*\)").expect("valid regex"));

/// Iterate the non-empty, trimmed tokens of an equipment string.
pub fn tokens(equipments: &str) -> impl Iterator<Item = &str> {
    equipments
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn is_adaptor_token(token: &str) -> bool {
    token.starts_with(ADAPTOR)
}

/// Whether `name` is present in the equipment string.
///
/// Comparison is case-sensitive. [`ADAPTOR`] matches any token beginning
/// with `"Adaptor"`, whatever serial suffix it carries.
pub fn has_equipment(equipments: &str, name: &str) -> bool {
    if name == ADAPTOR {
        tokens(equipments).any(is_adaptor_token)
    } else {
        tokens(equipments).any(|t| t == name)
    }
}

/// Render the canonical adaptor entry for a serial number.
pub fn adaptor_entry(serial: &str) -> String {
    let serial = serial.trim();
    let serial = if serial.is_empty() {
        ADAPTOR_SERIAL_PLACEHOLDER.to_string()
    } else {
        serial.to_uppercase()
    };
    format!("{ADAPTOR} (s/n: {serial})")
}

/// Extract the serial from the first adaptor entry, if it has one.
pub fn adaptor_serial(equipments: &str) -> Option<String> {
    tokens(equipments)
        .filter(|t| is_adaptor_token(t))
        .find_map(serial_of)
}

fn serial_of(token: &str) -> Option<String> {
    ADAPTOR_SERIAL_RE
        .captures(token)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Add `name` when absent, remove it when present.
///
/// Toggling [`ADAPTOR`] on appends [`adaptor_entry`] for `adaptor_serial`;
/// toggling it off removes every adaptor entry. Other tokens keep their
/// order and spelling.
pub fn toggle_equipment(equipments: &str, name: &str, adaptor_serial: &str) -> String {
    let mut items: Vec<String> = tokens(equipments).map(str::to_string).collect();

    if has_equipment(equipments, name) {
        if name == ADAPTOR {
            items.retain(|t| !is_adaptor_token(t));
        } else {
            items.retain(|t| t != name);
        }
    } else if name == ADAPTOR {
        items.push(adaptor_entry(adaptor_serial));
    } else {
        items.push(name.to_string());
    }

    items.join(EQUIPMENT_SEPARATOR)
}

/// Canonical form used for comparison.
///
/// Tokens are trimmed, empties dropped, adaptor entries re-rendered as
/// `Adaptor (s/n: <UPPERCASE>)` (or bare `Adaptor` without a serial), then
/// sorted and joined with `", "`.
pub fn normalize_equipments(equipments: &str) -> String {
    let mut items: Vec<String> = tokens(equipments)
        .map(|t| {
            if !is_adaptor_token(t) {
                return t.to_string();
            }
            match serial_of(t) {
                Some(serial) => format!("{ADAPTOR} (s/n: {})", serial.to_uppercase()),
                None => ADAPTOR.to_string(),
            }
        })
        .collect();
    items.sort();
    items.join(EQUIPMENT_SEPARATOR)
}

/// Two equipment strings are equal when their normalized forms are.
pub fn equipments_equal(a: &str, b: &str) -> bool {
    normalize_equipments(a) == normalize_equipments(b)
}

/// Tokens that are not in the product's equipment catalog.
///
/// Adaptor entries count as known whenever the catalog lists [`ADAPTOR`].
pub fn unknown_equipments<'a>(equipments: &'a str, catalog: &[String]) -> Vec<&'a str> {
    tokens(equipments)
        .filter(|t| {
            let name = if is_adaptor_token(t) { ADAPTOR } else { *t };
            !catalog.iter().any(|c| c == name)
        })
        .collect()
}
