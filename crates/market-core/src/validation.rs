//! # Validation
//!
//! Request field parsing and business rule validation.
//!
//! ## Validation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP body ──► serde_json::Value ──► parse_* (this module) ──► typed    │
//! │                                         │                     request   │
//! │                                         ▼                               │
//! │                              CoreError::Argument    (shape wrong)       │
//! │                              CoreError::Validation  (field wrong)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Clients send ids either as JSON integers or as digit strings, and the
//! `items` field either as an array or as a string holding a JSON array.
//! All of those forms are normalized here.

use serde_json::Value;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{AddItemsOutcome, ContactInput, ContactPatch, ItemRejection, LineUpdate, NewLine};
use crate::MAX_ITEM_QUANTITY;

/// Message used when a required request argument is absent.
pub const MISSING_ARGUMENTS: &str = "Required arguments are missing";

/// Message used when a request argument has the wrong shape.
pub const INVALID_REQUEST: &str = "Invalid request format";

/// Maximum length of free-text contact fields.
pub const MAX_CONTACT_FIELD_LEN: usize = 100;

/// Maximum length of a phone number.
pub const MAX_PHONE_LEN: usize = 20;

// =============================================================================
// Scalar Parsing
// =============================================================================

/// Reads an integer given as a JSON number or a digit string.
pub fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) if is_digits(s.trim()) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads a required id argument (e.g. `id` or `contact` of PlaceOrder).
pub fn parse_id(field: &str, value: Option<&Value>) -> CoreResult<i64> {
    let value = value.ok_or_else(|| CoreError::argument(MISSING_ARGUMENTS))?;
    lenient_int(value).ok_or_else(|| {
        ValidationError::invalid(field, "must be an integer id").into()
    })
}

/// Validates a basket line quantity.
pub fn validate_quantity(field: &str, quantity: i64) -> Result<(), ValidationError> {
    if (1..=MAX_ITEM_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        })
    }
}

/// Parses a textual on/off flag.
///
/// Accepts `on/off`, `yes/no`, `true/false`, `1/0`, `y/n`, `t/f` in any case.
pub fn parse_flag(field: &str, raw: &str) -> Result<bool, ValidationError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "on" | "yes" | "true" | "1" | "y" | "t" => Ok(true),
        "off" | "no" | "false" | "0" | "n" | "f" => Ok(false),
        _ => Err(ValidationError::NotAllowed {
            field: field.to_string(),
            allowed: ["on", "off", "yes", "no", "true", "false", "1", "0"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }),
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

// =============================================================================
// Basket Requests
// =============================================================================

/// Normalizes the `items` argument into a list of JSON entries.
fn items_array(items: Option<&Value>) -> CoreResult<Vec<Value>> {
    match items {
        None | Some(Value::Null) => Err(CoreError::argument(MISSING_ARGUMENTS)),
        Some(Value::Array(entries)) => Ok(entries.clone()),
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(entries)) => Ok(entries),
            _ => Err(CoreError::argument(INVALID_REQUEST)),
        },
        Some(_) => Err(CoreError::argument(INVALID_REQUEST)),
    }
}

/// A parsed AddItems request.
///
/// `lines` are the readable entries, ready for the repository. Malformed
/// entries are already in `rejected`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddItemsRequest {
    pub lines: Vec<NewLine>,
    /// Request position of each entry of `lines`.
    positions: Vec<usize>,
    pub rejected: Vec<ItemRejection>,
}

impl AddItemsRequest {
    /// Combines the repository outcome for `lines` with the malformed
    /// entries. Every rejection index is a position in the request.
    pub fn merge(self, mut outcome: AddItemsOutcome) -> AddItemsOutcome {
        for rejection in &mut outcome.rejected {
            if let Some(position) = self.positions.get(rejection.index) {
                rejection.index = *position;
            }
        }
        outcome.rejected.extend(self.rejected);
        outcome.rejected.sort_by_key(|rejection| rejection.index);
        outcome
    }
}

/// Parses the AddItems request.
///
/// Each entry names its listing under `product_info` (or `listing`) and a
/// `quantity` in `1..=MAX_ITEM_QUANTITY`. A malformed entry is rejected on
/// its own; only a missing or unreadable `items` fails the request.
pub fn parse_add_items(items: Option<&Value>) -> CoreResult<AddItemsRequest> {
    let entries = items_array(items)?;
    let mut request = AddItemsRequest::default();

    for (index, entry) in entries.iter().enumerate() {
        match parse_add_entry(index, entry) {
            Ok(line) => {
                request.lines.push(line);
                request.positions.push(index);
            }
            Err(err) => request.rejected.push(ItemRejection {
                index,
                listing_id: entry_listing(entry),
                reason: err.to_string(),
            }),
        }
    }

    Ok(request)
}

fn entry_listing(entry: &Value) -> Option<i64> {
    entry
        .get("product_info")
        .or_else(|| entry.get("listing"))
        .and_then(lenient_int)
}

fn parse_add_entry(index: usize, entry: &Value) -> Result<NewLine, ValidationError> {
    let listing_id = entry_listing(entry).ok_or_else(|| {
        ValidationError::invalid(format!("items[{index}].product_info"), "must be a listing id")
    })?;

    let quantity_field = format!("items[{index}].quantity");
    let quantity = entry
        .get("quantity")
        .and_then(lenient_int)
        .ok_or_else(|| ValidationError::invalid(quantity_field.clone(), "must be an integer"))?;
    validate_quantity(&quantity_field, quantity)?;

    Ok(NewLine {
        listing_id,
        quantity,
    })
}

/// Parses the RemoveItems request: comma-separated line ids.
///
/// Tokens that are not plain digits are ignored. Fails only when nothing
/// usable remains.
pub fn parse_line_ids(raw: Option<&str>) -> CoreResult<Vec<i64>> {
    let raw = raw.ok_or_else(|| CoreError::argument(MISSING_ARGUMENTS))?;
    let ids: Vec<i64> = raw
        .split(',')
        .map(str::trim)
        .filter(|token| is_digits(token))
        .filter_map(|token| token.parse().ok())
        .collect();

    if ids.is_empty() {
        return Err(CoreError::argument(MISSING_ARGUMENTS));
    }
    Ok(ids)
}

/// Parses the UpdateItems request.
///
/// Only entries whose `id` and `quantity` are JSON integers, with the
/// quantity in range, are kept. Others are skipped silently.
pub fn parse_quantity_updates(items: Option<&Value>) -> CoreResult<Vec<LineUpdate>> {
    let entries = items_array(items)?;

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_i64()?;
            let quantity = entry.get("quantity")?.as_i64()?;
            validate_quantity("quantity", quantity).ok()?;
            Some(LineUpdate { id, quantity })
        })
        .collect())
}

// =============================================================================
// Contacts
// =============================================================================

fn check_text(
    field: &str,
    value: &str,
    required: bool,
    max: usize,
) -> Result<(), ValidationError> {
    if required && value.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

fn check_optional(field: &str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(v) => check_text(field, v, false, MAX_CONTACT_FIELD_LEN),
        None => Ok(()),
    }
}

/// Validates a new contact; returns every failing field.
pub fn validate_contact(input: &ContactInput) -> Result<(), Vec<ValidationError>> {
    let results = [
        check_text("city", &input.city, true, MAX_CONTACT_FIELD_LEN),
        check_text("street", &input.street, true, MAX_CONTACT_FIELD_LEN),
        check_text("phone", &input.phone, true, MAX_PHONE_LEN),
        check_optional("house", input.house.as_deref()),
        check_optional("structure", input.structure.as_deref()),
        check_optional("building", input.building.as_deref()),
        check_optional("apartment", input.apartment.as_deref()),
    ];
    collect_errors(results)
}

/// Validates a contact patch. Present required fields must stay non-empty.
pub fn validate_contact_patch(patch: &ContactPatch) -> Result<(), Vec<ValidationError>> {
    let required = |field: &str, value: Option<&str>, max: usize| match value {
        Some(v) => check_text(field, v, true, max),
        None => Ok(()),
    };
    let results = [
        required("city", patch.city.as_deref(), MAX_CONTACT_FIELD_LEN),
        required("street", patch.street.as_deref(), MAX_CONTACT_FIELD_LEN),
        required("phone", patch.phone.as_deref(), MAX_PHONE_LEN),
        check_optional("house", patch.house.as_deref()),
        check_optional("structure", patch.structure.as_deref()),
        check_optional("building", patch.building.as_deref()),
        check_optional("apartment", patch.apartment.as_deref()),
    ];
    collect_errors(results)
}

fn collect_errors<const N: usize>(
    results: [Result<(), ValidationError>; N],
) -> Result<(), Vec<ValidationError>> {
    let errors: Vec<ValidationError> = results.into_iter().filter_map(Result::err).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
