//! Data-extension rows built from inbound webhook payloads
//!
//! Payload fields are passed through as JSON values, so a phone number sent
//! as a number stays a number in the upserted row.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::TrackingConfig;
use crate::config::defaults::UNMATCHED_MARKET;
use crate::errors::{AppError, AppResult};
use crate::utils::DateTimeParser;

pub const CONSENT_INVALID: &str = "missing phonenumber or optinstatus";
pub const FEEDBACK_INVALID: &str = "missing parameters";
pub const TRACKING_INVALID: &str = "missing to or from";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRow {
    pub phone_number: Value,
    pub optinstatus: Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRow {
    pub phone_number: Value,
    pub param_name: Value,
    pub param_value: Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingRow {
    #[serde(rename = "To")]
    pub to: Value,
    #[serde(rename = "From")]
    pub from: Value,
    #[serde(rename = "Channel", skip_serializing_if = "Option::is_none")]
    pub channel: Option<Value>,
    #[serde(rename = "Message_uuid", skip_serializing_if = "Option::is_none")]
    pub message_uuid: Option<Value>,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Status", skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
    #[serde(rename = "MID")]
    pub market: String,
}

/// Present in the payload; an explicit `null` counts as present
fn field<'a>(body: &'a Value, name: &str) -> Option<&'a Value> {
    body.as_object().and_then(|object| object.get(name))
}

/// A JSON number, or a non-empty string that parses as one
fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => {
            let trimmed = s.trim();
            !trimmed.is_empty() && trimmed.parse::<f64>().is_ok_and(f64::is_finite)
        }
        _ => false,
    }
}

pub fn consent_row(body: &Value, timestamp: &str) -> AppResult<ConsentRow> {
    match (field(body, "phonenumber"), field(body, "optinstatus")) {
        (Some(phone), Some(optin)) if is_numeric(phone) => Ok(ConsentRow {
            phone_number: phone.clone(),
            optinstatus: optin.clone(),
            timestamp: timestamp.to_string(),
        }),
        (phone, _) => {
            debug!("Rejected consent payload, phone number: {:?}", phone);
            Err(AppError::validation(CONSENT_INVALID))
        }
    }
}

/// The consent row, preceded by its national-format twin when enabled
pub fn consent_rows(body: &Value, timestamp: &str, double_format: bool) -> AppResult<Vec<ConsentRow>> {
    let row = consent_row(body, timestamp)?;
    let twin = double_format
        .then(|| national_variant(&row.phone_number))
        .flatten()
        .map(|phone| ConsentRow {
            phone_number: Value::String(phone),
            ..row.clone()
        });
    Ok(twin.into_iter().chain([row]).collect())
}

pub fn feedback_row(body: &Value, timestamp: &str) -> AppResult<FeedbackRow> {
    match (
        field(body, "phonenumber"),
        field(body, "name"),
        field(body, "value"),
    ) {
        (Some(phone), Some(name), Some(value)) if is_numeric(phone) => Ok(FeedbackRow {
            phone_number: phone.clone(),
            param_name: name.clone(),
            param_value: value.clone(),
            timestamp: timestamp.to_string(),
        }),
        (phone, _, _) => {
            debug!("Rejected feedback payload, phone number: {:?}", phone);
            Err(AppError::validation(FEEDBACK_INVALID))
        }
    }
}

pub fn feedback_rows(body: &Value, timestamp: &str, double_format: bool) -> AppResult<Vec<FeedbackRow>> {
    let row = feedback_row(body, timestamp)?;
    let twin = double_format
        .then(|| national_variant(&row.phone_number))
        .flatten()
        .map(|phone| FeedbackRow {
            phone_number: Value::String(phone),
            ..row.clone()
        });
    Ok(twin.into_iter().chain([row]).collect())
}

pub fn tracking_row(
    body: &Value,
    timestamp: &str,
    tracking: &TrackingConfig,
) -> AppResult<TrackingRow> {
    let (Some(to), Some(from)) = (field(body, "to"), field(body, "from")) else {
        return Err(AppError::validation(TRACKING_INVALID));
    };

    // Only string senders can match a configured market
    let market = from
        .as_str()
        .map(|sender| tracking.market_for(sender))
        .unwrap_or(UNMATCHED_MARKET);

    Ok(TrackingRow {
        to: to.clone(),
        from: from.clone(),
        channel: field(body, "channel").cloned(),
        message_uuid: field(body, "message_uuid").cloned(),
        timestamp: timestamp.to_string(),
        status: field(body, "status").cloned(),
        market: market.to_string(),
    })
}

/// The tracking row, preceded by a twin addressed to the national-format
/// recipient when enabled. The twin's message id carries a `_2` suffix.
pub fn tracking_rows(
    body: &Value,
    timestamp: &str,
    tracking: &TrackingConfig,
    double_format: bool,
) -> AppResult<Vec<TrackingRow>> {
    let row = tracking_row(body, timestamp, tracking)?;
    let twin = double_format
        .then(|| national_variant(&row.to))
        .flatten()
        .map(|to| TrackingRow {
            to: Value::String(to),
            message_uuid: row.message_uuid.as_ref().map(twin_message_id),
            ..row.clone()
        });
    Ok(twin.into_iter().chain([row]).collect())
}

fn twin_message_id(id: &Value) -> Value {
    match id {
        Value::String(id) => Value::String(format!("{id}_2")),
        other => Value::String(format!("{other}_2")),
    }
}

/// Country calling code followed by the digits of the national format,
/// when that differs from the number as sent.
///
/// A number with a national trunk prefix, like `447911123456`, has the
/// variant `4407911123456`. Numbers that do not parse have none.
pub fn national_variant(phone: &Value) -> Option<String> {
    let digits = match phone {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let parsed = match phonenumber::parse(None, format!("+{digits}")) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("No national variant for {}: {}", digits, e);
            return None;
        }
    };
    let national: String = parsed
        .format()
        .mode(phonenumber::Mode::National)
        .to_string()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    let variant = format!("{}{}", parsed.code().value(), national);
    if variant == digits {
        return None;
    }
    debug!("National variant of {} is {}", digits, variant);
    Some(variant)
}

/// Rows for a bulk import, each stamped with its own `dateString`.
///
/// Items without `to`/`from` are skipped. Every row is complete before
/// this returns, so the batch is only submitted once fully formatted.
pub fn bulk_tracking_rows(
    items: &[Value],
    tracking: &TrackingConfig,
    double_format: bool,
) -> Vec<TrackingRow> {
    let now = DateTimeParser::now_for_upsert();
    items
        .iter()
        .flat_map(|item| {
            let timestamp = item_timestamp(item).unwrap_or_else(|| now.clone());
            match tracking_rows(item, &timestamp, tracking, double_format) {
                Ok(rows) => rows,
                Err(_) => {
                    warn!("Skipping bulk tracking item without to/from: {}", item);
                    Vec::new()
                }
            }
        })
        .collect()
}

fn item_timestamp(item: &Value) -> Option<String> {
    let raw = field(item, "dateString")?.as_str()?;
    match DateTimeParser::parse_flexible(raw) {
        Ok(parsed) => Some(DateTimeParser::format_for_upsert(&parsed)),
        Err(e) => {
            debug!("{}, stamping with the current time", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const TS: &str = "03/07/25, 09:05:02";

    #[rstest]
    #[case(json!(15551234567u64), true)]
    #[case(json!("15551234567"), true)]
    #[case(json!(" 4.5 "), true)]
    #[case(json!("15551234567a"), false)]
    #[case(json!(""), false)]
    #[case(json!(null), false)]
    #[case(json!(["1"]), false)]
    fn test_numeric_phone(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(is_numeric(&value), expected);
    }

    #[test]
    fn test_consent_row_serializes_column_names() {
        let row = consent_row(&json!({ "phonenumber": "15551234567", "optinstatus": "true" }), TS)
            .unwrap();
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({ "phoneNumber": "15551234567", "optinstatus": "true", "timestamp": TS })
        );
    }

    #[test]
    fn test_consent_validation() {
        for body in [
            json!({ "optinstatus": "true" }),
            json!({ "phonenumber": "abc", "optinstatus": "true" }),
            json!({ "phonenumber": "1555" }),
            json!([1, 2]),
        ] {
            let err = consent_row(&body, TS).unwrap_err();
            assert!(matches!(err, AppError::Validation { ref message } if message == CONSENT_INVALID));
        }
        // Explicit null counts as present
        assert!(consent_row(&json!({ "phonenumber": 1, "optinstatus": null }), TS).is_ok());
    }

    #[test]
    fn test_feedback_row() {
        let row = feedback_row(
            &json!({ "phonenumber": 15551234567u64, "name": "rating", "value": 5 }),
            TS,
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({
                "phoneNumber": 15551234567u64,
                "paramName": "rating",
                "paramValue": 5,
                "timestamp": TS
            })
        );

        let err = feedback_row(&json!({ "phonenumber": "1", "name": "rating" }), TS).unwrap_err();
        assert!(matches!(err, AppError::Validation { ref message } if message == FEEDBACK_INVALID));
    }

    #[test]
    fn test_tracking_row_market_and_optional_columns() {
        let tracking = TrackingConfig::default();
        let row = tracking_row(
            &json!({
                "to": "15551234567",
                "from": "966544259926",
                "channel": "whatsapp",
                "message_uuid": "m-1",
                "status": "delivered"
            }),
            TS,
            &tracking,
        )
        .unwrap();
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({
                "To": "15551234567",
                "From": "966544259926",
                "Channel": "whatsapp",
                "Message_uuid": "m-1",
                "Timestamp": TS,
                "Status": "delivered",
                "MID": "KSA"
            })
        );

        let row = tracking_row(&json!({ "to": "1", "from": 5511992007729u64 }), TS, &tracking)
            .unwrap();
        assert_eq!(row.market, "unmatched");
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({ "To": "1", "From": 5511992007729u64, "Timestamp": TS, "MID": "unmatched" })
        );
    }

    #[rstest]
    #[case(json!("447911123456"), Some("4407911123456"))]
    #[case(json!(447911123456u64), Some("4407911123456"))]
    #[case(json!("12025550123"), None)]
    #[case(json!("not a number"), None)]
    #[case(json!(true), None)]
    fn test_national_variant(#[case] phone: Value, #[case] expected: Option<&str>) {
        assert_eq!(national_variant(&phone).as_deref(), expected);
    }

    #[rstest]
    #[case(false, 1)]
    #[case(true, 2)]
    fn test_consent_rows_double_format(#[case] double_format: bool, #[case] expected: usize) {
        let body = json!({ "phonenumber": "447911123456", "optinstatus": "true" });
        let rows = consent_rows(&body, TS, double_format).unwrap();
        assert_eq!(rows.len(), expected);

        let original = rows.last().unwrap();
        assert_eq!(original.phone_number, json!("447911123456"));
        if double_format {
            assert_eq!(rows[0].phone_number, json!("4407911123456"));
            assert_eq!(rows[0].optinstatus, original.optinstatus);
        }
    }

    #[test]
    fn test_double_format_skips_numbers_already_national() {
        let body = json!({ "phonenumber": "12025550123", "name": "rating", "value": 5 });
        assert_eq!(feedback_rows(&body, TS, true).unwrap().len(), 1);
    }

    #[test]
    fn test_feedback_rows_twin_keeps_parameters() {
        let body = json!({ "phonenumber": 447911123456u64, "name": "rating", "value": 5 });
        let rows = feedback_rows(&body, TS, true).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].phone_number, json!("4407911123456"));
        assert_eq!(rows[0].param_name, json!("rating"));
        assert_eq!(rows[1].phone_number, json!(447911123456u64));
    }

    #[test]
    fn test_tracking_rows_twin_suffixes_message_id() {
        let tracking = TrackingConfig::default();
        let body = json!({ "to": "447911123456", "from": "5511992007729", "message_uuid": "m-1" });
        let rows = tracking_rows(&body, TS, &tracking, true).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].to, json!("4407911123456"));
        assert_eq!(rows[0].message_uuid, Some(json!("m-1_2")));
        assert_eq!(rows[0].market, "BR");
        assert_eq!(rows[1].to, json!("447911123456"));
        assert_eq!(rows[1].message_uuid, Some(json!("m-1")));
    }

    #[test]
    fn test_bulk_rows_include_twins() {
        let tracking = TrackingConfig::default();
        let items = vec![
            json!({ "to": "447911123456", "from": "x", "message_uuid": 7, "dateString": "2025-03-07 09:05:02" }),
            json!({ "to": "12025550123", "from": "x" }),
        ];

        let rows = bulk_tracking_rows(&items, &tracking, true);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].message_uuid, Some(json!("7_2")));
        assert_eq!(rows[0].timestamp, TS);
        assert_eq!(rows[2].to, json!("12025550123"));
    }

    #[test]
    fn test_bulk_rows_skip_invalid_and_format_dates() {
        let tracking = TrackingConfig::default();
        let items = vec![
            json!({ "to": "1", "from": "5511992007729", "dateString": "2025-03-07 09:05:02" }),
            json!({ "from": "5511992007729" }),
            json!({ "to": "2", "from": "x", "dateString": "yesterday-ish" }),
        ];

        let rows = bulk_tracking_rows(&items, &tracking, false);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, TS);
        assert_eq!(rows[0].market, "BR");
        // Unparsable dates fall back to the current time
        assert!(
            chrono::NaiveDateTime::parse_from_str(
                &rows[1].timestamp,
                crate::utils::datetime::UPSERT_TIMESTAMP_FORMAT
            )
            .is_ok()
        );
    }
}
