use axum::body::Bytes;
use serde_json::Value;

use crate::{
    error::AppError::{self, InternalError, InvalidField, MalformedPayload},
    models::{Answer, Credential, ExportRow, SubmissionRequest},
};

pub const INVALID_USER_ID: &str = "Invalid admin.userId";
pub const INVALID_REPEAT_COUNT: &str = "Invalid admin.repeatCount";
pub const MISSING_PASSWORD: &str = "admin.dbPassword is required";
pub const EMPTY_ANSWERS: &str = "answers must be a non-empty array";
pub const INVALID_ANSWER_ID: &str = "answers[].id must be string";
pub const INVALID_ANSWER_VALUE: &str = "answers[].value must be a finite number";
pub const MISSING_EXPORT_PASSWORD: &str = "X-Db-Password header is required";

pub const EXPORT_HEADER: [&str; 5] = [
    "submission_id",
    "user_id",
    "repeat_count",
    "question_id",
    "value",
];

pub fn get_request_from_body(body: Bytes) -> Result<SubmissionRequest, AppError> {
    let value: Value = serde_json::from_slice(&body).map_err(|_| MalformedPayload)?;

    validate(&value)
}

/// Checks run in a fixed order and the first failure is reported.
pub fn validate(body: &Value) -> Result<SubmissionRequest, AppError> {
    let admin = body.get("admin").filter(|admin| admin.is_object());

    let user_id = admin
        .and_then(|admin| admin.get("userId"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|user_id| !user_id.is_empty())
        .ok_or(InvalidField(INVALID_USER_ID))?;

    let repeat_count = admin
        .and_then(|admin| admin.get("repeatCount"))
        .and_then(positive_int)
        .ok_or(InvalidField(INVALID_REPEAT_COUNT))?;

    let password = admin
        .and_then(|admin| admin.get("dbPassword"))
        .and_then(Value::as_str)
        .filter(|password| !password.is_empty())
        .ok_or(InvalidField(MISSING_PASSWORD))?;

    let raw_answers = body
        .get("answers")
        .and_then(Value::as_array)
        .filter(|answers| !answers.is_empty())
        .ok_or(InvalidField(EMPTY_ANSWERS))?;

    let answers = raw_answers
        .iter()
        .map(get_answer)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SubmissionRequest {
        user_id: user_id.to_string(),
        repeat_count,
        credential: Credential::new(password),
        answers,
    })
}

fn get_answer(raw: &Value) -> Result<Answer, AppError> {
    let question_id = raw
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(InvalidField(INVALID_ANSWER_ID))?;

    let value = raw
        .get("value")
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
        .ok_or(InvalidField(INVALID_ANSWER_VALUE))?;

    Ok(Answer {
        question_id: question_id.to_string(),
        value,
    })
}

// Accepts 2, 2.0, "2" and true alike, as long as it fits the INTEGER column.
fn positive_int(raw: &Value) -> Option<i32> {
    let n = coerce_number(raw)?;
    if !n.is_finite() || n.fract() != 0.0 || n < 1.0 || n > i32::MAX as f64 {
        return None;
    }

    Some(n as i32)
}

/// Loose numeric conversion for form fields: booleans count as 0/1, strings are
/// trimmed and parsed with a blank string read as 0, and hex/octal/binary
/// prefixes are honoured.
fn coerce_number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::String(s) => parse_number(s.trim()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    if s.is_empty() {
        return Some(0.0);
    }

    let radix = match s.get(..2) {
        Some("0x" | "0X") => 16,
        Some("0o" | "0O") => 8,
        Some("0b" | "0B") => 2,
        _ => return s.parse::<f64>().ok().filter(|n| !n.is_nan()),
    };

    u64::from_str_radix(&s[2..], radix).ok().map(|n| n as f64)
}

/// Renders export rows as CSV. The header line is always present.
pub fn export_csv(rows: &[ExportRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer
        .write_record(EXPORT_HEADER)
        .map_err(|e| InternalError(Box::new(e)))?;

    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| InternalError(Box::new(e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| InternalError(Box::new(e.into_error())))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn reason(body: Value) -> String {
        validate(&body).unwrap_err().to_string()
    }

    fn valid() -> Value {
        json!({
            "admin": { "userId": "u1", "repeatCount": 2, "dbPassword": "x" },
            "answers": [{ "id": "q1", "value": 7.5 }]
        })
    }

    #[test]
    fn test_valid_request() {
        let request = validate(&valid()).unwrap();

        assert_eq!(request.user_id, "u1");
        assert_eq!(request.repeat_count, 2);
        assert_eq!(request.credential.expose(), "x");
        assert_eq!(
            request.answers,
            vec![Answer {
                question_id: "q1".into(),
                value: 7.5
            }]
        );
    }

    #[test]
    fn test_user_id_is_trimmed() {
        let mut body = valid();
        body["admin"]["userId"] = json!("  u1 ");

        assert_eq!(validate(&body).unwrap().user_id, "u1");
    }

    #[test]
    fn test_missing_admin() {
        assert_eq!(reason(json!({ "answers": [] })), INVALID_USER_ID);
        assert_eq!(reason(json!({ "admin": "u1" })), INVALID_USER_ID);
        assert_eq!(reason(json!([])), INVALID_USER_ID);
    }

    #[test]
    fn test_blank_user_id() {
        let mut body = valid();
        body["admin"]["userId"] = json!("   ");
        assert_eq!(reason(body), INVALID_USER_ID);

        let mut body = valid();
        body["admin"]["userId"] = json!(17);
        assert_eq!(reason(body), INVALID_USER_ID);
    }

    #[test]
    fn test_repeat_count() {
        for bad in [
            json!(0),
            json!(-3),
            json!(1.5),
            json!(null),
            json!(4294967296u64),
            json!("2.5"),
            json!(""),
            json!("abc"),
            json!(false),
            json!([2]),
        ] {
            let mut body = valid();
            body["admin"]["repeatCount"] = bad;
            assert_eq!(reason(body), INVALID_REPEAT_COUNT);
        }

        let mut body = valid();
        body["admin"]["repeatCount"] = json!(3.0);
        assert_eq!(validate(&body).unwrap().repeat_count, 3);
    }

    #[test]
    fn test_repeat_count_coercion() {
        for (raw, expected) in [
            (json!("2"), 2),
            (json!(" 3 "), 3),
            (json!("4.0"), 4),
            (json!("0x10"), 16),
            (json!(true), 1),
        ] {
            let mut body = valid();
            body["admin"]["repeatCount"] = raw.clone();
            assert_eq!(validate(&body).unwrap().repeat_count, expected, "{raw}");
        }
    }

    #[test]
    fn test_missing_repeat_count() {
        let mut body = valid();
        body["admin"].as_object_mut().unwrap().remove("repeatCount");

        assert_eq!(reason(body), INVALID_REPEAT_COUNT);
    }

    #[test]
    fn test_password_required() {
        let mut body = valid();
        body["admin"]["dbPassword"] = json!("");
        assert_eq!(reason(body), MISSING_PASSWORD);

        let mut body = valid();
        body["admin"].as_object_mut().unwrap().remove("dbPassword");
        assert_eq!(reason(body), MISSING_PASSWORD);
    }

    #[test]
    fn test_answers_must_be_non_empty() {
        let mut body = valid();
        body["answers"] = json!([]);
        assert_eq!(reason(body), EMPTY_ANSWERS);

        let mut body = valid();
        body["answers"] = json!({ "id": "q1", "value": 1 });
        assert_eq!(reason(body), EMPTY_ANSWERS);
    }

    #[test]
    fn test_answer_fields() {
        let mut body = valid();
        body["answers"] = json!([{ "id": "q1", "value": 1 }, { "id": "", "value": 2 }]);
        assert_eq!(reason(body), INVALID_ANSWER_ID);

        let mut body = valid();
        body["answers"] = json!([{ "id": "q1", "value": "NaN" }]);
        assert_eq!(reason(body), INVALID_ANSWER_VALUE);

        let mut body = valid();
        body["answers"] = json!([{ "id": "q1" }]);
        assert_eq!(reason(body), INVALID_ANSWER_VALUE);
    }

    #[test]
    fn test_first_failure_wins() {
        let body = json!({
            "admin": { "userId": "u1", "repeatCount": 0, "dbPassword": "" },
            "answers": []
        });

        assert_eq!(reason(body), INVALID_REPEAT_COUNT);
    }

    #[test]
    fn test_malformed_body() {
        let err = get_request_from_body(Bytes::from_static(b"{not json")).unwrap_err();

        assert!(matches!(err, AppError::MalformedPayload));
    }

    #[test]
    fn test_export_csv() {
        let id = uuid::Uuid::new_v4();
        let rows = vec![
            ExportRow {
                submission_id: id,
                user_id: "u1".into(),
                repeat_count: 2,
                question_id: Some("q1".into()),
                value: Some(7.5),
            },
            ExportRow {
                submission_id: id,
                user_id: "a, b".into(),
                repeat_count: 1,
                question_id: None,
                value: None,
            },
        ];

        let csv = String::from_utf8(export_csv(&rows).unwrap()).unwrap();

        assert_eq!(
            csv,
            format!(
                "submission_id,user_id,repeat_count,question_id,value\n{id},u1,2,q1,7.5\n{id},\"a, b\",1,,\n"
            )
        );
    }

    #[test]
    fn test_empty_export_keeps_header() {
        let csv = String::from_utf8(export_csv(&[]).unwrap()).unwrap();

        assert_eq!(csv, "submission_id,user_id,repeat_count,question_id,value\n");
    }

    #[test]
    fn test_credential_not_in_debug() {
        let request = validate(&valid()).unwrap();

        assert!(!format!("{request:?}").contains("\"x\""));
    }
}
