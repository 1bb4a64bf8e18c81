use super::*;

#[test]
fn error_displays_code_and_message() {
    let err = ApiError::new(ErrorCode::NotFound, "order 9 not found");
    assert_eq!(err.to_string(), "NotFound: order 9 not found");
}

#[test]
fn error_body_uses_snake_case_codes() {
    let err = ApiError::new(ErrorCode::InvalidTransition, "already delivered");
    let body = serde_json::to_value(&err).expect("json");
    assert_eq!(
        body,
        serde_json::json!({ "code": "invalid_transition", "message": "already delivered" })
    );

    let parsed: ApiError = serde_json::from_value(body).expect("json");
    assert_eq!(parsed.code, ErrorCode::InvalidTransition);
}
