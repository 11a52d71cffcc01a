use serde::de::DeserializeOwned;
use serde::Serialize;

use jobrelay_core::DomainError;
use jobrelay_infra::messages::DeleteRequest;

// -------------------------
// Request parsing
// -------------------------

/// Parse a JSON request body. Bodies are read raw so that malformed JSON is
/// reported the same way as any other validation failure.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, DomainError> {
    serde_json::from_slice(body).map_err(|e| DomainError::validation(format!("malformed request body: {e}")))
}

pub fn parse_delete_request(body: &[u8]) -> Result<DeleteRequest, DomainError> {
    let request: DeleteRequest = parse_body(body)?;
    if request.uuids.iter().any(|id| id.trim().is_empty()) {
        return Err(DomainError::validation("uuids must not contain empty ids"));
    }
    Ok(request)
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobrelay_infra::messages::MessageQuery;

    #[test]
    fn malformed_json_is_a_validation_error() {
        let err = parse_body::<MessageQuery>(b"{user:").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn delete_requires_uuid_list() {
        assert!(parse_delete_request(br#"{}"#).is_err());
        assert!(parse_delete_request(br#"{"uuids":[""]}"#).is_err());
        assert_eq!(
            parse_delete_request(br#"{"uuids":["n-1"]}"#).unwrap().uuids,
            vec!["n-1"]
        );
    }
}
