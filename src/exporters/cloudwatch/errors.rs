use bytes::Bytes;
use flate2::write::GzDecoder;
use serde::Deserialize;
use std::{fmt::Display, io::Write, str};
use thiserror::Error;
use tower::BoxError;

use crate::exporters::http::{client::ResponseDecode, types::ContentEncoding};

/// Decoded CloudWatch Logs API error responses
#[derive(Debug, Clone)]
pub(crate) enum CloudwatchResponse {
    Empty,
    Unknown(String, String),
    ExpiredTokenException(String),
    InvalidParameterException(String),
    ResourceNotFoundException(String),
    ServiceUnavailableException(String),
    UnrecognizedClientException(String),
    ResourceAlreadyExistsException(String),

    // The sink's write sequencing failures carry the token it expected next
    InvalidSequenceTokenException(String, Option<String>),
    DataAlreadyAcceptedException(String, Option<String>),
}

impl CloudwatchResponse {
    /// Token the remote sink expects for the next write, when the response
    /// carries one. Used to resynchronize the local cursor.
    pub(crate) fn expected_sequence_token(&self) -> Option<&String> {
        match self {
            CloudwatchResponse::InvalidSequenceTokenException(_, token) => token.as_ref(),
            CloudwatchResponse::DataAlreadyAcceptedException(_, token) => token.as_ref(),
            _ => None,
        }
    }
}

impl Display for CloudwatchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudwatchResponse::Empty => write!(f, ""),
            CloudwatchResponse::Unknown(_type, msg) => {
                write!(f, "Unknown error: {} ({})", _type, msg)
            }
            CloudwatchResponse::ExpiredTokenException(msg) => {
                write!(f, "ExpiredTokenException: {}", msg)
            }
            CloudwatchResponse::InvalidParameterException(msg) => {
                write!(f, "InvalidParameterException: {}", msg)
            }
            CloudwatchResponse::ResourceNotFoundException(msg) => {
                write!(f, "ResourceNotFoundException: {}", msg)
            }
            CloudwatchResponse::ServiceUnavailableException(msg) => {
                write!(f, "ServiceUnavailableException: {}", msg)
            }
            CloudwatchResponse::UnrecognizedClientException(msg) => {
                write!(f, "UnrecognizedClientException: {}", msg)
            }
            CloudwatchResponse::ResourceAlreadyExistsException(msg) => {
                write!(f, "ResourceAlreadyExistsException: {}", msg)
            }
            CloudwatchResponse::InvalidSequenceTokenException(msg, _) => {
                write!(f, "InvalidSequenceTokenException: {}", msg)
            }
            CloudwatchResponse::DataAlreadyAcceptedException(msg, _) => {
                write!(f, "DataAlreadyAcceptedException: {}", msg)
            }
        }
    }
}

/// Failure of a single delivery attempt
#[derive(Debug, Error)]
pub(crate) enum DeliveryError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("CloudWatch Logs error ({status}): {response}")]
    Api {
        status: http::StatusCode,
        response: CloudwatchResponse,
    },
}

#[derive(Deserialize)]
struct CloudwatchResponsePayload {
    #[serde(rename = "__type")]
    _type: Option<String>,

    message: Option<String>,

    #[serde(rename = "expectedSequenceToken")]
    expected_sequence_token: Option<String>,
}

#[derive(Default, Clone)]
pub(crate) struct CloudwatchDecoder;

impl ResponseDecode<CloudwatchResponse> for CloudwatchDecoder {
    fn decode(&self, body: Bytes, ce: ContentEncoding) -> Result<CloudwatchResponse, BoxError> {
        let body = match ce {
            ContentEncoding::None => body,
            ContentEncoding::Gzip => gzip_decode(body)?,
        };

        let payload: CloudwatchResponsePayload = match serde_json::from_slice(&body) {
            Ok(p) => p,
            Err(_e) => {
                // Unclear if all responses are covered, just save as a string
                let str_payload = str::from_utf8(&body)
                    .map(|s| s.to_string())
                    .map_err(|e| format!("error decoding response: {}", e))?;
                return Ok(CloudwatchResponse::Unknown(
                    "ParseError".to_string(),
                    str_payload,
                ));
            }
        };

        match payload._type {
            Some(t) => {
                let msg = payload.message.unwrap_or_default();

                match t.as_str() {
                    "ExpiredTokenException" => Ok(CloudwatchResponse::ExpiredTokenException(msg)),
                    "InvalidParameterException" => {
                        Ok(CloudwatchResponse::InvalidParameterException(msg))
                    }
                    "ResourceNotFoundException" => {
                        Ok(CloudwatchResponse::ResourceNotFoundException(msg))
                    }
                    "ServiceUnavailableException" => {
                        Ok(CloudwatchResponse::ServiceUnavailableException(msg))
                    }
                    "UnrecognizedClientException" => {
                        Ok(CloudwatchResponse::UnrecognizedClientException(msg))
                    }
                    "ResourceAlreadyExistsException" => {
                        Ok(CloudwatchResponse::ResourceAlreadyExistsException(msg))
                    }
                    "InvalidSequenceTokenException" => {
                        Ok(CloudwatchResponse::InvalidSequenceTokenException(
                            msg,
                            payload.expected_sequence_token,
                        ))
                    }
                    "DataAlreadyAcceptedException" => {
                        Ok(CloudwatchResponse::DataAlreadyAcceptedException(
                            msg,
                            payload.expected_sequence_token,
                        ))
                    }
                    _ => Ok(CloudwatchResponse::Unknown(t, msg)),
                }
            }
            None => Ok(CloudwatchResponse::Empty),
        }
    }
}

fn gzip_decode(body: Bytes) -> Result<Bytes, BoxError> {
    let buf_out = Vec::new();
    let mut dec = GzDecoder::new(buf_out);
    if let Err(e) = dec.write_all(body.as_ref()) {
        return Err(format!("failed to GZ decode response: {}", e).into());
    }

    match dec.finish() {
        Ok(buf) => Ok(Bytes::from(buf)),
        Err(e) => Err(format!("failed to finish gzip decode of response: {}", e).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(body: &str) -> CloudwatchResponse {
        CloudwatchDecoder
            .decode(Bytes::from(body.to_string()), ContentEncoding::None)
            .unwrap()
    }

    #[test]
    fn test_decode_known_exception() {
        let resp = decode(
            r#"{"__type":"ResourceNotFoundException","message":"The specified log group does not exist."}"#,
        );
        assert!(matches!(
            resp,
            CloudwatchResponse::ResourceNotFoundException(_)
        ));
    }

    #[test]
    fn test_decode_sequence_token_mismatch() {
        let resp = decode(
            r#"{"__type":"InvalidSequenceTokenException","message":"The given sequenceToken is invalid.","expectedSequenceToken":"49590302938407"}"#,
        );

        assert_eq!(
            resp.expected_sequence_token().map(String::as_str),
            Some("49590302938407")
        );
    }

    #[test]
    fn test_decode_data_already_accepted() {
        let resp = decode(
            r#"{"__type":"DataAlreadyAcceptedException","message":"The given batch was already accepted.","expectedSequenceToken":"42"}"#,
        );

        assert_eq!(resp.expected_sequence_token().map(String::as_str), Some("42"));
    }

    #[test]
    fn test_decode_empty_and_unknown() {
        assert!(matches!(decode("{}"), CloudwatchResponse::Empty));
        assert!(matches!(
            decode(r#"{"__type":"SomethingNew","message":"?"}"#),
            CloudwatchResponse::Unknown(_, _)
        ));
        assert!(matches!(
            decode("not json"),
            CloudwatchResponse::Unknown(_, _)
        ));
    }
}
