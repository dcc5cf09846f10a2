use crate::aws_api::creds::AwsCreds;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::header::{AUTHORIZATION, HOST};
use http::{HeaderMap, HeaderValue, Method, Request, Uri};
use http_body_util::Full;
use sha2::{Digest, Sha256};
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Time source for request signing, injectable so tests can pin the
/// signing instant and verify against known signatures.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone)]
pub struct SystemClock {}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing uri is missing a host: {0}")]
    MissingHost(String),

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("failed to build signed request: {0}")]
    BuildRequest(String),
}

/// Signs outbound requests with AWS Signature Version 4. The canonical
/// request covers the host and x-amz-date headers (plus the session token
/// when present); callers' other headers are carried but not signed.
#[derive(Clone)]
pub struct AwsRequestSigner<C: Clock> {
    service: String,
    region: String,
    clock: C,
}

impl<C: Clock> AwsRequestSigner<C> {
    pub fn new(service: &str, region: &str, clock: C) -> Self {
        Self {
            service: service.to_string(),
            region: region.to_string(),
            clock,
        }
    }

    pub fn sign(
        &self,
        uri: Uri,
        method: Method,
        headers: HeaderMap,
        body: Bytes,
        creds: &AwsCreds,
    ) -> Result<Request<Full<Bytes>>, SignerError> {
        let host = match uri.host() {
            None => return Err(SignerError::MissingHost(uri.to_string())),
            Some(h) => match uri.port_u16() {
                Some(p) => format!("{}:{}", h, p),
                None => h.to_string(),
            },
        };

        let now = self.clock.now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let payload_hash = hex::encode(Sha256::digest(&body));

        // Canonical headers must be sorted by name; these three already are.
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = String::from("host;x-amz-date");
        if let Some(token) = creds.session_token() {
            canonical_headers.push_str("x-amz-security-token:");
            canonical_headers.push_str(token);
            canonical_headers.push('\n');
            signed_headers.push_str(";x-amz-security-token");
        }

        let canonical_uri = if uri.path().is_empty() { "/" } else { uri.path() };
        let canonical_querystring = uri.query().unwrap_or("");

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            canonical_querystring,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = derive_signing_key(
            creds.secret_access_key(),
            &date_stamp,
            &self.region,
            &self.service,
        );
        let signature = hex::encode(hmac_sign(&signing_key, string_to_sign.as_bytes()));

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            creds.access_key_id(),
            credential_scope,
            signed_headers,
            signature
        );

        let mut req_builder = Request::builder().uri(uri).method(method);

        let builder_headers = req_builder.headers_mut().unwrap();
        for (k, v) in headers.iter() {
            builder_headers.insert(k, v.clone());
        }

        builder_headers.insert(HOST, header_value(&host)?);
        builder_headers.insert("x-amz-date", header_value(&amz_date)?);
        if let Some(token) = creds.session_token() {
            builder_headers.insert("x-amz-security-token", header_value(token)?);
        }
        builder_headers.insert(AUTHORIZATION, header_value(&authorization)?);

        req_builder
            .body(Full::from(body))
            .map_err(|e| SignerError::BuildRequest(e.to_string()))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, SignerError> {
    HeaderValue::from_str(value).map_err(|e| SignerError::InvalidHeader(e.to_string()))
}

fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sign(format!("AWS4{}", secret).as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sign(&k_date, region.as_bytes());
    let k_service = hmac_sign(&k_region, service.as_bytes());
    hmac_sign(&k_service, b"aws4_request")
}

fn hmac_sign(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn suite_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap())
    }

    fn suite_creds() -> AwsCreds {
        AwsCreds::new(
            "AKIDEXAMPLE".to_string(),
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            None,
        )
    }

    // The get-vanilla case from the AWS SigV4 test suite.
    #[test]
    fn sigv4_test_suite_get_vanilla() {
        let signer = AwsRequestSigner::new("service", "us-east-1", suite_clock());

        let req = signer
            .sign(
                "https://example.amazonaws.com/".parse().unwrap(),
                Method::GET,
                HeaderMap::new(),
                Bytes::new(),
                &suite_creds(),
            )
            .unwrap();

        assert_eq!(req.headers().get("x-amz-date").unwrap(), "20150830T123600Z");
        assert_eq!(req.headers().get(HOST).unwrap(), "example.amazonaws.com");

        let auth = req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert_eq!(
            auth,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
             SignedHeaders=host;x-amz-date, \
             Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
        );
    }

    #[test]
    fn session_token_is_signed() {
        let signer = AwsRequestSigner::new("logs", "us-west-2", suite_clock());
        let creds = AwsCreds::new(
            "AKIDEXAMPLE".to_string(),
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            Some("FwoGZXIvYXdzEBYaD".to_string()),
        );

        let req = signer
            .sign(
                "https://logs.us-west-2.amazonaws.com/".parse().unwrap(),
                Method::POST,
                HeaderMap::new(),
                Bytes::from_static(b"{}"),
                &creds,
            )
            .unwrap();

        assert_eq!(
            req.headers().get("x-amz-security-token").unwrap(),
            "FwoGZXIvYXdzEBYaD"
        );

        let auth = req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap();
        assert!(auth.contains("SignedHeaders=host;x-amz-date;x-amz-security-token"));
    }

    #[test]
    fn missing_host_is_rejected() {
        let signer = AwsRequestSigner::new("logs", "us-east-1", suite_clock());

        let res = signer.sign(
            Uri::from_static("/relative/path"),
            Method::POST,
            HeaderMap::new(),
            Bytes::new(),
            &suite_creds(),
        );

        assert!(matches!(res, Err(SignerError::MissingHost(_))));
    }
}
