// SPDX-License-Identifier: Apache-2.0

use hyper_rustls::ConfigBuilderExt;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime, pem::PemObject};
use std::error::Error;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tower::BoxError;

/// Client-side TLS settings. The default verifies against the platform's
/// native roots; a custom CA can be supplied for private endpoints, and
/// verification can be skipped entirely for local test stacks.
#[derive(Default)]
pub struct Config {
    skip_verify: bool,
    ca_certificate: Option<CertificateDer<'static>>, // if absent, it will use native roots
}

#[derive(Clone, Debug)]
pub(crate) enum FileType {
    File(String),
    Pem(String),
}

#[derive(Clone, Default)]
pub struct ConfigBuilder {
    ca: Option<FileType>,
    tls_skip_verify: bool,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        Default::default()
    }

    pub fn into_client_config(self) -> Result<ClientConfig, Box<dyn Error + Send + Sync>> {
        let client_config = if self.skip_verify {
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(SkipServerVerification::new())
        } else if let Some(cert) = self.ca_certificate {
            let mut root_store = RootCertStore::empty();
            root_store.add(cert)?;

            ClientConfig::builder().with_root_certificates(root_store)
        } else {
            ClientConfig::builder().with_native_roots()?
        };

        Ok(client_config.with_no_client_auth())
    }
}

impl ConfigBuilder {
    pub fn with_ca_file(mut self, ca_file: String) -> Self {
        self.ca = Some(FileType::File(ca_file));
        self
    }

    pub fn with_ca_pem(mut self, ca_pem: String) -> Self {
        self.ca = Some(FileType::Pem(ca_pem));
        self
    }

    pub fn with_tls_skip_verify(mut self, skip_verify: bool) -> Self {
        self.tls_skip_verify = skip_verify;
        self
    }

    pub fn build(self) -> Result<Config, BoxError> {
        let ca_certificate = match self.ca {
            None => None,
            Some(ca) => Some(load_cert(ca)?.into_owned()),
        };

        Ok(Config {
            skip_verify: self.tls_skip_verify,
            ca_certificate,
        })
    }
}

fn load_cert(cert_file: FileType) -> Result<CertificateDer<'static>, Box<dyn Error + Send + Sync>> {
    match cert_file {
        FileType::File(f) => Ok(CertificateDer::from_pem_file(f)?),
        FileType::Pem(f) => Ok(CertificateDer::from_pem_reader(f.as_bytes())?),
    }
}

// Implementation of `ServerCertVerifier` that verifies everything as trustworthy.
//
// THIS SHOULD ONLY BE USED IN SITUATIONS WHERE YOU ABSOLUTELY NEED TO BYPASS SSL
// VERIFICATION FOR TESTING PURPOSES OR WHEN CONNECTING TO A SERVER WITH A SELF-SIGNED CERTIFICATE
// THAT YOU FULLY TRUST!!!
struct SkipServerVerification;

impl SkipServerVerification {
    fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl Debug for SkipServerVerification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SkipServerVerification")
    }
}

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA1,
            SignatureScheme::ECDSA_SHA1_Legacy,
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}
