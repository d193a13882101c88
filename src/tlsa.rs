// Copyright 2026 danecert contributors
// SPDX-License-Identifier: Apache-2.0

//! TLSA record derivation from a persisted certificate.
//!
//! The matching value is produced by the same four-stage transformation an
//! operator would run by hand:
//!
//! ```text
//! openssl x509 -in cert.crt -pubkey -noout \
//!   | openssl pkey -pubin -outform der \
//!   | openssl dgst -sha512 -binary \
//!   | xxd -p
//! ```
//!
//! Each stage runs in-process but consumes exactly the previous stage's
//! output, so every intermediate is byte-identical to the openssl chain. Any
//! stage failure aborts the pipeline; a partial digest is never returned.

use crate::error::{Error, Result};
use sha2::{Digest, Sha512};
use std::path::Path;
use x509_parser::prelude::{FromDer, X509Certificate};

/// Certificate usage: domain-issued certificate (DANE-EE).
pub const TLSA_USAGE: u8 = 3;
/// Selector: SubjectPublicKeyInfo.
pub const TLSA_SELECTOR: u8 = 1;
/// Matching type: SHA-512.
pub const TLSA_MATCHING_TYPE: u8 = 2;

/// Compute the TLSA record value for the certificate stored at `cert_path`.
///
/// Reads the certificate back from disk (the persisted bytes are the source
/// of truth, not the in-memory object that produced them) and returns
/// `"3 1 2 <128 lowercase hex chars>"`.
pub fn compute(cert_path: &Path) -> Result<String> {
    let cert_pem = std::fs::read_to_string(cert_path).map_err(|e| Error::ReadFile {
        path: cert_path.to_path_buf(),
        source: e,
    })?;

    let pubkey_pem = extract_public_key_pem(&cert_pem)?;
    let pubkey_der = public_key_der(&pubkey_pem)?;
    let digest = digest_sha512(&pubkey_der);
    let hex_digest = render_hex(&digest);

    Ok(format!(
        "{TLSA_USAGE} {TLSA_SELECTOR} {TLSA_MATCHING_TYPE} {hex_digest}"
    ))
}

/// Stage 1 (`openssl x509 -pubkey -noout`): certificate PEM to subject
/// public key PEM.
fn extract_public_key_pem(cert_pem: &str) -> Result<String> {
    let pem = ::pem::parse(cert_pem).map_err(|e| Error::TlsaStage {
        stage: "x509",
        reason: format!("failed to parse certificate PEM: {e}"),
    })?;
    if pem.tag() != "CERTIFICATE" {
        return Err(Error::TlsaStage {
            stage: "x509",
            reason: format!("expected CERTIFICATE, got {}", pem.tag()),
        });
    }

    let (_, cert) = X509Certificate::from_der(pem.contents()).map_err(|e| Error::TlsaStage {
        stage: "x509",
        reason: format!("invalid X.509: {e}"),
    })?;

    let spki_der = cert.public_key().raw.to_vec();
    let pubkey = ::pem::Pem::new("PUBLIC KEY", spki_der);
    Ok(::pem::encode_config(
        &pubkey,
        ::pem::EncodeConfig::new().set_line_ending(::pem::LineEnding::LF),
    ))
}

/// Stage 2 (`openssl pkey -pubin -outform der`): public key PEM to DER.
fn public_key_der(pubkey_pem: &str) -> Result<Vec<u8>> {
    let pem = ::pem::parse(pubkey_pem).map_err(|e| Error::TlsaStage {
        stage: "pkey",
        reason: format!("failed to parse public key PEM: {e}"),
    })?;
    if pem.tag() != "PUBLIC KEY" {
        return Err(Error::TlsaStage {
            stage: "pkey",
            reason: format!("expected PUBLIC KEY, got {}", pem.tag()),
        });
    }
    Ok(pem.into_contents())
}

/// Stage 3 (`openssl dgst -sha512 -binary`): SHA-512 over the DER bytes.
fn digest_sha512(der: &[u8]) -> [u8; 64] {
    Sha512::digest(der).into()
}

/// Stage 4 (`xxd -p`): lowercase hex, no line breaks or whitespace.
fn render_hex(digest: &[u8]) -> String {
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::Cert;
    use crate::keys::test_key_pair;

    fn synthesized_cert_file(dir: &std::path::Path) -> std::path::PathBuf {
        let addr = "93.184.216.34".parse().expect("IP literal");
        let cert = Cert::synthesize("example.com", addr, test_key_pair()).expect("synthesis");
        let path = dir.join("example.com.crt");
        std::fs::write(&path, cert.pem).expect("write cert");
        path
    }

    #[test]
    fn test_record_shape() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = synthesized_cert_file(dir.path());

        let record = compute(&path).expect("TLSA computation");
        let mut parts = record.splitn(4, ' ');
        assert_eq!(parts.next(), Some("3"));
        assert_eq!(parts.next(), Some("1"));
        assert_eq!(parts.next(), Some("2"));
        let digest = parts.next().expect("digest field");
        assert_eq!(digest.len(), 128);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_digest_matches_spki() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = synthesized_cert_file(dir.path());

        let record = compute(&path).expect("TLSA computation");
        let expected = hex::encode(Sha512::digest(
            test_key_pair().public_key_der().expect("SPKI export"),
        ));
        assert_eq!(record, format!("3 1 2 {expected}"));
    }

    #[test]
    fn test_stage_output_is_public_key_pem() {
        let addr = "93.184.216.34".parse().expect("IP literal");
        let cert = Cert::synthesize("example.com", addr, test_key_pair()).expect("synthesis");
        let pubkey_pem = extract_public_key_pem(&cert.pem).expect("stage 1");
        assert!(pubkey_pem.starts_with("-----BEGIN PUBLIC KEY-----"));

        let der = public_key_der(&pubkey_pem).expect("stage 2");
        assert_eq!(der, test_key_pair().public_key_der().expect("SPKI export"));
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = compute(&dir.path().join("absent.crt"));
        assert!(matches!(result, Err(Error::ReadFile { .. })));
    }

    #[test]
    fn test_garbage_aborts_first_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bogus.crt");
        std::fs::write(&path, "not a certificate").expect("write");

        match compute(&path) {
            Err(Error::TlsaStage { stage, .. }) => assert_eq!(stage, "x509"),
            other => panic!("expected stage failure, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_pem_tag_aborts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("key-not-cert.crt");
        let key_pem = test_key_pair().to_pkcs8_pem().expect("key PEM");
        std::fs::write(&path, key_pem).expect("write");

        match compute(&path) {
            Err(Error::TlsaStage { stage, .. }) => assert_eq!(stage, "x509"),
            other => panic!("expected stage failure, got {other:?}"),
        }
    }
}
