// Copyright 2026 danecert contributors
// SPDX-License-Identifier: Apache-2.0

//! Self-signed certificate synthesis.
//!
//! The certificate contract is strict about its three extensions: they appear
//! in the order [BasicConstraints, KeyUsage, SubjectAlternativeName] and all
//! of them are non-critical, so a verifier that does not understand one must
//! not reject the certificate. The builder runs with `Profile::Manual` and
//! every extension is added explicitly.

use crate::error::{Error, Result};
use crate::keys::KeyPair;
use std::net::IpAddr;
use std::str::FromStr;
use time::{Date, Month, OffsetDateTime};
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::asn1::{Ia5String, OctetString, UtcTime};
use x509_cert::der::oid::AssociatedOid;
use x509_cert::der::{Decode, Encode, EncodePem, Length, Writer};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages, SubjectAltName};
use x509_cert::ext::{AsExtension, Extension};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};

/// Serial numbers carry 18 bytes of entropy.
pub const SERIAL_LEN: usize = 18;

/// A synthesized self-signed certificate.
pub struct Cert {
    /// The certificate in PEM format.
    pub pem: String,
    /// The random serial number embedded in the certificate.
    pub serial: [u8; SERIAL_LEN],
}

/// Parse `ip` as an IPv4/IPv6 literal. The SAN entry is the byte-encoded
/// address, so an unparseable literal cannot be embedded; callers reject the
/// request before doing any expensive work.
pub fn parse_ip(ip: &str) -> Result<IpAddr> {
    ip.parse().map_err(|_| Error::InvalidIp {
        ip: ip.to_string(),
        reason: "not an IPv4 or IPv6 literal".into(),
    })
}

impl Cert {
    /// Build a self-signed certificate for `domain`/`addr`, signed by `keys`
    /// under the same RSASSA-PKCS1-v1_5/SHA-256 profile the keys were
    /// generated with.
    ///
    /// Subject and issuer are both `CN=<domain>`; the SAN lists
    /// `DNS=<domain>`, `DNS=*.<domain>` and `IP=<addr>`. The domain string is
    /// embedded verbatim (the caller-facing validator owns format checks).
    pub fn synthesize(domain: &str, addr: IpAddr, keys: &KeyPair) -> Result<Self> {
        let serial = generate_serial();
        let serial_number = SerialNumber::new(&serial)?;

        let today = OffsetDateTime::now_utc().date();
        let (not_before, not_after) = validity_window(today);
        let validity = Validity {
            not_before: day_start(not_before)?,
            not_after: day_start(not_after)?,
        };

        let subject = Name::from_str(&format!("CN={domain}")).map_err(|e| {
            Error::InvalidDomain {
                domain: domain.to_string(),
                reason: format!("not usable as a common name: {e}"),
            }
        })?;

        let spki_der = keys.public_key_der()?;
        let spki = SubjectPublicKeyInfoOwned::from_der(&spki_der)?;

        let signer = keys.signer();
        let mut builder = CertificateBuilder::new(
            Profile::Manual { issuer: None },
            serial_number,
            validity,
            subject,
            spki,
            &signer,
        )?;

        builder.add_extension(&NonCritical(BasicConstraints {
            ca: false,
            path_len_constraint: None,
        }))?;
        builder.add_extension(&NonCritical(KeyUsage(
            KeyUsages::DigitalSignature
                | KeyUsages::NonRepudiation
                | KeyUsages::KeyEncipherment
                | KeyUsages::DataEncipherment,
        )))?;
        builder.add_extension(&NonCritical(subject_alt_name(domain, addr)?))?;

        let cert = builder.build::<rsa::pkcs1v15::Signature>()?;
        let pem = cert.to_pem(x509_cert::der::pem::LineEnding::LF)?;

        Ok(Self { pem, serial })
    }

    /// Human-display form of the serial: uppercase hex with a space between
    /// every 2-byte group. The spacing is cosmetic; consumers parsing the
    /// serial as a number must strip it.
    pub fn display_serial(&self) -> String {
        self.serial
            .chunks(2)
            .map(|pair| pair.iter().map(|b| format!("{b:02X}")).collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Draw 18 random bytes. The first byte is forced into `0x01..=0x7f`: no
/// sign bit (the DER INTEGER stays positive) and no leading zero (canonical
/// DER would strip it and the encoded serial would shrink to 17 bytes).
fn generate_serial() -> [u8; SERIAL_LEN] {
    use rand::{Rng, RngCore};
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; SERIAL_LEN];
    rng.fill_bytes(&mut bytes);
    bytes[0] = rng.gen_range(0x01..=0x7f);
    bytes
}

/// Validity window at day granularity: [yesterday, one calendar year out].
/// Truncating the time-of-day widens the effective window slightly; the
/// one-day backdate absorbs clock skew.
fn validity_window(today: Date) -> (Date, Date) {
    let not_before = today.previous_day().unwrap_or(today);
    let not_after = match today.replace_year(today.year() + 1) {
        Ok(d) => d,
        // Feb 29 with no Feb 29 next year rolls forward to Mar 1
        Err(_) => Date::from_calendar_date(today.year() + 1, Month::March, 1)
            .unwrap_or(today),
    };
    (not_before, not_after)
}

/// Midnight UTC of `date` as an X.509 validity time.
fn day_start(date: Date) -> Result<Time> {
    let secs = date.midnight().assume_utc().unix_timestamp();
    let utc = UtcTime::from_unix_duration(std::time::Duration::from_secs(secs as u64))?;
    Ok(Time::UtcTime(utc))
}

fn subject_alt_name(domain: &str, addr: IpAddr) -> Result<SubjectAltName> {
    let dns_name = |name: &str| -> Result<GeneralName> {
        Ok(GeneralName::DnsName(Ia5String::new(name)?))
    };
    let octets = match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    };
    Ok(SubjectAltName(vec![
        dns_name(domain)?,
        dns_name(&format!("*.{domain}"))?,
        GeneralName::IpAddress(OctetString::new(octets)?),
    ]))
}

/// Forces an extension to be encoded with `critical = FALSE` regardless of
/// the wrapped type's default.
struct NonCritical<T>(T);

impl<T: AssociatedOid> AssociatedOid for NonCritical<T> {
    const OID: x509_cert::der::asn1::ObjectIdentifier = T::OID;
}

impl<T: Encode> Encode for NonCritical<T> {
    fn encoded_len(&self) -> x509_cert::der::Result<Length> {
        self.0.encoded_len()
    }

    fn encode(&self, writer: &mut impl Writer) -> x509_cert::der::Result<()> {
        self.0.encode(writer)
    }
}

impl<T: AsExtension> AsExtension for NonCritical<T> {
    fn critical(&self, _subject: &Name, _extensions: &[Extension]) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::test_key_pair;
    use x509_parser::extensions::GeneralName as X509Name;
    use x509_parser::extensions::ParsedExtension;
    use x509_parser::prelude::X509Certificate;
    use x509_parser::prelude::FromDer;

    fn parse(pem_str: &str) -> Vec<u8> {
        let pem = ::pem::parse(pem_str).expect("PEM parse");
        assert_eq!(pem.tag(), "CERTIFICATE");
        pem.into_contents()
    }

    #[test]
    fn test_synthesize_subject_and_san() {
        let cert = Cert::synthesize("example.com", parse_ip("93.184.216.34").unwrap(), test_key_pair())
            .expect("synthesis");
        let der = parse(&cert.pem);
        let (_, parsed) = X509Certificate::from_der(&der).expect("X.509 parse");

        let cn = parsed
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .expect("common name");
        assert_eq!(cn, "example.com");
        // self-signed: issuer equals subject
        assert_eq!(parsed.subject().to_string(), parsed.issuer().to_string());
        // the serial survives DER encoding at full length
        assert_eq!(parsed.raw_serial().len(), SERIAL_LEN);

        let san = parsed
            .subject_alternative_name()
            .expect("SAN extension parse")
            .expect("SAN extension present");
        let names: Vec<String> = san
            .value
            .general_names
            .iter()
            .map(|n| match n {
                X509Name::DNSName(d) => format!("dns:{d}"),
                X509Name::IPAddress(ip) => {
                    format!("ip:{}", hex::encode(ip))
                }
                other => format!("other:{other:?}"),
            })
            .collect();
        assert_eq!(
            names,
            vec![
                "dns:example.com".to_string(),
                "dns:*.example.com".to_string(),
                "ip:5db8d822".to_string(), // 93.184.216.34
            ]
        );
    }

    #[test]
    fn test_extensions_order_and_criticality() {
        let cert = Cert::synthesize("example.com", parse_ip("93.184.216.34").unwrap(), test_key_pair())
            .expect("synthesis");
        let der = parse(&cert.pem);
        let (_, parsed) = X509Certificate::from_der(&der).expect("X.509 parse");

        let exts = parsed.extensions();
        assert_eq!(exts.len(), 3);
        assert_eq!(exts[0].oid, x509_parser::oid_registry::OID_X509_EXT_BASIC_CONSTRAINTS);
        assert_eq!(exts[1].oid, x509_parser::oid_registry::OID_X509_EXT_KEY_USAGE);
        assert_eq!(
            exts[2].oid,
            x509_parser::oid_registry::OID_X509_EXT_SUBJECT_ALT_NAME
        );
        for ext in exts {
            assert!(!ext.critical, "extension {} must be non-critical", ext.oid);
        }

        match exts[0].parsed_extension() {
            ParsedExtension::BasicConstraints(bc) => {
                assert!(!bc.ca);
                assert!(bc.path_len_constraint.is_none());
            }
            other => panic!("expected BasicConstraints, got {other:?}"),
        }
        match exts[1].parsed_extension() {
            ParsedExtension::KeyUsage(ku) => {
                assert!(ku.digital_signature());
                assert!(ku.non_repudiation());
                assert!(ku.key_encipherment());
                assert!(ku.data_encipherment());
                assert!(!ku.key_cert_sign());
            }
            other => panic!("expected KeyUsage, got {other:?}"),
        }
    }

    #[test]
    fn test_validity_day_granularity() {
        let cert = Cert::synthesize("example.com", parse_ip("93.184.216.34").unwrap(), test_key_pair())
            .expect("synthesis");
        let der = parse(&cert.pem);
        let (_, parsed) = X509Certificate::from_der(&der).expect("X.509 parse");

        let today = OffsetDateTime::now_utc().date();
        let (expected_nb, expected_na) = validity_window(today);

        assert_eq!(
            parsed.validity().not_before.timestamp(),
            expected_nb.midnight().assume_utc().unix_timestamp()
        );
        assert_eq!(
            parsed.validity().not_after.timestamp(),
            expected_na.midnight().assume_utc().unix_timestamp()
        );
    }

    #[test]
    fn test_validity_window_plain_year() {
        let today = Date::from_calendar_date(2026, Month::August, 30).unwrap();
        let (nb, na) = validity_window(today);
        assert_eq!(nb, Date::from_calendar_date(2026, Month::August, 29).unwrap());
        assert_eq!(na, Date::from_calendar_date(2027, Month::August, 30).unwrap());
    }

    #[test]
    fn test_validity_window_leap_day() {
        let today = Date::from_calendar_date(2028, Month::February, 29).unwrap();
        let (nb, na) = validity_window(today);
        assert_eq!(nb, Date::from_calendar_date(2028, Month::February, 28).unwrap());
        assert_eq!(na, Date::from_calendar_date(2029, Month::March, 1).unwrap());
    }

    #[test]
    fn test_serials_differ_between_issuances() {
        let a = Cert::synthesize("example.com", parse_ip("93.184.216.34").unwrap(), test_key_pair())
            .expect("synthesis");
        let b = Cert::synthesize("example.com", parse_ip("93.184.216.34").unwrap(), test_key_pair())
            .expect("synthesis");
        assert_ne!(a.serial, b.serial);
    }

    #[test]
    fn test_display_serial_format() {
        let cert = Cert {
            pem: String::new(),
            serial: [
                0x0A, 0x1B, 0x2C, 0x3D, 0x4E, 0x5F, 0x60, 0x71, 0x82, 0x93, 0xA4, 0xB5,
                0xC6, 0xD7, 0xE8, 0xF9, 0x00, 0x11,
            ],
        };
        let shown = cert.display_serial();
        assert_eq!(shown, "0A1B 2C3D 4E5F 6071 8293 A4B5 C6D7 E8F9 0011");
        // 18 bytes -> 36 hex chars + 8 separators
        assert_eq!(shown.len(), 44);
    }

    #[test]
    fn test_ipv6_san() {
        let cert = Cert::synthesize("example.com", parse_ip("::1").unwrap(), test_key_pair())
            .expect("synthesis");
        let der = parse(&cert.pem);
        let (_, parsed) = X509Certificate::from_der(&der).expect("X.509 parse");
        let san = parsed
            .subject_alternative_name()
            .expect("SAN parse")
            .expect("SAN present");
        let has_v6 = san.value.general_names.iter().any(|n| {
            matches!(n, X509Name::IPAddress(bytes) if bytes.len() == 16)
        });
        assert!(has_v6);
    }

    #[test]
    fn test_rejects_unparseable_ip() {
        let result = parse_ip("not-an-ip");
        assert!(matches!(result, Err(crate::Error::InvalidIp { .. })));
        assert!(parse_ip("").is_err());
        assert!(parse_ip("999.0.0.1").is_err());
    }

    #[test]
    fn test_serial_first_byte_avoids_sign_and_leading_zero() {
        for _ in 0..512 {
            let serial = generate_serial();
            assert!((0x01..=0x7f).contains(&serial[0]), "first byte {:#04x}", serial[0]);
        }
    }
}
