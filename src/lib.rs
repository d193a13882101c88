// Copyright 2026 danecert contributors
// SPDX-License-Identifier: Apache-2.0

//! Self-signed certificate and DANE/TLSA record issuance.
//!
//! `danecert` exposes one operation: given a `(domain, ip)` pair it generates
//! a fresh RSA-2048 key, synthesizes a self-signed X.509 certificate for the
//! domain (SANs for the domain, its wildcard, and the IP), persists both under
//! `root/<domain>/`, and derives the DANE-EE TLSA record value
//! (`3 1 2 <sha512-hex>`) from the persisted certificate.
//!
//! The operation is available as a library call ([`issue::issue`]), a CLI
//! subcommand, and an HTTP endpoint (`POST /api`, see [`server`]).
//!
//! ```no_run
//! use danecert::config::Paths;
//! use danecert::issue::issue;
//! use danecert::keys::AlgorithmProfile;
//!
//! # fn main() -> danecert::Result<()> {
//! let paths = Paths::new("certificates");
//! let issuance = issue(&paths, &AlgorithmProfile::default(), "example.com", "93.184.216.34")?;
//! println!("{}", issuance.tlsa);
//! # Ok(())
//! # }
//! ```

pub mod cert;
pub mod config;
pub mod error;
pub mod fs;
pub mod issue;
pub mod keys;
pub mod server;
pub mod tlsa;

pub use error::{Error, Result};
