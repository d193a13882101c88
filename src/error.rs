// Copyright 2026 danecert contributors
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },

    #[error("Invalid IP address '{ip}': {reason}")]
    InvalidIp { ip: String, reason: String },

    #[error("Key generation failed: {0}")]
    KeyGen(String),

    #[error("Key encoding failed: {0}")]
    KeyEncode(String),

    #[error("Certificate synthesis failed: {0}")]
    CertBuild(#[from] x509_cert::builder::Error),

    #[error("Certificate encoding failed: {0}")]
    Der(#[from] x509_cert::der::Error),

    #[error("TLSA pipeline stage '{stage}' failed: {reason}")]
    TlsaStage { stage: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to bind to {addr}: {reason}\nIs another process using this port?")]
    BindFailed { addr: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
