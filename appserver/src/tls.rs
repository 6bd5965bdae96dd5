//! TLS listener setup for the app-server client protocol (SPEC_FULL.md §6.3).
//!
//! The original `proto.py` wraps its listening socket in a self-signed
//! `ssl.SSLContext` (clients connect with `CERT_NONE`/hostname checks
//! disabled). We keep that shape: generate (or load) a self-signed
//! certificate once per process and hand it to `tokio_rustls::TlsAcceptor`,
//! rather than requiring an operator-provided CA-signed cert for what is a
//! single-machine development topology.

use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::error::{PipelineError, Result};

/// Builds a `TlsAcceptor` from `{cert,key}.pem` under `tls_dir`, generating a
/// fresh self-signed keypair on first use (idempotent across restarts, same
/// persistence pattern as `forge-keys::KeyManager::load_or_generate`).
pub fn build_acceptor(tls_dir: &Path, host: &str) -> Result<TlsAcceptor> {
    std::fs::create_dir_all(tls_dir)?;
    let cert_path = tls_dir.join("appserver_cert.pem");
    let key_path = tls_dir.join("appserver_key.pem");

    let (cert_pem, key_pem) = if cert_path.exists() && key_path.exists() {
        (
            std::fs::read_to_string(&cert_path)?,
            std::fs::read_to_string(&key_path)?,
        )
    } else {
        let generated = rcgen::generate_simple_self_signed(vec![host.to_string()])
            .map_err(|e| PipelineError::CertGen(e.to_string()))?;
        let cert_pem = generated.cert.pem();
        let key_pem = generated.key_pair.serialize_pem();
        std::fs::write(&cert_path, &cert_pem)?;
        std::fs::write(&key_path, &key_pem)?;
        tracing::info!(dir = %tls_dir.display(), "generated self-signed TLS certificate");
        (cert_pem, key_pem)
    };

    let cert_chain: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_pem.as_bytes())
        .collect::<std::result::Result<_, _>>()?;
    let key = rustls_pemfile::pkcs8_private_keys(&mut key_pem.as_bytes())
        .next()
        .ok_or_else(|| PipelineError::CertGen("no private key in PEM file".into()))??;

    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key.into())?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}
