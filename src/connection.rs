//! Internal module for opening TLS connections to the IMAP server.

use crate::error::{Error, Result};
use rustls::ClientConfig;
use std::sync::{Arc, LazyLock};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, instrument};
use webpki_roots::TLS_SERVER_ROOTS;

/// A TLS stream over TCP, used for IMAP communication.
pub(crate) type TlsStream = tokio_rustls::client::TlsStream<TcpStream>;

static TLS_CONFIG: LazyLock<Arc<ClientConfig>> = LazyLock::new(|| {
    let mut roots = rustls::RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|ta| {
        rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
            ta.subject,
            ta.spki,
            ta.name_constraints,
        )
    }));

    Arc::new(
        ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
});

/// Connects to `host:port` and performs the TLS handshake with `host` as SNI.
#[instrument(
    name = "connection::open_tls",
    skip_all,
    fields(host = %host, port)
)]
pub(crate) async fn open_tls(host: &str, port: u16) -> Result<TlsStream> {
    let target = format!("{host}:{port}");
    let server_name = server_name(host)?;

    debug!(target = %target, "Opening TCP connection");
    let tcp = TcpStream::connect(target.as_str())
        .await
        .map_err(|source| Error::TcpConnect {
            target: target.clone(),
            source,
        })?;

    debug!("Performing TLS handshake");
    TlsConnector::from(Arc::clone(&TLS_CONFIG))
        .connect(server_name, tcp)
        .await
        .map_err(|source| Error::TlsConnect { target, source })
}

fn server_name(host: &str) -> Result<rustls::ServerName> {
    rustls::ServerName::try_from(host).map_err(|source| Error::InvalidDnsName {
        host: host.to_string(),
        source,
    })
}
