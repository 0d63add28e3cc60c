use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    extract::connect_info::Connected,
    serve::{IncomingStream, Listener},
    Router,
};
use rustls::pki_types::CertificateDer;
use rustls::server::WebPkiClientVerifier;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;
use tokio_rustls::{server::TlsStream, TlsAcceptor};
use tracing::{error, info, warn};

use crate::{
    config::ApiTlsConfig,
    errors::{Error, TlsError},
    utils::certificates::{load_certificate_bundle, load_client_roots, CertificateInfo},
};

/// Per-connection data available to middleware through `ConnectInfo`.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub remote_addr: SocketAddr,
    /// Verified client leaf certificate, if the client presented one.
    pub peer_certificate: Option<CertificateDer<'static>>,
}

impl Connected<IncomingStream<'_, TcpListener>> for ClientConnection {
    fn connect_info(stream: IncomingStream<'_, TcpListener>) -> Self {
        Self { remote_addr: *stream.remote_addr(), peer_certificate: None }
    }
}

impl Connected<IncomingStream<'_, TlsListener>> for ClientConnection {
    fn connect_info(stream: IncomingStream<'_, TlsListener>) -> Self {
        let (_, session) = stream.io().get_ref();
        let peer_certificate =
            session.peer_certificates().and_then(|chain| chain.first()).map(|leaf| leaf.clone().into_owned());
        Self { remote_addr: *stream.remote_addr(), peer_certificate }
    }
}

/// Plain HTTP listener for token issuance.
pub async fn start_internal_server(address: &str, router: Router) -> crate::Result<()> {
    let (listener, addr) = bind(address, "internal").await?;
    info!(address = %addr, "Starting internal API server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::transport(format!("Internal API server error: {}", e)))?;

    info!("Internal API server shutdown completed");
    Ok(())
}

/// Client facing listener, HTTPS when `tls` is configured.
pub async fn start_external_server(
    address: &str,
    router: Router,
    tls: Option<&ApiTlsConfig>,
) -> crate::Result<()> {
    let (listener, addr) = bind(address, "external").await?;

    if let Some(tls_config) = tls {
        let (acceptor, certificate_info) = configure_tls_acceptor(tls_config)?;
        info!(
            address = %addr,
            subject = %certificate_info.subject,
            expires_at = %certificate_info.not_after,
            client_auth = tls_config.client_ca_path.is_some(),
            "Starting HTTPS external API server"
        );
        axum::serve(
            TlsListener::new(listener, acceptor),
            router.into_make_service_with_connect_info::<ClientConnection>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::transport(format!("HTTPS external API server error: {}", e)))?;
    } else {
        warn!(address = %addr, "Starting external API server without TLS; client certificates are unavailable");
        axum::serve(listener, router.into_make_service_with_connect_info::<ClientConnection>())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::transport(format!("External API server error: {}", e)))?;
    }

    info!("External API server shutdown completed");
    Ok(())
}

async fn bind(address: &str, name: &str) -> crate::Result<(TcpListener, SocketAddr)> {
    let addr: SocketAddr =
        address.parse().map_err(|e| Error::config(format!("Invalid {} API address '{}': {}", name, address, e)))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::transport(format!("Failed to bind {} API server: {}", name, e)))?;
    Ok((listener, addr))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "API server shutdown listener failed");
    }
}

fn configure_tls_acceptor(tls: &ApiTlsConfig) -> crate::Result<(TlsAcceptor, CertificateInfo)> {
    let bundle = load_certificate_bundle(tls.cert_path.as_path(), tls.key_path.as_path(), tls.chain_path.as_deref())?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|err| Error::config(format!("Invalid TLS protocol configuration: {err}")))?;

    // Clients without a certificate are still accepted: the token flow runs
    // before a client holds one.
    let builder = match tls.client_ca_path.as_deref() {
        Some(path) => {
            let roots = load_client_roots(path)?;
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .allow_unauthenticated()
                .build()
                .map_err(|err| TlsError::InvalidClientCa { path: path.to_path_buf(), source: anyhow!(err) })?;
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    let server_config = builder
        .with_single_cert(bundle.chain(), bundle.private_key.clone_key())
        .map_err(|err| Error::config(format!("Failed to load TLS certificate: {err}")))?;

    Ok((TlsAcceptor::from(Arc::new(server_config)), bundle.info))
}

pub struct TlsListener {
    listener: TcpListener,
    acceptor: TlsAcceptor,
}

impl TlsListener {
    fn new(listener: TcpListener, acceptor: TlsAcceptor) -> Self {
        Self { listener, acceptor }
    }
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => match self.acceptor.accept(stream).await {
                    Ok(tls_stream) => return (tls_stream, addr),
                    Err(err) => {
                        warn!(error = %err, %addr, "TLS handshake failed");
                        continue;
                    }
                },
                Err(err) => {
                    if is_connection_error(&err) {
                        continue;
                    }
                    error!("HTTPS accept error: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    fn local_addr(&self) -> std::io::Result<Self::Addr> {
        self.listener.local_addr()
    }
}

fn is_connection_error(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
    )
}
