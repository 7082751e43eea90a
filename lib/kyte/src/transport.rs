//! Default transport: hyper-util with rustls, composable with tower layers.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower::{Layer, ServiceExt};
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::config::{TransportConfig, TransportConfigBuilder};
use crate::middleware::LoggingLayer;
use crate::{Error, Request, Response, Result, Transport};

/// Type-erased transport service, the unit tower layers are applied to.
pub type BoxedService = BoxCloneService<Request, Response, Error>;

/// Future returned by [`HyperTransport`] as a tower service.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// Makes the boxed service shareable across calls.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: Request) -> ServiceFuture {
        let mut service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        // layers such as concurrency limits reserve capacity in poll_ready
        Box::pin(async move { service.ready().await?.call(request).await })
    }
}

// ============================================================================
// Raw hyper exchange
// ============================================================================

#[derive(Clone)]
struct HyperExchange {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HyperExchange {
    fn new(config: &TransportConfig) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(https_connector(config));

        Self { client }
    }

    async fn exchange(&self, request: Request) -> Result<Response> {
        let hyper_request = build_hyper_request(request)?;

        let response = self
            .client
            .request(hyper_request)
            .await
            .map_err(map_hyper_error)?;

        let status = response.status().as_u16();
        let headers = extract_headers(response.headers());

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        Ok(Response::new(status, headers, body))
    }
}

impl Service<Request> for HyperExchange {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let exchange = self.clone();
        Box::pin(async move { exchange.exchange(request).await })
    }
}

/// HTTPS-or-HTTP connector with the Mozilla root certificates.
fn https_connector(config: &TransportConfig) -> HttpsConnector<HttpConnector> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(config.connect_timeout));

    let root_store: rustls::RootCertStore =
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http)
}

fn build_hyper_request(request: Request) -> Result<http::Request<Full<Bytes>>> {
    let (method, url, headers, body) = request.into_parts();

    let mut builder = http::Request::builder()
        .method(http::Method::from(method))
        .uri(url.as_str());
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .body(body.map_or_else(Full::default, Full::new))
        .map_err(|e| Error::invalid_options(e.to_string()))
}

fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

#[allow(clippy::needless_pass_by_value)]
fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
    let msg = format!("{err:?}");
    if err.is_connect() {
        return Error::connection(msg);
    }
    let lower = msg.to_ascii_lowercase();
    if lower.contains("tls") || lower.contains("certificate") || lower.contains("handshake") {
        return Error::tls(msg);
    }
    Error::connection(msg)
}

// ============================================================================
// Public transport
// ============================================================================

/// Pooled HTTP/1.1 and HTTP/2 transport over hyper, with rustls for TLS.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use kyte::{HyperTransport, Kyte, Options};
///
/// let transport = HyperTransport::builder()
///     .connect_timeout(Duration::from_secs(3))
///     .with_logging()
///     .build();
/// let api = Kyte::with_transport(transport, Options::new().prefix_url("https://api.test"));
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    service: SyncService,
    config: TransportConfig,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Transport with the default configuration and no layers.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a transport.
    #[must_use]
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::default()
    }

    /// Connection settings.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        self.service.call(request)
    }
}

impl Service<Request> for HyperTransport {
    type Response = Response;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        self.service.call(request)
    }
}

type LayerFn = Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>;

/// Builder for [`HyperTransport`].
///
/// Layers see every attempt of a call, retries included.
#[derive(Default)]
pub struct HyperTransportBuilder {
    config: TransportConfigBuilder,
    layers: Vec<LayerFn>,
}

impl std::fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("config", &self.config)
            .field("layers_count", &self.layers.len())
            .finish()
    }
}

impl HyperTransportBuilder {
    /// Use a complete configuration.
    #[must_use]
    pub fn config(mut self, config: &TransportConfig) -> Self {
        self.config = TransportConfigBuilder::default()
            .connect_timeout(config.connect_timeout)
            .pool_idle_per_host(config.pool_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout);
        self
    }

    /// Set the TCP connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    /// Add a tower layer. The first layer added is the outermost.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send,
    {
        self.layers
            .push(Arc::new(move |service| BoxCloneService::new(layer.layer(service))));
        self
    }

    /// Log every attempt at info level.
    #[must_use]
    pub fn with_logging(self) -> Self {
        self.layer(LoggingLayer::new())
    }

    /// Log every attempt at debug level, headers included.
    #[must_use]
    pub fn with_debug_logging(self) -> Self {
        self.layer(LoggingLayer::debug())
    }

    /// Build the transport.
    #[must_use]
    pub fn build(self) -> HyperTransport {
        let config = self.config.build();
        let mut service: BoxedService = BoxCloneService::new(HyperExchange::new(&config));

        // innermost first, so the first layer added ends up outermost
        for layer in self.layers.iter().rev() {
            service = layer(service);
        }

        HyperTransport {
            service: SyncService::new(service),
            config,
        }
    }
}
