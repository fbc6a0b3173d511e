//! Programmatic server surface.
//!
//! ```no_run
//! use rift_backstub::{ClientConfig, ListenOptions, StubServer};
//! use serde_json::json;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut server = StubServer::new(&ClientConfig::default())?;
//! server
//!     .get("/hello", json!({"message": "hi"}), None, None)?
//!     .proxy("*", "https://api.github.com")?;
//! server
//!     .listen(ListenOptions::default(), |addr| println!("listening on {addr}"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{ClientConfig, ListenConfig};
use crate::dispatcher::RequestDispatcher;
use crate::error::{FetchError, MountError};
use crate::fetch::{Fetcher, Service};
use crate::mount;
use crate::network::{create_listener, resolve};
use crate::registry::{StubRegistry, Verb};
use crate::stub::{Stub, StubFormat};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Where and how to listen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenOptions {
    pub port: u16,
    pub host: String,
    pub backlog: u32,
}

impl Default for ListenOptions {
    fn default() -> Self {
        ListenConfig::default().into()
    }
}

impl From<ListenConfig> for ListenOptions {
    fn from(config: ListenConfig) -> Self {
        Self {
            port: config.port,
            host: config.host,
            backlog: config.backlog,
        }
    }
}

/// Builder for a stub server. Routes are registered first, then the server
/// is bound and serves with a frozen route table.
pub struct StubServer {
    registry: StubRegistry,
    fetcher: Fetcher,
}

impl StubServer {
    pub fn new(client: &ClientConfig) -> Result<Self, FetchError> {
        Ok(Self {
            registry: StubRegistry::new(),
            fetcher: Fetcher::new(client)?,
        })
    }

    pub fn registry(&self) -> &StubRegistry {
        &self.registry
    }

    /// Mount a stub directory. `"*"` with a service is the same as
    /// `proxy("*", service)`.
    pub fn mount(
        &mut self,
        dir: impl AsRef<Path>,
        service: Option<&str>,
    ) -> Result<&mut Self, MountError> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(MountError::MissingArgument("dir"));
        }
        let service = parse_service(service)?;

        if dir.as_os_str() == "*" {
            let service = service.ok_or(MountError::MissingService)?;
            self.registry.register_proxy("*", &service)?;
            info!(service = %service, "Proxying all unmatched requests");
            return Ok(self);
        }

        mount::mount(&mut self.registry, dir, service.as_ref())?;
        Ok(self)
    }

    /// Pass every request on `path` through to `service`.
    pub fn proxy(&mut self, path: &str, service: &str) -> Result<&mut Self, MountError> {
        if path.is_empty() {
            return Err(MountError::MissingArgument("path"));
        }
        let service = parse_service(Some(service))?.ok_or(MountError::MissingArgument("service"))?;
        self.registry.register_proxy(path, &service)?;
        info!(path, service = %service, "Registered proxy route");
        Ok(self)
    }

    pub fn head(
        &mut self,
        route: &str,
        stub: impl Into<Stub>,
        service: Option<&str>,
        status: Option<&str>,
    ) -> Result<&mut Self, MountError> {
        self.stub(Verb::Head, route, stub, service, status)
    }

    pub fn get(
        &mut self,
        route: &str,
        stub: impl Into<Stub>,
        service: Option<&str>,
        status: Option<&str>,
    ) -> Result<&mut Self, MountError> {
        self.stub(Verb::Get, route, stub, service, status)
    }

    pub fn post(
        &mut self,
        route: &str,
        stub: impl Into<Stub>,
        service: Option<&str>,
        status: Option<&str>,
    ) -> Result<&mut Self, MountError> {
        self.stub(Verb::Post, route, stub, service, status)
    }

    pub fn put(
        &mut self,
        route: &str,
        stub: impl Into<Stub>,
        service: Option<&str>,
        status: Option<&str>,
    ) -> Result<&mut Self, MountError> {
        self.stub(Verb::Put, route, stub, service, status)
    }

    pub fn delete(
        &mut self,
        route: &str,
        stub: impl Into<Stub>,
        service: Option<&str>,
        status: Option<&str>,
    ) -> Result<&mut Self, MountError> {
        self.stub(Verb::Delete, route, stub, service, status)
    }

    pub fn all(
        &mut self,
        route: &str,
        stub: impl Into<Stub>,
        service: Option<&str>,
        status: Option<&str>,
    ) -> Result<&mut Self, MountError> {
        self.stub(Verb::All, route, stub, service, status)
    }

    /// Register `stub` for `verb` on `route`. With a service the stub is
    /// merged with the upstream response whose status matches `status`
    /// (any status when omitted).
    pub fn stub(
        &mut self,
        verb: Verb,
        route: &str,
        stub: impl Into<Stub>,
        service: Option<&str>,
        status: Option<&str>,
    ) -> Result<&mut Self, MountError> {
        if route.is_empty() {
            return Err(MountError::MissingArgument("route"));
        }
        let service = parse_service(service)?;
        let stub = stub.into();

        match (service, status) {
            (Some(service), status) => {
                if let Some(spec) = status {
                    mount::validate_status_spec(spec)?;
                }
                self.registry.register_status_dispatched(
                    verb,
                    route,
                    &service,
                    status,
                    stub,
                    StubFormat::Scripted,
                )?;
            }
            (None, Some(_)) => return Err(MountError::MissingService),
            (None, None) => {
                self.registry
                    .register_static(verb, route, stub, StubFormat::Scripted)?;
            }
        }
        Ok(self)
    }

    /// Bind the listener without serving yet.
    pub async fn bind(self, options: ListenOptions) -> io::Result<BoundServer> {
        let addr = resolve(&options.host, options.port).await?;
        let listener = create_listener(addr, options.backlog)?;
        let local_addr = listener.local_addr()?;
        info!(
            "Stub server bound to {} ({} routes, backlog {})",
            local_addr,
            self.registry.len(),
            options.backlog
        );

        let dispatcher = RequestDispatcher::new(Arc::new(self.registry), self.fetcher);
        Ok(BoundServer {
            listener,
            local_addr,
            dispatcher: Arc::new(dispatcher),
        })
    }

    /// Bind, report the bound address to `on_ready` and serve forever.
    pub async fn listen<R>(self, options: ListenOptions, on_ready: R) -> io::Result<()>
    where
        R: FnOnce(SocketAddr),
    {
        self.listen_with_shutdown(options, on_ready, std::future::pending())
            .await
    }

    /// Like [`StubServer::listen`], stopping once `shutdown` resolves.
    pub async fn listen_with_shutdown<R, F>(
        self,
        options: ListenOptions,
        on_ready: R,
        shutdown: F,
    ) -> io::Result<()>
    where
        R: FnOnce(SocketAddr),
        F: Future<Output = ()>,
    {
        let bound = self.bind(options).await?;
        on_ready(bound.local_addr());
        bound.serve_with_shutdown(shutdown).await
    }
}

fn parse_service(service: Option<&str>) -> Result<Option<Service>, MountError> {
    match service {
        None => Ok(None),
        Some("") => Err(MountError::MissingArgument("service")),
        Some(raw) => Service::parse(raw).map(Some),
    }
}

/// A bound listener with its frozen route table.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    dispatcher: Arc<RequestDispatcher>,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn serve(self) -> io::Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Stub server listening on {}", self.local_addr);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let dispatcher = Arc::clone(&self.dispatcher);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let dispatcher = Arc::clone(&dispatcher);
                                    async move { Ok::<_, Infallible>(dispatcher.handle(req).await) }
                                });
                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!("Connection error from {}: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error on {}: {}", self.local_addr, e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("Stub server on {} shutting down", self.local_addr);
                    break;
                }
            }
        }
        Ok(())
    }
}
