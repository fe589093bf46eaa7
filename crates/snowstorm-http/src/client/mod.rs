//! A [`Source`] that fetches batches from remote `snowstorm-server` peers.

pub mod config;

use crate::{Error, Result};
use axum::{
    body::{Body, Bytes, HttpBody},
    http::{
        Request, Response, Uri,
        uri::{InvalidUri, Scheme},
    },
};
use futures::future::BoxFuture;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use snowstorm::{BoxError, Source};
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::{Service, ServiceExt};

/// Upper bound on a response body, per requested id. An `i64` renders in at
/// most 20 characters plus a separator.
const BYTES_PER_ID: usize = 21;

/// The production transport: a pooled HTTP/1 client.
pub type HttpClient = Client<HttpConnector, Body>;

/// Round-robins `GET {host}?n={n}` over a fixed list of hosts.
///
/// The transport is any [`tower::Service`] taking an HTTP request, so an
/// in-process [`axum::Router`] can stand in for the network.
///
/// ```no_run
/// use snowstorm::Pool;
/// use snowstorm_http::HttpSource;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let source = HttpSource::new(["http://10.0.0.1:7006/10/12", "http://10.0.0.2:7006/10/12"])?;
/// let pool = Pool::builder().source(source).build()?;
/// let id = pool.next_id().await;
/// # Ok(())
/// # }
/// ```
pub struct HttpSource<S = HttpClient> {
    hosts: Vec<Uri>,
    next_host: AtomicUsize,
    service: S,
}

impl HttpSource {
    /// Creates a source backed by a fresh HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoHosts`] for an empty list and
    /// [`Error::InvalidHost`] for anything that is not an absolute `http`
    /// URL.
    pub fn new<I>(hosts: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self::with_service(hosts, client)
    }
}

impl<S> HttpSource<S> {
    /// Creates a source that sends its requests through `service`.
    ///
    /// # Errors
    ///
    /// Same as [`HttpSource::new`].
    pub fn with_service<I>(hosts: I, service: S) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|host| parse_host(host.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if hosts.is_empty() {
            return Err(Error::NoHosts);
        }
        Ok(Self {
            hosts,
            next_host: AtomicUsize::new(0),
            service,
        })
    }

    pub fn hosts(&self) -> &[Uri] {
        &self.hosts
    }

    fn next_host(&self) -> &Uri {
        let index = self.next_host.fetch_add(1, Ordering::Relaxed) % self.hosts.len();
        &self.hosts[index]
    }
}

fn parse_host(host: &str) -> Result<Uri> {
    let invalid = |reason: &str| Error::InvalidHost {
        host: host.to_owned(),
        reason: reason.to_owned(),
    };
    let uri: Uri = host
        .parse()
        .map_err(|e: InvalidUri| invalid(&e.to_string()))?;
    if uri.scheme() != Some(&Scheme::HTTP) {
        return Err(invalid("scheme must be http"));
    }
    if uri.authority().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(uri)
}

fn request_uri(host: &Uri, n: usize) -> String {
    let separator = if host.query().is_some() { '&' } else { '?' };
    format!("{host}{separator}n={n}")
}

impl<S, B> HttpSource<S>
where
    S: Service<Request<Body>, Response = Response<B>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    /// Requests `n` ids from the next host in rotation.
    ///
    /// # Errors
    ///
    /// Any transport failure, non-success status, undecodable body or a
    /// batch of the wrong size.
    pub async fn fetch_ids(&self, n: usize) -> Result<Vec<i64>> {
        let host = self.next_host();
        let request = Request::get(request_uri(host, n)).body(Body::empty())?;

        let response = self
            .service
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| Error::Transport(e.into()))?;

        let status = response.status();
        let limit = n.saturating_mul(BYTES_PER_ID).saturating_add(1024);
        let body = axum::body::to_bytes(Body::new(response.into_body()), limit)
            .await
            .map_err(Error::Body)?;

        if !status.is_success() {
            return Err(Error::Status {
                status,
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let ids: Vec<i64> = serde_json::from_slice(&body)?;
        if ids.len() != n {
            return Err(Error::Count {
                expected: n,
                received: ids.len(),
            });
        }

        tracing::trace!("Fetched {n} ids from {host}");
        Ok(ids)
    }
}

impl<S, B> Source for HttpSource<S>
where
    S: Service<Request<Body>, Response = Response<B>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    fn fetch(&self, n: usize) -> BoxFuture<'_, snowstorm::Result<Vec<i64>>> {
        Box::pin(async move { Ok(self.fetch_ids(n).await?) })
    }
}
