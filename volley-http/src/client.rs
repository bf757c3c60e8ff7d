use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use super::connect::{TracedConnector, TracedResolver, TracedTcp};
use super::trace::{EventName, Tracer};
use super::util::{has_header, host_header_value, is_supported_scheme};
use super::{Error, HttpRequest, HttpResponse, Result};

/// Issues traced requests.
///
/// Every call builds its own hyper client around a connector stack bound to the caller's
/// [`Tracer`], so no mutable transport state is shared between concurrent workers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    connect_timeout: Option<Duration>,
}

impl Default for HttpClient {
    fn default() -> Self {
        // The OS-level TCP connect timeout can be very long (tens of seconds), which can cause
        // short runs to appear “hung” when the target host is unreachable.
        Self::new(Some(Duration::from_secs(3)))
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }

    /// Sends `req` and reads the whole response body.
    ///
    /// `GetConn` is recorded on entry and `BodyRead` once the body is fully consumed; every other
    /// lifecycle event is recorded by the connector stack. `req.timeout` bounds the whole exchange,
    /// body included.
    pub async fn send(&self, req: HttpRequest, tracer: &Arc<Tracer>) -> Result<HttpResponse> {
        match req.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.exchange(req, tracer)).await
            {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout(timeout)),
            },
            None => self.exchange(req, tracer).await,
        }
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.send(HttpRequest::get(url), &Tracer::start()).await
    }

    async fn exchange(&self, req: HttpRequest, tracer: &Arc<Tracer>) -> Result<HttpResponse> {
        let parsed = url::Url::parse(&req.url).map_err(|_| Error::InvalidUrl(req.url.clone()))?;
        if !is_supported_scheme(&parsed) {
            return Err(Error::UnsupportedScheme(req.url));
        }

        let uri: hyper::Uri = req
            .url
            .parse()
            .map_err(|_| Error::InvalidUrl(req.url.to_string()))?;

        let mut builder = Request::builder().method(req.method).uri(uri);

        if !has_header(&req.headers, "host")
            && let Some(host) = host_header_value(&parsed)
        {
            builder = builder.header(http::header::HOST, host);
        }
        if !req.body.is_empty() && !has_header(&req.headers, "content-length") {
            builder = builder.header(http::header::CONTENT_LENGTH, req.body.len());
        }

        for (k, v) in req.headers {
            let name = http::header::HeaderName::from_bytes(k.as_bytes())?;
            let value = http::header::HeaderValue::from_str(&v)?;
            builder = builder.header(name, value);
        }

        let request: Request<Full<Bytes>> = builder.body(Full::new(req.body))?;

        let mut http_connector = HttpConnector::new_with_resolver(TracedResolver::new(
            tracer.clone(),
        ));
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(self.connect_timeout);

        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(TracedTcp::new(http_connector, tracer.clone()));

        let client = Client::builder(TokioExecutor::new())
            .build(TracedConnector::new(https_connector, tracer.clone()));

        tracer.record(EventName::GetConn);
        let res = client.request(request).await?;

        let status = res.status().as_u16();
        let body = res.into_body().collect().await?.to_bytes();
        tracer.record(EventName::BodyRead);

        Ok(HttpResponse { status, body })
    }
}
