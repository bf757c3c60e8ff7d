//! Transport middleware that reports connection lifecycle hooks to a [`Tracer`].
//!
//! The layers stack as follows for a single request:
//!
//! ```text
//! TracedConnector            GotConn, TLSHandshakeDone, wraps the stream in TracedStream
//!   HttpsConnector           (hyper-rustls)
//!     TracedTcp              ConnectStart (IP literals), ConnectDone, TLSHandshakeStart
//!       HttpConnector
//!         TracedResolver     DNSStart, DNSDone, ConnectStart
//! ```

use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::dns::{GaiAddrs, GaiResolver, Name};
use hyper_util::client::legacy::connect::{Connected, Connection};
use tower_service::Service;

use crate::trace::{EventName, Tracer};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

#[derive(Clone)]
pub(crate) struct TracedResolver {
    inner: GaiResolver,
    tracer: Arc<Tracer>,
}

impl TracedResolver {
    pub(crate) fn new(tracer: Arc<Tracer>) -> Self {
        Self {
            inner: GaiResolver::new(),
            tracer,
        }
    }
}

impl Service<Name> for TracedResolver {
    type Response = GaiAddrs;
    type Error = io::Error;
    type Future = BoxFuture<Result<GaiAddrs, io::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, name: Name) -> Self::Future {
        self.tracer.record(EventName::DnsStart);
        let fut = self.inner.call(name);
        let tracer = self.tracer.clone();
        Box::pin(async move {
            let res = fut.await;
            tracer.record(EventName::DnsDone);
            if res.is_ok() {
                tracer.record(EventName::ConnectStart);
            }
            res
        })
    }
}

/// Wraps the plain TCP connector (below TLS).
#[derive(Clone)]
pub(crate) struct TracedTcp<C> {
    inner: C,
    tracer: Arc<Tracer>,
}

impl<C> TracedTcp<C> {
    pub(crate) fn new(inner: C, tracer: Arc<Tracer>) -> Self {
        Self { inner, tracer }
    }
}

impl<C> Service<Uri> for TracedTcp<C>
where
    C: Service<Uri>,
    C::Response: Send + 'static,
    C::Future: Send + 'static,
    C::Error: Into<BoxError>,
{
    type Response = C::Response;
    type Error = BoxError;
    type Future = BoxFuture<Result<C::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        // IP literals never reach the resolver, so the connect phase starts right here.
        if dst.host().is_some_and(is_ip_literal) {
            self.tracer.record(EventName::ConnectStart);
        }
        let tls = is_https(&dst);
        let fut = self.inner.call(dst);
        let tracer = self.tracer.clone();
        Box::pin(async move {
            let io = fut.await.map_err(Into::into)?;
            tracer.record(EventName::ConnectDone);
            if tls {
                tracer.record(EventName::TlsHandshakeStart);
            }
            Ok(io)
        })
    }
}

/// Outermost connector layer handed to the hyper client.
#[derive(Clone)]
pub(crate) struct TracedConnector<C> {
    inner: C,
    tracer: Arc<Tracer>,
}

impl<C> TracedConnector<C> {
    pub(crate) fn new(inner: C, tracer: Arc<Tracer>) -> Self {
        Self { inner, tracer }
    }
}

impl<C> Service<Uri> for TracedConnector<C>
where
    C: Service<Uri>,
    C::Response: Read + Write + Connection + Unpin + Send + 'static,
    C::Future: Send + 'static,
    C::Error: Into<BoxError>,
{
    type Response = TracedStream<C::Response>;
    type Error = BoxError;
    type Future = BoxFuture<Result<Self::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let tls = is_https(&dst);
        let fut = self.inner.call(dst);
        let tracer = self.tracer.clone();
        Box::pin(async move {
            let io = fut.await.map_err(Into::into)?;
            if tls {
                tracer.record(EventName::TlsHandshakeDone);
            }
            tracer.record(EventName::GotConn);
            Ok(TracedStream::new(io, tracer))
        })
    }
}

/// Connection stream that timestamps the first write, the first completed flush and the first
/// read of the HTTP exchange.
pub(crate) struct TracedStream<T> {
    inner: T,
    tracer: Arc<Tracer>,
    wrote: bool,
    flushed: bool,
    read: bool,
}

impl<T> TracedStream<T> {
    fn new(inner: T, tracer: Arc<Tracer>) -> Self {
        Self {
            inner,
            tracer,
            wrote: false,
            flushed: false,
            read: false,
        }
    }

    fn on_write(&mut self, res: &Poll<io::Result<usize>>) {
        if !self.wrote && matches!(res, Poll::Ready(Ok(n)) if *n > 0) {
            self.wrote = true;
            self.tracer.record_once(EventName::WroteHeaders);
        }
    }
}

impl<T: Read + Unpin> Read for TracedStream<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let res = Pin::new(&mut this.inner).poll_read(cx, buf);
        if !this.read && this.wrote && matches!(res, Poll::Ready(Ok(()))) {
            this.read = true;
            this.tracer.record_once(EventName::GotFirstResponseByte);
        }
        res
    }
}

impl<T: Write + Unpin> Write for TracedStream<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let res = Pin::new(&mut this.inner).poll_write(cx, buf);
        this.on_write(&res);
        res
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let res = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        this.on_write(&res);
        res
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let res = Pin::new(&mut this.inner).poll_flush(cx);
        if this.wrote && !this.flushed && matches!(res, Poll::Ready(Ok(()))) {
            this.flushed = true;
            this.tracer.record_once(EventName::WroteRequest);
        }
        res
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl<T: Connection> Connection for TracedStream<T> {
    fn connected(&self) -> Connected {
        self.inner.connected()
    }
}

fn is_https(uri: &Uri) -> bool {
    uri.scheme_str() == Some("https")
}

fn is_ip_literal(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
}
