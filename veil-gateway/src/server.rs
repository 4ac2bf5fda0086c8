//! The gateway's accept loop and HTTP request handling.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use safelog::sensitive;
use tokio::net::TcpListener;
use tracing::{info, warn};
use veil_client::RelaySelection;

use crate::config::GatewayConfig;
use crate::err::{Error, Result};

/// Accept connections on `listener` forever, serving one HTTP/1.1
/// connection per task. A per-connection failure is logged and only
/// drops that connection.
pub async fn run(listener: TcpListener, config: Arc<GatewayConfig>) -> anyhow::Result<()> {
    info!(addr = %listener.local_addr()?, "gateway listening");
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handle(req, Arc::clone(&config), peer_addr));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!(peer = %sensitive(peer_addr), error = %e, "gateway connection failed");
            }
        });
    }
}

async fn handle(
    req: Request<Incoming>,
    config: Arc<GatewayConfig>,
    peer_addr: SocketAddr,
) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let response = match serve(req, &config).await {
        Ok((status, body)) => Response::builder().status(status).body(Full::new(Bytes::from(body))),
        Err(e) => {
            warn!(peer = %sensitive(peer_addr), error = %e, "request failed");
            Response::builder().status(404).body(Full::new(Bytes::new()))
        }
    };
    Ok(response.expect("status and body are always valid for a response"))
}

/// One `GET /?url=...` request's parsed query parameters.
struct Query {
    url: Option<String>,
    count: Option<usize>,
    order: Option<String>,
}

/// Parse `count`/`order`/`url` out of a request's raw query string.
/// Unrecognized parameters are ignored; a malformed `count` is dropped
/// rather than rejecting the whole request.
fn parse_query(query: &str) -> Query {
    let mut parsed = Query {
        url: None,
        count: None,
        order: None,
    };
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "url" => parsed.url = Some(value.into_owned()),
            "count" => parsed.count = value.parse::<usize>().ok(),
            "order" => parsed.order = Some(value.into_owned()),
            _ => {}
        }
    }
    parsed
}

/// Parse the request's query string, build a circuit, and fetch `url`
/// over it.
async fn serve(req: Request<Incoming>, config: &GatewayConfig) -> Result<(u16, Vec<u8>)> {
    let Query { url, count, order } = parse_query(req.uri().query().unwrap_or(""));
    let url = url.ok_or(Error::MissingUrl)?;

    let mut client_config = config.client.clone();
    if let Some(count) = count {
        client_config.circuit_len = count;
    }
    if order.as_deref() == Some("random") {
        client_config.relay_selection = RelaySelection::Random;
    }

    let response = veil_client::fetch(&client_config, &url).await?;
    info!(status = response.status, "request served");
    Ok((response.status, response.body))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_query_reads_url_count_and_order() {
        let q = parse_query("url=http%3A%2F%2Fexample%2F&count=5&order=random");
        assert_eq!(q.url.as_deref(), Some("http://example/"));
        assert_eq!(q.count, Some(5));
        assert_eq!(q.order.as_deref(), Some("random"));
    }

    #[test]
    fn parse_query_missing_url_is_none() {
        let q = parse_query("count=2");
        assert!(q.url.is_none());
        assert_eq!(q.count, Some(2));
    }

    #[test]
    fn parse_query_ignores_unparseable_count() {
        let q = parse_query("url=http://x/&count=not-a-number");
        assert_eq!(q.url.as_deref(), Some("http://x/"));
        assert!(q.count.is_none());
    }

    #[test]
    fn parse_query_ignores_unknown_parameters() {
        let q = parse_query("url=http://x/&bogus=1");
        assert_eq!(q.url.as_deref(), Some("http://x/"));
    }

    /// `hyper::body::Incoming` has no public constructor outside a real
    /// connection, so `serve`/`handle`'s behavior on a request with no
    /// `url` parameter is exercised end to end over a loopback socket
    /// instead of by fabricating a `Request<Incoming>` directly.
    #[tokio::test]
    async fn request_with_no_url_gets_http_404() {
        let config = Arc::new(GatewayConfig::default());
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, peer_addr) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handle(req, Arc::clone(&config), peer_addr));
            let _ = http1::Builder::new().serve_connection(io, service).await;
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        tokio::io::AsyncWriteExt::write_all(
            &mut stream,
            b"GET /?count=2 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await
        .unwrap();

        let mut response = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut response).await.unwrap();
        let status_line = response.split(|&b| b == b'\n').next().unwrap();
        assert!(
            status_line.starts_with(b"HTTP/1.1 404"),
            "expected 404, got {:?}",
            String::from_utf8_lossy(status_line)
        );

        server.await.unwrap();
    }
}
