//! Fixtures shared by unit tests.

use native_tls::Identity;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_native_tls::TlsAcceptor;

const CERT: &[u8] = include_bytes!("../tests/fixtures/localhost.crt");
const KEY: &[u8] = include_bytes!("../tests/fixtures/localhost.key");

/// HTTPS server with a self-signed certificate that answers a single
/// request with `200 OK`. Returns its base URL.
pub(crate) async fn self_signed_server() -> String {
    let identity = Identity::from_pkcs8(CERT, KEY).unwrap();
    let acceptor = TlsAcceptor::from(native_tls::TlsAcceptor::new(identity).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let Ok((tcp, _)) = listener.accept().await else {
            return;
        };
        // Fails when the client refuses the certificate.
        let Ok(mut tls) = acceptor.accept(tcp).await else {
            return;
        };
        read_request(&mut tls).await;
        let _ = tls
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await;
        let _ = tls.shutdown().await;
    });

    format!("https://{}", addr)
}

/// Read one HTTP/1.1 request, headers and `content-length` body.
async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let body_len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + body_len {
            return;
        }
    }
}
