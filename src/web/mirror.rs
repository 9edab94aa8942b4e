use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::shutdown::ShutdownSignal;
use crate::tracker::StateDistributor;

const PAGE_HEAD: &str = "<!DOCTYPE html><html><head><meta http-equiv='refresh' content='1'>\
<title>Visible Ephemeris Terminal</title>\
<style>body { background: #000; color: #0f0; font-family: monospace; font-size: 14px; white-space: pre; }</style>\
</head><body>";
const PAGE_TAIL: &str = "</body></html>";

/// Serves the latest rendered table as a self-refreshing HTML page, one response per connection.
pub struct TextMirror {
    distributor: Arc<StateDistributor>,
    io_timeout: Duration,
}

impl TextMirror {
    pub fn new(distributor: Arc<StateDistributor>, io_timeout: Duration) -> Self {
        Self {
            distributor,
            io_timeout,
        }
    }

    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownSignal) {
        if let Ok(addr) = listener.local_addr() {
            log::info!("Text mirror listening on {}", addr);
        }
        let mirror = Arc::new(self);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        log::debug!("Text client connected from {}", peer);
                        let mirror = Arc::clone(&mirror);
                        tokio::spawn(async move {
                            if let Err(e) = mirror.serve(stream).await {
                                log::debug!("Text client {}: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        log::warn!("Text mirror accept failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                _ = shutdown.triggered() => break,
            }
        }

        log::info!("Text mirror stopped");
    }

    async fn serve(&self, mut stream: TcpStream) -> io::Result<()> {
        // Drain the request. Its content is irrelevant, and a silent client still gets the page.
        let mut buf = [0u8; 4096];
        let _ = timeout(self.io_timeout, stream.read(&mut buf)).await;

        let response = build_response(&self.distributor.rendered());
        timeout(self.io_timeout, stream.write_all(response.as_bytes()))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write timed out"))??;
        let _ = timeout(self.io_timeout, stream.shutdown()).await;
        Ok(())
    }
}

pub fn build_response(text: &str) -> String {
    let body = format!("{}{}{}", PAGE_HEAD, escape_html(text), PAGE_TAIL);
    format!(
        "HTTP/1.0 200 OK\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
