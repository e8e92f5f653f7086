//! WebSocket transport
//!
//! Wraps a client-side tokio-tungstenite WebSocket so it implements
//! AsyncRead and AsyncWrite, the same shape the MQTT codec drives against
//! a plain TCP socket. MQTT-over-WebSocket uses binary frames to carry
//! MQTT packets; this wrapper flattens the framing into a byte stream.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::BytesMut;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_rustls::rustls::ClientConfig;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};

type InnerStream = MaybeTlsStream<tokio::net::TcpStream>;

/// Client WebSocket stream wrapper that implements AsyncRead and AsyncWrite.
pub struct WsStream {
    sink: SplitSink<WebSocketStream<InnerStream>, Message>,
    stream: SplitStream<WebSocketStream<InnerStream>>,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    pending_messages: VecDeque<Vec<u8>>,
    closed: bool,
}

impl WsStream {
    fn new(ws: WebSocketStream<InnerStream>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            sink,
            stream,
            read_buffer: BytesMut::with_capacity(2048),
            write_buffer: BytesMut::with_capacity(2048),
            pending_messages: VecDeque::new(),
            closed: false,
        }
    }

    /// Open a WebSocket+TLS connection to `url`, negotiating the `mqtt`
    /// subprotocol, using `tls_config` as the client's root-of-trust.
    pub async fn connect(url: &str, tls_config: Arc<ClientConfig>) -> Result<Self, io::Error> {
        let mut request = url.into_client_request().map_err(io::Error::other)?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            "mqtt".parse().map_err(io::Error::other)?,
        );

        let (ws, _response) = tokio_tungstenite::connect_async_tls_with_config(
            request,
            None,
            false,
            Some(Connector::Rustls(tls_config)),
        )
        .await
        .map_err(io::Error::other)?;

        Ok(Self::new(ws))
    }
}

impl AsyncRead for WsStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if !self.read_buffer.is_empty() {
            let to_copy = std::cmp::min(buf.remaining(), self.read_buffer.len());
            buf.put_slice(&self.read_buffer[..to_copy]);
            let _ = self.read_buffer.split_to(to_copy);
            return Poll::Ready(Ok(()));
        }

        if let Some(msg) = self.pending_messages.pop_front() {
            let to_copy = std::cmp::min(buf.remaining(), msg.len());
            buf.put_slice(&msg[..to_copy]);
            if to_copy < msg.len() {
                self.read_buffer.extend_from_slice(&msg[to_copy..]);
            }
            return Poll::Ready(Ok(()));
        }

        if self.closed {
            return Poll::Ready(Ok(()));
        }

        match Pin::new(&mut self.stream).poll_next(cx) {
            Poll::Ready(Some(Ok(message))) => match message {
                Message::Binary(data) => {
                    let to_copy = std::cmp::min(buf.remaining(), data.len());
                    buf.put_slice(&data[..to_copy]);
                    if to_copy < data.len() {
                        self.read_buffer.extend_from_slice(&data[to_copy..]);
                    }
                    Poll::Ready(Ok(()))
                }
                Message::Close(_) => {
                    self.closed = true;
                    Poll::Ready(Ok(()))
                }
                Message::Ping(_) | Message::Pong(_) | Message::Text(_) => {
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
                Message::Frame(_) => {
                    cx.waker().wake_by_ref();
                    Poll::Pending
                }
            },
            Poll::Ready(Some(Err(e))) => Poll::Ready(Err(io::Error::other(e))),
            Poll::Ready(None) => {
                self.closed = true;
                Poll::Ready(Ok(()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for WsStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.write_buffer.extend_from_slice(buf);
        let data = self.write_buffer.split().freeze().to_vec();
        let message = Message::Binary(data);

        match Pin::new(&mut self.sink).poll_ready(cx) {
            Poll::Ready(Ok(())) => match Pin::new(&mut self.sink).start_send(message) {
                Ok(()) => Poll::Ready(Ok(buf.len())),
                Err(e) => Poll::Ready(Err(io::Error::other(e))),
            },
            Poll::Ready(Err(e)) => Poll::Ready(Err(io::Error::other(e))),
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match Pin::new(&mut self.sink).poll_flush(cx) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(e)) => Poll::Ready(Err(io::Error::other(e))),
            Poll::Pending => Poll::Pending,
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match Pin::new(&mut self.sink).poll_ready(cx) {
            Poll::Ready(Ok(())) => {
                let _ = Pin::new(&mut self.sink).start_send(Message::Close(None));
                match Pin::new(&mut self.sink).poll_flush(cx) {
                    Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
                    Poll::Ready(Err(e)) => Poll::Ready(Err(io::Error::other(e))),
                    Poll::Pending => Poll::Pending,
                }
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(io::Error::other(e))),
            Poll::Pending => Poll::Pending,
        }
    }
}
