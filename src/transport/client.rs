//! Single-connection handshake and message loop.
//!
//! `Session`, `handshake`, and `run_message_loop` are generic over the
//! underlying byte stream so the reconnect cycle — handshake, subscription
//! replay, keepalive, the generation guard — can be driven by an in-memory
//! duplex in tests instead of a live WebSocket+TLS connection. `Connector`
//! isolates the one piece that differs between production (`WsConnector`)
//! and tests: establishing that stream in the first place. Mirrors the
//! split in the teacher's bridge client between `connect_and_run` (one
//! connection) and `connection_loop` (the retry wrapper), adapted for that
//! extra observability seam, and generalizes the teacher's single-method
//! `AuthProvider` collaborator pattern to the connection step itself.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::codec::{Decoder, Encoder};
use crate::normalizer::Normalizer;
use crate::protocol::{ConnAck, Connect, Packet, Subscribe, Unsubscribe};

use super::error::TransportError;
use super::websocket::WsStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Operations the public API forwards into a live connection's message loop.
pub(super) enum Command {
    Subscribe(String),
    Unsubscribe(String),
    /// Forced reconnect from the token-refresh worker; not a shutdown.
    Reconnect,
    Shutdown,
}

/// Why `run_message_loop` returned control to the retry wrapper.
pub(super) enum Disconnect {
    /// `Command::Shutdown` was processed and DISCONNECT was sent.
    Shutdown,
    /// Network failure, broker-initiated disconnect, or a forced refresh;
    /// caller should reconnect.
    Lost(TransportError),
}

/// Establishes the raw byte stream a session runs over. Production connects
/// over WebSocket+TLS (`WsConnector`); tests substitute an in-memory duplex
/// so the handshake/reconnect machinery can be driven without a broker.
#[async_trait]
pub(super) trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self, host: &str) -> Result<Self::Stream, TransportError>;
}

/// Opens a WebSocket+TLS connection to `wss://{host}/mqtt`.
pub(super) struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    type Stream = WsStream;

    async fn connect(&self, host: &str) -> Result<WsStream, TransportError> {
        let tls_config = super::tls::load_client_config()
            .map_err(|e| TransportError::TransientNetwork(e.to_string()))?;
        let url = format!("wss://{}/mqtt", host);
        let stream = timeout(CONNECT_TIMEOUT, WsStream::connect(&url, tls_config))
            .await
            .map_err(|_| TransportError::TransientNetwork("connect timeout".to_string()))??;
        Ok(stream)
    }
}

/// A connected session: handshake complete, subscriptions replayed.
pub(super) struct Session<S> {
    reader: ReadHalf<S>,
    writer: WriteHalf<S>,
    encoder: Encoder,
    decoder: Decoder,
}

/// `proto/topic/bidofferv3/{SYMBOL}`, per the wire format.
pub(super) fn topic_for(symbol: &str) -> String {
    format!("proto/topic/bidofferv3/{}", symbol.to_uppercase())
}

/// Perform CONNECT/CONNACK and subscription replay over an already-connected
/// `stream`. Returns before any keepalive/inbound traffic is handled.
pub(super) async fn handshake<S>(
    stream: S,
    client_id: &str,
    keepalive: Duration,
    token: &str,
    subscriptions: &HashSet<String>,
) -> Result<Session<S>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let encoder = Encoder::new();
    let mut decoder = Decoder::new();
    let mut write_buf = BytesMut::new();

    let connect = Packet::Connect(Box::new(Connect {
        client_id: client_id.to_string(),
        clean_session: true,
        keep_alive: keepalive.as_secs().min(u16::MAX as u64) as u16,
        username: Some(token.to_string()),
        password: None,
    }));
    encoder.encode(&connect, &mut write_buf)?;
    writer.write_all(&write_buf).await?;
    write_buf.clear();
    debug!("CONNECT sent");

    let mut read_buf = vec![0u8; 4096];
    let n = timeout(CONNECT_TIMEOUT, reader.read(&mut read_buf))
        .await
        .map_err(|_| TransportError::TransientNetwork("CONNACK timeout".to_string()))??;
    if n == 0 {
        return Err(TransportError::TransientNetwork(
            "connection closed during handshake".to_string(),
        ));
    }
    let (packet, _) = decoder
        .decode(&read_buf[..n])?
        .ok_or_else(|| TransportError::TransientNetwork("incomplete CONNACK".to_string()))?;
    match packet {
        Packet::ConnAck(ConnAck { return_code, .. }) if return_code.is_accepted() => {
            debug!("CONNACK accepted");
        }
        Packet::ConnAck(ConnAck { return_code, .. }) => {
            return Err(TransportError::Unauthenticated(format!(
                "CONNACK rejected: {:?}",
                return_code
            )));
        }
        other => {
            return Err(TransportError::TransientNetwork(format!(
                "expected CONNACK, got packet type {}",
                other.packet_type()
            )));
        }
    }

    if !subscriptions.is_empty() {
        let filters: Vec<String> = subscriptions.iter().map(|s| topic_for(s)).collect();
        let subscribe = Packet::Subscribe(Subscribe {
            packet_id: 1,
            filters,
        });
        encoder.encode(&subscribe, &mut write_buf)?;
        writer.write_all(&write_buf).await?;
        write_buf.clear();
        debug!(count = subscriptions.len(), "replayed subscriptions");
    }

    Ok(Session {
        reader,
        writer,
        encoder,
        decoder,
    })
}

/// Run the keepalive/command/inbound-packet loop until shutdown or failure.
#[allow(clippy::too_many_arguments)]
pub(super) async fn run_message_loop<S>(
    session: Session<S>,
    keepalive: Duration,
    normalizer: &Normalizer,
    connection_epoch: u64,
    client_generation: u64,
    current_generation: &AtomicU64,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
) -> Result<Disconnect, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Session {
        mut reader,
        mut writer,
        encoder,
        mut decoder,
    } = session;
    let mut write_buf = BytesMut::new();
    let mut read_buf = vec![0u8; 4096];

    let mut keepalive_timer = tokio::time::interval(keepalive);
    keepalive_timer.reset();

    loop {
        tokio::select! {
            _ = keepalive_timer.tick() => {
                encoder.encode(&Packet::PingReq, &mut write_buf)?;
                writer.write_all(&write_buf).await?;
                write_buf.clear();
                debug!("PINGREQ sent");
            }

            command = command_rx.recv() => {
                match command {
                    Some(Command::Subscribe(symbol)) => {
                        let subscribe = Packet::Subscribe(Subscribe {
                            packet_id: 2,
                            filters: vec![topic_for(&symbol)],
                        });
                        encoder.encode(&subscribe, &mut write_buf)?;
                        writer.write_all(&write_buf).await?;
                        write_buf.clear();
                    }
                    Some(Command::Unsubscribe(symbol)) => {
                        let unsubscribe = Packet::Unsubscribe(Unsubscribe {
                            packet_id: 3,
                            filters: vec![topic_for(&symbol)],
                        });
                        encoder.encode(&unsubscribe, &mut write_buf)?;
                        writer.write_all(&write_buf).await?;
                        write_buf.clear();
                    }
                    Some(Command::Reconnect) => {
                        return Ok(Disconnect::Lost(TransportError::TransientNetwork(
                            "proactive token refresh".to_string(),
                        )));
                    }
                    Some(Command::Shutdown) | None => {
                        encoder.encode(&Packet::Disconnect, &mut write_buf)?;
                        let _ = writer.write_all(&write_buf).await;
                        return Ok(Disconnect::Shutdown);
                    }
                }
            }

            result = reader.read(&mut read_buf) => {
                let n = result?;
                if n == 0 {
                    return Ok(Disconnect::Lost(TransportError::TransientNetwork(
                        "connection closed".to_string(),
                    )));
                }
                let (packet, _) = match decoder.decode(&read_buf[..n]) {
                    Ok(Some(pair)) => pair,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!(error = %err, "discarding malformed packet");
                        continue;
                    }
                };
                match packet {
                    Packet::Publish(publish) => {
                        if current_generation.load(Ordering::Acquire) != client_generation {
                            continue;
                        }
                        normalizer.on_message(&publish.topic, &publish.payload, connection_epoch);
                    }
                    Packet::PingResp => debug!("PINGRESP received"),
                    Packet::SubAck(_) | Packet::UnsubAck(_) => {}
                    Packet::Disconnect => {
                        return Ok(Disconnect::Lost(TransportError::TransientNetwork(
                            "broker sent DISCONNECT".to_string(),
                        )));
                    }
                    _ => {}
                }
            }
        }
    }
}
