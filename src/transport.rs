//! Transport — out of the protocol's core, but the binaries need a concrete
//! realization of it to run.
//!
//! One short-lived TCP connection per message, JSON body: connect, write the
//! encoded envelope, half-close; the peer on the other end reads until EOF
//! then parses. The accept loop spawns one task per accepted connection and
//! logs and drops the connection on any per-connection error, so one bad
//! peer can never wedge the listener.

use std::{collections::BTreeMap, net::SocketAddr};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::warn;

use crate::{
    config::PeerId,
    error::ProtocolError,
    protocol::{Command, Envelope, Event, EventSender, Net, QueryKind},
};

#[derive(Debug, Clone)]
pub struct TcpNet {
    peers: BTreeMap<PeerId, SocketAddr>,
}

impl TcpNet {
    pub fn new(peers: BTreeMap<PeerId, SocketAddr>) -> Self {
        Self { peers }
    }
}

impl Net for TcpNet {
    fn send_to(&self, dest: &PeerId, envelope: Envelope) {
        let Some(addr) = self.peers.get(dest).copied() else {
            warn!(peer = %dest, "no known address for destination, dropping message");
            return;
        };
        let dest = dest.clone();
        tokio::spawn(async move {
            if let Err(err) = send_once(addr, &envelope).await {
                warn!(
                    peer = %dest,
                    error = %ProtocolError::TransportFailure { dest: dest.clone(), source: err },
                    "failed to deliver message"
                );
            }
        });
    }
}

async fn send_once(addr: SocketAddr, envelope: &Envelope) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec(envelope)?;
    let mut stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Accept loop: one task per connection, fed into `events`. Never returns
/// except on listener failure.
pub async fn accept_loop(listener: TcpListener, events: EventSender) -> anyhow::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let events = events.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, &events).await {
                warn!(peer = %peer_addr, %err, "dropping connection");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, events: &EventSender) -> anyhow::Result<()> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let envelope: Envelope = serde_json::from_slice(&buf)
        .map_err(|err| ProtocolError::MalformedMessage(err.to_string()))?;
    match envelope {
        Envelope::Command(Command::Balance) => respond(stream, events, QueryKind::Balance).await,
        Envelope::Command(Command::BalanceTable) => {
            respond(stream, events, QueryKind::BalanceTable).await
        }
        Envelope::Command(Command::Blockchain) => {
            respond(stream, events, QueryKind::Blockchain).await
        }
        other => {
            events
                .send(Event::Inbound(other))
                .map_err(|_| anyhow::anyhow!("engine channel closed"))?;
            Ok(())
        }
    }
}

async fn respond(mut stream: TcpStream, events: &EventSender, kind: QueryKind) -> anyhow::Result<()> {
    let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
    events
        .send(Event::Query(kind, reply_tx))
        .map_err(|_| anyhow::anyhow!("engine channel closed"))?;
    let response = reply_rx.await?;
    let bytes = serde_json::to_vec(&response)?;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Sends one envelope and reads back whatever the peer writes before closing
/// its end — used by the operator CLI to both submit commands and collect
/// query responses over the same short-lived connection.
pub async fn request(addr: SocketAddr, envelope: &Envelope) -> anyhow::Result<Vec<u8>> {
    let bytes = serde_json::to_vec(envelope)?;
    let mut stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(response)
}
