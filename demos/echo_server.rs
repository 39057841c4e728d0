//! A WebSocket echo server built on wscodec and tokio.
//! This server accepts WebSocket connections and echoes back any text or binary messages it receives.
//!
//! Try it with any WebSocket client pointed at `ws://127.0.0.1:8080/`.

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tokio_util::codec::{Framed, FramedParts};
use wscodec::{
    codec::{Codec, Incoming},
    handshake::{header_block_len, server},
    Frame, Role,
};

/// Largest request header block accepted before giving up on the client.
const MAX_HEADER_BLOCK: usize = 8 * 1024;

/// Performs the opening handshake on a fresh TCP connection.
///
/// # Returns
/// * `Some(framed)` - The connection, ready to exchange frames
/// * `None` - The client went away or was not a WebSocket client
async fn upgrade(mut stream: TcpStream) -> wscodec::Result<Option<Framed<TcpStream, Codec>>> {
    let mut buf = BytesMut::with_capacity(1024);
    let len = loop {
        if let Some(len) = header_block_len(&buf) {
            break len;
        }
        if buf.len() > MAX_HEADER_BLOCK || stream.read_buf(&mut buf).await? == 0 {
            return Ok(None);
        }
    };

    match server::accept(&buf[..len]) {
        Ok((request, response)) => {
            log::info!("Upgrading {} (origin {:?})", request.resource, request.origin);
            stream.write_all(response.to_string().as_bytes()).await?;
        }
        Err(err) => {
            log::warn!("Rejecting client: {}", err);
            stream.write_all(server::reject_response().as_bytes()).await?;
            return Ok(None);
        }
    }

    let mut parts = FramedParts::new::<Frame>(stream, Codec::new(Role::Server));
    parts.read_buf = buf.split_off(len);
    Ok(Some(Framed::from_parts(parts)))
}

/// Handles an individual client connection by echoing back any received messages.
async fn handle_client(stream: TcpStream) -> wscodec::Result<()> {
    let Some(mut ws) = upgrade(stream).await? else {
        return Ok(());
    };

    while let Some(item) = ws.next().await {
        match item? {
            Incoming::Frame(frame) => ws.send(frame).await?,
            Incoming::Close => break,
        }
    }

    log::debug!("Client disconnected");

    Ok(())
}

/// Main entry point for the WebSocket server.
///
/// Initializes logging and starts listening for WebSocket connections on port 8080.
/// Each client connection is handled in a separate task.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    simple_logger::init_with_level(log::Level::Debug)?;

    let listener = TcpListener::bind("0.0.0.0:8080").await?;

    log::debug!("Listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        log::info!("Client connected from {}", peer);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream).await {
                log::error!("Error in websocket connection: {}", e);
            }
        });
    }
}
