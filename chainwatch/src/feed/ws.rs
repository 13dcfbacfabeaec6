//! WebSocket port
//!
//! A thin wrapper around a blocking `tungstenite` client. The socket is
//! read from a dedicated thread which ships each text frame into a
//! crossbeam channel, so the connection core can `select!` over frames
//! together with its control channels. Non-text messages are handled at
//! this layer and never reach the channel.

use std::thread;

use crossbeam::channel;
use tungstenite::Message;

/// Path of the feed endpoint under the dashboard origin.
pub static FEED_PATH: &str = "/ws";

/// Origin used when none is given on the command line.
pub fn default_origin() -> &'static str {
    "http://localhost:3000"
}

/// Why the stream stopped producing frames. Every variant is recoverable
/// by reconnecting; the distinction only matters for reporting.
#[derive(Debug)]
pub enum RecvError {
    /// The server closed the stream.
    Closed,
    /// Transport-level failure (I/O error, protocol violation).
    Stream(tungstenite::Error),
}

#[derive(Debug)]
pub enum ConnectError {
    /// The origin string could not be turned into a feed url.
    InvalidOrigin(String),
    /// The connection or websocket handshake failed.
    Handshake(tungstenite::Error),
}

/// Derive the feed url from the dashboard origin: the scheme is upgraded
/// to its streaming equivalent (`http` to `ws`, `https` to `wss`) and the
/// fixed feed path is appended. A bare `host[:port]` is taken as plain
/// `ws`.
pub fn feed_url(origin: &str) -> Result<String, ConnectError> {
    let split: Vec<&str> = origin.splitn(2, "://").collect();
    let (scheme, rest) = match split[..] {
        [scheme, rest] => (scheme, rest),
        _ => ("ws", origin),
    };
    let scheme = match scheme {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(ConnectError::InvalidOrigin(origin.to_string())),
    };
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Err(ConnectError::InvalidOrigin(origin.to_string()));
    }
    Ok(format!("{}://{}{}", scheme, rest, FEED_PATH))
}

/// One open feed stream. Dropping the port drops the receiving side of
/// the channel, which makes the reader thread exit on its next frame.
pub struct Port {
    rx: channel::Receiver<Result<String, RecvError>>,
}

/// Frames buffered before the reader blocks. The feed is low-rate, so
/// backpressure here only matters if the consumer wedges entirely.
static RX_CHANNEL_SIZE: usize = 64;

impl Port {
    /// Connect to an already-derived feed url. Blocks for the duration of
    /// the TCP connect and websocket handshake.
    pub fn connect(url: &str) -> Result<Port, ConnectError> {
        let (mut socket, _response) =
            tungstenite::connect(url).map_err(ConnectError::Handshake)?;
        let (tx, rx) = channel::bounded(RX_CHANNEL_SIZE);
        thread::spawn(move || loop {
            let result = match socket.read() {
                Ok(Message::Text(text)) => Ok(text.into()),
                // Ping/pong replies are queued internally by tungstenite
                // and flushed on the next read. Binary frames are not part
                // of the feed protocol.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_)) => continue,
                Ok(Message::Close(_)) => Err(RecvError::Closed),
                Ok(Message::Frame(_)) => continue,
                Err(err) => Err(RecvError::Stream(err)),
            };
            let stop = result.is_err();
            if tx.send(result).is_err() || stop {
                break;
            }
        });
        Ok(Port { rx })
    }

    /// To use with `crossbeam::select!`.
    pub fn receiver(&self) -> &channel::Receiver<Result<String, RecvError>> {
        &self.rx
    }
}
