//! WebSocket binding of the stream transport traits.

use std::net::TcpStream;

use skylark_proto::RawFrame;
use skylark_stream::{StreamConnection, StreamDialer, StreamError, StreamResult};
use tracing::{debug, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Dials the event stream over a WebSocket.
pub struct WsDialer {
    endpoint: url::Url,
}

impl WsDialer {
    /// Creates a dialer for the given stream endpoint.
    pub fn new(endpoint: url::Url) -> Self {
        Self { endpoint }
    }
}

impl StreamDialer for WsDialer {
    fn dial(&self, resume_cursor: Option<u64>) -> StreamResult<Box<dyn StreamConnection>> {
        let mut endpoint = self.endpoint.clone();
        if let Some(cursor) = resume_cursor {
            endpoint
                .query_pairs_mut()
                .append_pair("cursor", &cursor.to_string());
        }

        let (socket, response) = tungstenite::connect(endpoint.as_str())
            .map_err(|err| StreamError::Handshake(err.to_string()))?;

        if !response.status().is_informational() && !response.status().is_success() {
            return Err(StreamError::Handshake(format!(
                "unexpected handshake status {}",
                response.status()
            )));
        }

        Ok(Box::new(WsConnection { socket }))
    }
}

/// One live WebSocket connection.
struct WsConnection {
    socket: WebSocket<MaybeTlsStream<TcpStream>>,
}

impl StreamConnection for WsConnection {
    fn read_frame(&mut self) -> StreamResult<Option<RawFrame>> {
        loop {
            let message = match self.socket.read() {
                Ok(message) => message,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                }
                Err(err) => return Err(StreamError::transport_retryable(err.to_string())),
            };

            match message {
                Message::Binary(bytes) => match RawFrame::decode(&bytes) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(err) => {
                        // An unreadable envelope has no usable sequence
                        // number; skip the message and keep reading.
                        debug!(error = %err, "skipping unreadable stream message");
                    }
                },
                Message::Close(_) => return Ok(None),
                // Control and text traffic is not frame data.
                Message::Ping(_) | Message::Pong(_) | Message::Text(_) | Message::Frame(_) => {}
            }
        }
    }

    fn close(&mut self) {
        if let Err(err) = self.socket.close(None) {
            match err {
                tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {}
                other => warn!(error = %other, "error closing stream socket"),
            }
        }
    }
}
