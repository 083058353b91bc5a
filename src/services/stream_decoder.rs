use bytes::Bytes;
use futures::Stream;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::models::ToolInvocation;

use super::cancellation::CancelToken;
use super::error::SendError;

/// Marker prefix carried by every recognized event frame.
pub const FRAME_PREFIX: &str = "data: ";

/// One decoded event from a streaming generation response. Ephemeral, never
/// persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A text fragment of the reply being generated. The first frame may
    /// also carry the tools the backend invoked.
    Delta {
        text: String,
        tools_used: Option<Vec<ToolInvocation>>,
    },
    /// Normal end of the stream.
    Done,
}

/// Type alias for decoded event streams.
pub type EventStream = BoxStream<'static, Result<StreamEvent, SendError>>;

/// Wire shape of one frame payload:
/// `{message: {content?, tools_used?, error?}, error?}`.
#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(default)]
    message: Option<FrameMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FrameMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tools_used: Option<Vec<ToolInvocation>>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode a framed response body into a lazy sequence of [`StreamEvent`]s.
///
/// Bytes are decoded to text incrementally and split on line boundaries;
/// only lines carrying [`FRAME_PREFIX`] are considered frames. A frame that
/// fails to parse is logged and skipped — transient partial frames must not
/// abort the stream. An explicit error field (top-level or inside
/// `message`) is an in-band error: decoding stops immediately without
/// waiting for end-of-body. End-of-body yields a final [`StreamEvent::Done`].
///
/// The cancel token is checked before every body read; on trigger the
/// stream yields [`SendError::Cancelled`] and stops, dropping the body —
/// which aborts the underlying connection.
pub fn decode_frames<S, E>(body: S, cancel: CancelToken) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<SendError> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        tokio::pin!(body);
        let mut buffer = String::new();
        let mut undecoded: Vec<u8> = Vec::new();

        loop {
            if cancel.is_cancelled() {
                debug!("cancellation requested; aborting response body");
                yield Err(SendError::Cancelled);
                return;
            }

            let Some(chunk) = body.next().await else {
                break;
            };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(err.into());
                    return;
                }
            };

            undecoded.extend_from_slice(&chunk);
            buffer.push_str(&drain_utf8(&mut undecoded));
            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);
                match parse_frame_line(&line) {
                    Ok(Some(event)) => yield Ok(event),
                    Ok(None) => {}
                    Err(err) => {
                        // In-band error: stop consuming immediately.
                        yield Err(err);
                        return;
                    }
                }
            }
        }

        // A final frame may arrive without a trailing newline; a character
        // truncated by the end of the body decodes lossily.
        buffer.push_str(&String::from_utf8_lossy(&undecoded));
        let line = buffer.trim().to_string();
        if !line.is_empty() {
            match parse_frame_line(&line) {
                Ok(Some(event)) => yield Ok(event),
                Ok(None) => {}
                Err(err) => {
                    yield Err(err);
                    return;
                }
            }
        }

        yield Ok(StreamEvent::Done);
    })
}

/// Decode as much of `bytes` as forms valid UTF-8, leaving an incomplete
/// trailing character behind to be completed by the next chunk. Chunk
/// boundaries fall anywhere, including mid-character. Genuinely invalid
/// sequences decode to the replacement character and are consumed.
fn drain_utf8(bytes: &mut Vec<u8>) -> String {
    let mut decoded = String::new();
    loop {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                decoded.push_str(text);
                bytes.clear();
                return decoded;
            }
            Err(err) => {
                let valid = err.valid_up_to();
                decoded.push_str(std::str::from_utf8(&bytes[..valid]).unwrap_or_default());
                match err.error_len() {
                    Some(invalid) => {
                        decoded.push(char::REPLACEMENT_CHARACTER);
                        bytes.drain(..valid + invalid);
                    }
                    None => {
                        // Incomplete trailing character; keep its bytes.
                        bytes.drain(..valid);
                        return decoded;
                    }
                }
            }
        }
    }
}

/// Parse one line of the response body.
///
/// Returns `Ok(None)` for lines that carry no event (blank, unrecognized,
/// malformed, or content-free heartbeats) and `Err` for in-band errors.
fn parse_frame_line(line: &str) -> Result<Option<StreamEvent>, SendError> {
    if line.is_empty() {
        return Ok(None);
    }
    let Some(payload) = line.strip_prefix(FRAME_PREFIX) else {
        trace!(line, "skipping line without frame prefix");
        return Ok(None);
    };

    let frame: Frame = match serde_json::from_str(payload) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "skipping unparseable frame");
            return Ok(None);
        }
    };

    if let Some(error) = frame.error {
        return Err(SendError::InBand(error));
    }
    let Some(message) = frame.message else {
        return Ok(None);
    };
    if let Some(error) = message.error {
        return Err(SendError::InBand(error));
    }

    match message.content {
        Some(text) => Ok(Some(StreamEvent::Delta {
            text,
            tools_used: message.tools_used,
        })),
        None => Ok(None),
    }
}
