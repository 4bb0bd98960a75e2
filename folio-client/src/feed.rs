// SSE consumer for the change feed.
//
// The server frames each change as:
//
//   event: INSERT | UPDATE | DELETE
//   id:    evt_...
//   data:  <json ChangeEvent>
//
// separated by blank lines, with `: heartbeat` comments every 15 seconds.
// `SseDecoder` reassembles frames from arbitrary byte chunks; `subscribe`
// drives a streaming request and forwards decoded events into a channel
// that plugs into `LiveStore` as a `FeedSource`.

use futures::StreamExt;
use reqwest::header;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use folio_shared::types::feed::{ChangeEvent, FeedTable};

use crate::api::ClientError;

#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every event completed by this chunk, in
    /// wire order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ChangeEvent> {
        self.buf.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(pos) = self.buf.find("\n\n") {
            let frame: String = self.buf.drain(..pos + 2).collect();
            if let Some(event) = Self::parse_frame(frame.trim_end()) {
                events.push(event);
            }
        }
        events
    }

    fn parse_frame(frame: &str) -> Option<ChangeEvent> {
        let mut data = String::new();
        for line in frame.lines() {
            // Comment lines (heartbeats) start with ':'. `event:` and `id:`
            // are redundant with the payload and skipped.
            if let Some(rest) = line.strip_prefix("data:") {
                data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            }
        }

        if data.is_empty() {
            return None;
        }

        match serde_json::from_str::<ChangeEvent>(&data) {
            Ok(event) => Some(event),
            Err(_) => {
                // Service frames like `_warning` are not change events.
                debug!(frame = %data, "skipping non-change feed frame");
                None
            }
        }
    }
}

/// Owns the streaming connection; dropping it aborts the reader task and
/// closes the channel.
pub struct FeedHandle {
    task: JoinHandle<()>,
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Open the SSE feed for `table`. The notifications feed needs the session
/// token; the projects feed does not.
///
/// There is no reconnect or polling fallback: when the stream ends, the
/// channel closes and the cache stays stale until a manual `refetch`.
pub async fn subscribe(
    base_url: &str,
    table: FeedTable,
    token: Option<&str>,
) -> Result<(mpsc::UnboundedReceiver<ChangeEvent>, FeedHandle), ClientError> {
    let url = format!(
        "{}/feed?table={}",
        base_url.trim_end_matches('/'),
        table.as_str()
    );

    let mut request = reqwest::Client::new()
        .get(url)
        .header(header::ACCEPT, "text/event-stream");
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("feed connection failed")
                .to_string(),
        });
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in decoder.push(&bytes) {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "feed stream error, cache stale until refetch");
                    break;
                }
            }
        }
    });

    Ok((rx, FeedHandle { task }))
}
