//! Progress channel: a WebSocket scoped to one job.
//!
//! The service pushes JSON text frames; the client never sends application
//! messages. Frames are decoded into [`ChannelInput`]s and folded through
//! the pure [`reduce`] function in arrival order, with no reordering or
//! coalescing. On the first terminal state the client closes the socket and
//! stops reading, so anything the server sends afterwards is never applied.

use super::progress::{reduce, ChannelInput, ChannelState, Effect};
use crate::config::ClientConfig;
use crate::error::RelayError;
use crate::job::{Job, ProgressEvent};
use crate::view::{View, ViewSelector};
use futures::stream;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_stream::Stream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A boxed stream of transport inputs.
pub type InputStream<'a> = Pin<Box<dyn Stream<Item = ChannelInput> + Send + 'a>>;

/// How a followed channel ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOutcome {
    /// Always terminal unless the input stream ran dry.
    pub state: ChannelState,
    /// Decoded progress frames applied or ignored along the way.
    pub events: usize,
}

/// An open progress connection for one job.
pub struct ProgressChannel {
    ws: WsStream,
    /// URL without the query string, so the API key never reaches the logs.
    log_url: String,
}

impl ProgressChannel {
    /// Connect to `<progress root><progress_path>/<job_id>`.
    pub async fn open(config: &ClientConfig, job_id: &str) -> Result<Self, RelayError> {
        let url = config.progress_url(job_id)?;
        let log_url = redact(&url);
        info!("Opening progress channel: {}", log_url);

        let secs = config.connect_timeout_secs;
        let connect = connect_async(url.as_str());
        let (ws, response) = tokio::time::timeout(Duration::from_secs(secs), connect)
            .await
            .map_err(|_| RelayError::Timeout {
                url: log_url.clone(),
                secs,
            })?
            .map_err(|e| RelayError::ConnectionFailed {
                url: log_url.clone(),
                reason: describe(&e),
            })?;
        debug!("Progress channel handshake: HTTP {}", response.status());

        Ok(Self { ws, log_url })
    }

    pub fn url(&self) -> &str {
        &self.log_url
    }

    /// Apply every frame until a terminal state, then close the socket.
    ///
    /// Progress frames update `job` and are rendered through `view`; a
    /// completion switches the view to [`View::Result`]. Failures are
    /// recorded on `job` and returned in the outcome for the caller to
    /// report.
    pub async fn follow(self, view: &dyn ViewSelector, job: &mut Job) -> ChannelOutcome {
        let (mut sink, read) = self.ws.split();

        let inputs = stream::once(async { ChannelInput::Opened })
            .chain(decode_frames(read))
            .chain(stream::once(async {
                ChannelInput::Lost {
                    reason: "connection closed before the job finished".to_string(),
                }
            }));

        let outcome = drive(Box::pin(inputs), view, job).await;

        if let Err(e) = sink.close().await {
            debug!("Closing progress channel {}: {}", self.log_url, e);
        }
        outcome
    }
}

/// Fold `inputs` through the state machine, executing effects on `view`
/// and `job`.
///
/// Returns at the first `Close` effect. Works on any input stream, which is
/// how the state machine is exercised without a socket.
pub async fn drive(
    mut inputs: InputStream<'_>,
    view: &dyn ViewSelector,
    job: &mut Job,
) -> ChannelOutcome {
    let mut state = ChannelState::default();
    let mut events = 0usize;
    let mut last_progress = 0i64;

    while let Some(input) = inputs.next().await {
        if let ChannelInput::Event(ref ev) = input {
            events += 1;
            debug!(
                "Progress frame #{}: {} {:?}",
                events, ev.progress, ev.message
            );
            if !state.is_terminal()
                && ev.progress != ProgressEvent::FAILED
                && ev.progress < last_progress
            {
                warn!(
                    "Progress went backwards: {} -> {}",
                    last_progress, ev.progress
                );
            }
        }

        let (next, effects) = reduce(state, input);
        state = next;

        for effect in effects {
            match effect {
                Effect::Render(snapshot) => {
                    last_progress = snapshot.progress;
                    job.update(
                        snapshot.progress,
                        Some(snapshot.message.as_str()),
                        Some(snapshot.detail.as_str()),
                    );
                    view.render_progress(&snapshot);
                }
                Effect::Complete { download_url } => {
                    info!("Job complete, artifact at {}", download_url);
                    job.complete(download_url.as_str());
                    view.show(View::Result);
                }
                Effect::Fail(t) => {
                    warn!("Job failed: {:?}", t);
                    job.fail(t.message());
                }
                Effect::Close => return ChannelOutcome { state, events },
            }
        }
    }

    ChannelOutcome { state, events }
}

/// Map raw WebSocket messages to channel inputs.
///
/// Undecodable text frames are skipped with a warning; binary frames and
/// control frames are ignored.
fn decode_frames<'a, S>(read: S) -> impl Stream<Item = ChannelInput> + Send + 'a
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Send + 'a,
{
    read.filter_map(|msg| async move {
        match msg {
            Ok(Message::Text(text)) => match ProgressEvent::from_json(&text) {
                Ok(ev) => Some(ChannelInput::Event(ev)),
                Err(e) => {
                    warn!("Ignoring progress frame: {}", e);
                    None
                }
            },
            Ok(Message::Close(frame)) => {
                let reason = match frame {
                    Some(f) => format!(
                        "server closed the connection ({} {})",
                        u16::from(f.code),
                        f.reason
                    ),
                    None => "server closed the connection".to_string(),
                };
                Some(ChannelInput::Lost { reason })
            }
            Ok(Message::Binary(bytes)) => {
                debug!("Ignoring {}-byte binary frame", bytes.len());
                None
            }
            Ok(_) => None,
            Err(e) => Some(ChannelInput::Lost {
                reason: describe(&e),
            }),
        }
    })
}

fn describe(e: &tungstenite::Error) -> String {
    match e {
        tungstenite::Error::Http(response) => format!("handshake rejected with HTTP {}", response.status()),
        other => other.to_string(),
    }
}

fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}
