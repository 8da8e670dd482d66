//! Per-request reply channel.
//!
//! Every request gets its own channel carrying at most two messages: an
//! optional provisional [`CaptureReply::CaptureTaken`] and exactly one
//! [`CaptureReply::Final`]. The provisional message, when sent, always
//! arrives first. Replies of different requests are unordered.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use crate::error::CaptureError;

/// Text of the provisional acknowledgement.
pub const CAPTURE_TAKEN_MESSAGE: &str = "capture taken";

/// Result of a capture-and-compare request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompareResult {
    /// Differing pixels after the pixel-tolerance floor.
    pub differing_pixels: u32,
    /// Location of the persisted actual image, when it was written.
    pub actual_location: Option<PathBuf>,
    /// Location of the persisted diff image, when one was written.
    pub diff_location: Option<PathBuf>,
}

impl CompareResult {
    pub fn passed(&self) -> bool {
        self.differing_pixels == 0
    }
}

/// Single-line `"<count> <actual> <diff>"` form; absent locations are empty.
impl fmt::Display for CompareResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = |path: &Option<PathBuf>| {
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        write!(
            f,
            "{} {} {}",
            self.differing_pixels,
            location(&self.actual_location),
            location(&self.diff_location)
        )
    }
}

/// Final state of one request.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// Capture-only request: where the image was written.
    Captured { location: PathBuf },
    /// Capture-and-compare request.
    Compared(CompareResult),
    /// The request failed. Nothing further will be delivered for it.
    Failed(CaptureError),
}

impl CaptureOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    pub fn into_result(self) -> Result<CaptureSuccess, CaptureError> {
        match self {
            Self::Captured { location } => Ok(CaptureSuccess::Captured { location }),
            Self::Compared(result) => Ok(CaptureSuccess::Compared(result)),
            Self::Failed(err) => Err(err),
        }
    }
}

/// Successful outcomes, for callers that prefer `?` over matching.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureSuccess {
    Captured { location: PathBuf },
    Compared(CompareResult),
}

#[derive(Debug)]
pub enum CaptureReply {
    /// Provisional: the snapshot exists, file I/O and comparison are still
    /// running. A `Final` reply follows.
    CaptureTaken,
    Final(CaptureOutcome),
}

impl CaptureReply {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }
}

enum SinkKind {
    Sync(mpsc::Sender<CaptureReply>),
    #[cfg(feature = "tokio-stream")]
    Async(tokio::sync::mpsc::UnboundedSender<CaptureReply>),
}

/// Sending half of one request's reply channel. `finish` consumes the
/// sink, so a request cannot deliver twice.
pub(crate) struct ReplySink {
    kind: SinkKind,
}

impl ReplySink {
    pub(crate) fn provisional(&self) {
        self.send(CaptureReply::CaptureTaken);
    }

    pub(crate) fn finish(self, outcome: CaptureOutcome) {
        self.send(CaptureReply::Final(outcome));
    }

    fn send(&self, reply: CaptureReply) {
        // A dropped ticket means nobody is waiting; the flow still runs to
        // completion so artifacts are written.
        let delivered = match &self.kind {
            SinkKind::Sync(tx) => tx.send(reply).is_ok(),
            #[cfg(feature = "tokio-stream")]
            SinkKind::Async(tx) => tx.send(reply).is_ok(),
        };
        if !delivered {
            tracing::debug!("capture reply dropped: ticket no longer held");
        }
    }
}

pub(crate) fn channel() -> (ReplySink, CaptureTicket) {
    let (tx, rx) = mpsc::channel();
    (
        ReplySink {
            kind: SinkKind::Sync(tx),
        },
        CaptureTicket { receiver: rx },
    )
}

/// Receiving half of one request's reply channel.
pub struct CaptureTicket {
    receiver: mpsc::Receiver<CaptureReply>,
}

impl CaptureTicket {
    /// Block until the next reply arrives. Errors once both messages have
    /// been received, or if the request was dropped without a reply.
    pub fn recv(&self) -> Result<CaptureReply, mpsc::RecvError> {
        self.receiver.recv()
    }

    pub fn try_recv(&self) -> Result<CaptureReply, mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<CaptureReply, mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Block until the final outcome, skipping the provisional reply.
    pub fn wait(self) -> CaptureOutcome {
        loop {
            match self.receiver.recv() {
                Ok(CaptureReply::CaptureTaken) => continue,
                Ok(CaptureReply::Final(outcome)) => return outcome,
                Err(mpsc::RecvError) => return CaptureOutcome::Failed(CaptureError::WorkerDead),
            }
        }
    }
}

#[cfg(feature = "tokio-stream")]
pub(crate) fn async_channel() -> (ReplySink, AsyncCaptureTicket) {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    (
        ReplySink {
            kind: SinkKind::Async(tx),
        },
        AsyncCaptureTicket { receiver: rx },
    )
}

/// Async receiving half of one request's reply channel.
///
/// Requires the `tokio-stream` feature.
#[cfg(feature = "tokio-stream")]
pub struct AsyncCaptureTicket {
    receiver: tokio::sync::mpsc::UnboundedReceiver<CaptureReply>,
}

#[cfg(feature = "tokio-stream")]
impl AsyncCaptureTicket {
    /// Await the next reply; `None` once the channel is exhausted.
    pub async fn next_reply(&mut self) -> Option<CaptureReply> {
        self.receiver.recv().await
    }

    /// Await the final outcome, skipping the provisional reply.
    pub async fn outcome(mut self) -> CaptureOutcome {
        while let Some(reply) = self.receiver.recv().await {
            if let CaptureReply::Final(outcome) = reply {
                return outcome;
            }
        }
        CaptureOutcome::Failed(CaptureError::WorkerDead)
    }
}
