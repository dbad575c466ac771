//! One request and its reply on the shared medium.
//!
//! A [`Transaction`] runs on a medium the caller already holds exclusively.
//! Request/response runs go through:
//!
//! ```text
//! Idle -> Sending -> AwaitingResponse -> Complete | TimedOut | Failed
//! ```
//!
//! Fire-and-forget runs stop at `Complete` once the write has drained.

use std::time::{Duration, Instant};

use bytes::{Buf, Bytes, BytesMut};
use pibridge_frame::{encode, parse_frame, Domain, Frame, FrameError};
use pibridge_transport::Transport;
use serde::Serialize;

use crate::error::{BridgeError, Result};
use crate::rx::{ReceiveBuffer, RxError};

/// Where a transaction is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Idle,
    Sending,
    AwaitingResponse,
    Complete,
    TimedOut,
    Failed,
}

impl TransactionState {
    /// Returns true for `Complete`, `TimedOut` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Complete | TransactionState::TimedOut | TransactionState::Failed
        )
    }
}

/// A matched reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Command echoed by the module.
    pub command: u16,
    /// Reply payload.
    pub payload: Bytes,
}

/// A single call on the medium.
#[derive(Debug)]
pub struct Transaction {
    request: Frame,
    max_response_len: usize,
    timeout: Duration,
    state: TransactionState,
    noise_frames: u64,
}

impl Transaction {
    /// Prepare a call. `max_response_len` bounds the reply payload.
    pub fn new(request: Frame, max_response_len: usize, timeout: Duration) -> Self {
        Self {
            request,
            max_response_len,
            timeout,
            state: TransactionState::Idle,
            noise_frames: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Frames from other modules skipped while waiting.
    pub fn noise_frames(&self) -> u64 {
        self.noise_frames
    }

    /// The outbound frame.
    pub fn request(&self) -> &Frame {
        &self.request
    }

    /// Write the request and finish without waiting for a reply.
    pub fn run_send(&mut self, medium: &mut dyn Transport) -> Result<()> {
        let wire = self.encode_request()?;
        self.transmit(medium, &wire)?;
        self.transition(TransactionState::Complete);
        Ok(())
    }

    /// Write the request and wait for the matching reply.
    ///
    /// Pending input is discarded first so a late reply to an earlier call
    /// can never be taken for this one.
    pub fn run_request(&mut self, medium: &mut dyn Transport) -> Result<Response> {
        let wire = self.encode_request()?;

        if let Err(err) = ReceiveBuffer::new(medium).clear() {
            return Err(self.fail(err.into()));
        }
        self.transmit(medium, &wire)?;

        self.transition(TransactionState::AwaitingResponse);
        let deadline = Instant::now() + self.timeout;
        let mut rx = ReceiveBuffer::new(medium);
        let mut pending = BytesMut::new();
        // A whole frame that failed its checksum.
        let mut corrupt = None;
        // A started frame that never finished.
        let mut stalled = None;

        loop {
            match parse_frame(&pending) {
                Ok((frame, used)) => {
                    pending.advance(used);
                    if frame.is_reply_to(&self.request) {
                        return self.accept(frame);
                    }
                    self.noise_frames += 1;
                    tracing::debug!(
                        domain = %frame.domain,
                        address = frame.address,
                        command = frame.command,
                        "skipping frame for another module"
                    );
                }
                Err(FrameError::Truncated { needed, available }) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    let received = if remaining.is_zero() {
                        None
                    } else {
                        // Read no further than the frame being assembled.
                        match rx.receive_with_timeout(needed - available, Some(remaining)) {
                            Ok(bytes) => Some(bytes),
                            Err(RxError::TimedOut(_)) | Err(RxError::Empty) => None,
                            Err(RxError::Transport(err)) => {
                                return Err(self.fail(BridgeError::Transport(err)))
                            }
                        }
                    };
                    let Some(bytes) = received else {
                        if available > 0 {
                            stalled = Some(FrameError::Truncated { needed, available });
                        }
                        break;
                    };
                    pending.extend_from_slice(&bytes);
                    if let Some(frame) = self.salvage(&pending) {
                        return self.accept(frame);
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "resyncing receive stream");
                    if matches!(err, FrameError::ChecksumMismatch { .. }) {
                        corrupt = Some(err);
                    }
                    pending.advance(1);
                }
            }
        }

        // A skipped stray byte is line noise; only a damaged or unfinished
        // frame counts as a decode failure.
        match corrupt.or(stalled) {
            Some(err) => Err(self.fail(BridgeError::Decode(err))),
            None => {
                self.transition(TransactionState::TimedOut);
                Err(BridgeError::TimedOut(self.timeout))
            }
        }
    }

    fn encode_request(&mut self) -> Result<Bytes> {
        encode(&self.request).map_err(|err| self.fail(BridgeError::Encoding(err)))
    }

    fn transmit(&mut self, medium: &mut dyn Transport, wire: &[u8]) -> Result<()> {
        self.transition(TransactionState::Sending);
        medium
            .send(wire)
            .map_err(|err| self.fail(BridgeError::Transport(err)))
    }

    fn accept(&mut self, frame: Frame) -> Result<Response> {
        if frame.payload.len() > self.max_response_len {
            return Err(self.fail(BridgeError::ResponseTooLarge {
                len: frame.payload.len(),
                max: self.max_response_len,
            }));
        }
        self.transition(TransactionState::Complete);
        Ok(Response {
            command: frame.command,
            payload: frame.payload,
        })
    }

    /// Look for a whole reply behind a bogus header that is still waiting
    /// for bytes that may never come.
    fn salvage(&self, pending: &[u8]) -> Option<Frame> {
        (1..pending.len())
            .filter(|&offset| Domain::from_marker(pending[offset]).is_some())
            .filter_map(|offset| parse_frame(&pending[offset..]).ok())
            .map(|(frame, _)| frame)
            .find(|frame| frame.is_reply_to(&self.request))
    }

    fn fail(&mut self, err: BridgeError) -> BridgeError {
        self.transition(TransactionState::Failed);
        err
    }

    fn transition(&mut self, next: TransactionState) {
        tracing::trace!(
            domain = %self.request.domain,
            address = self.request.address,
            from = ?self.state,
            to = ?next,
            "transaction state"
        );
        self.state = next;
    }
}
