//! In-memory peer for lifecycle and session tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{Instant, sleep};

use crate::error::{Error, Result};
use crate::protocol::{Frame, PING_RESPONSE, decode_frame, encode_connect_ack, encode_subscribe_ack};

use super::socket::{Connector, Transport};

/// One scripted event delivered after the handshake.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Deliver these bytes.
    Frame(Vec<u8>),
    /// Let one receive wait elapse.
    Idle,
    /// Close the stream.
    Close,
}

/// Behavior of one accepted connection.
#[derive(Debug, Clone)]
pub(crate) struct Peer {
    connack_code: u8,
    answer_pings: bool,
    before_suback: Option<Vec<u8>>,
    script: VecDeque<Step>,
}

impl Peer {
    pub(crate) fn new() -> Self {
        Self {
            connack_code: 0,
            answer_pings: true,
            before_suback: None,
            script: VecDeque::new(),
        }
    }

    pub(crate) fn with_connack_code(mut self, code: u8) -> Self {
        self.connack_code = code;
        self
    }

    pub(crate) fn without_ping_replies(mut self) -> Self {
        self.answer_pings = false;
        self
    }

    pub(crate) fn with_frame_before_suback(mut self, bytes: Vec<u8>) -> Self {
        self.before_suback = Some(bytes);
        self
    }

    pub(crate) fn then(mut self, step: Step) -> Self {
        self.script.push_back(step);
        self
    }
}

enum Plan {
    Accept(Peer),
    Refuse,
    Hang,
}

#[derive(Default)]
struct Shared {
    plans: VecDeque<Plan>,
    sent: Vec<Vec<u8>>,
    open_times: Vec<Instant>,
}

/// Connector handing out scripted peers in order; refuses once they run out.
#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    shared: Arc<Mutex<Shared>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn accept(&self, peer: Peer) {
        self.shared.lock().plans.push_back(Plan::Accept(peer));
    }

    pub(crate) fn refuse(&self) {
        self.shared.lock().plans.push_back(Plan::Refuse);
    }

    /// Next open never completes.
    pub(crate) fn hang(&self) {
        self.shared.lock().plans.push_back(Plan::Hang);
    }

    /// Every message sent on any transport, in order.
    pub(crate) fn sent(&self) -> Vec<Vec<u8>> {
        self.shared.lock().sent.clone()
    }

    pub(crate) fn open_count(&self) -> usize {
        self.shared.lock().open_times.len()
    }

    pub(crate) fn open_times(&self) -> Vec<Instant> {
        self.shared.lock().open_times.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn open(&self) -> Result<MockTransport> {
        let plan = {
            let mut shared = self.shared.lock();
            shared.open_times.push(Instant::now());
            shared.plans.pop_front()
        };
        match plan {
            Some(Plan::Accept(peer)) => Ok(MockTransport {
                peer,
                inbox: VecDeque::new(),
                shared: Arc::clone(&self.shared),
                closed: false,
            }),
            Some(Plan::Hang) => std::future::pending().await,
            Some(Plan::Refuse) | None => Err(Error::connection("connection refused")),
        }
    }
}

/// Transport answering handshake frames like a broker would.
pub(crate) struct MockTransport {
    peer: Peer,
    inbox: VecDeque<Vec<u8>>,
    shared: Arc<Mutex<Shared>>,
    closed: bool,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        match decode_frame(&bytes) {
            Some(Frame::Connect { .. }) => {
                self.inbox.push_back(encode_connect_ack(self.peer.connack_code));
            }
            Some(Frame::Subscribe { packet_id, .. }) => {
                if let Some(early) = self.peer.before_suback.take() {
                    self.inbox.push_back(early);
                }
                self.inbox.push_back(encode_subscribe_ack(packet_id));
            }
            Some(Frame::PingRequest) if self.peer.answer_pings => {
                self.inbox.push_back(PING_RESPONSE.to_vec());
            }
            _ => {}
        }
        self.shared.lock().sent.push(bytes);
        Ok(())
    }

    async fn recv_binary(&mut self, wait: Duration) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        if let Some(bytes) = self.inbox.pop_front() {
            return Ok(Some(bytes));
        }
        match self.peer.script.pop_front() {
            Some(Step::Frame(bytes)) => Ok(Some(bytes)),
            Some(Step::Close) => {
                self.closed = true;
                Err(Error::ConnectionClosed)
            }
            Some(Step::Idle) | None => {
                sleep(wait).await;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
