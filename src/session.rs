//! Feed session run loop.
//!
//! [`FeedSession`] ties the pieces together: it pulls frames from the
//! [`Lifecycle`], turns broadcast publishes into [`RoundSnapshot`]s, folds
//! them through the [`RoundEngine`] and hands every finalized record to a
//! [`RecordSink`] in finalize order.
//!
//! # Example
//!
//! ```ignore
//! use round_tracker::{FeedConfig, FeedSession, JsonFileStore};
//! use round_tracker::transport::{HttpTokenSource, Lifecycle, WsConnector};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = FeedConfig::default();
//! let tokens = HttpTokenSource::from_config(&config)?;
//! let connector = WsConnector::from_config(&config);
//! let lifecycle = Lifecycle::new(config, connector, tokens, CancellationToken::new());
//!
//! let mut session = FeedSession::new(lifecycle, JsonFileStore::new("results.json"));
//! let summary = session.run().await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::Frame;
use crate::round::{GameState, OptionId, RoundEngine, RoundRecord, RoundSnapshot, RoundStatistics};
use crate::store::RecordSink;
use crate::transport::{Connector, Lifecycle, TokenSource};

// ============================================================================
// Constants
// ============================================================================

/// Every n-th betting update is logged.
const BETTING_LOG_INTERVAL: u64 = 5;

// ============================================================================
// RunSummary
// ============================================================================

/// Totals reported when a session stops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Broadcast snapshots decoded.
    pub snapshots: u64,
    /// Broadcast payloads that failed to decode.
    pub discarded_payloads: u64,
    /// Successful reconnects.
    pub reconnects: u32,
    /// Records the sink failed to store.
    pub persist_failures: u64,
    /// Statistics over every finalized round.
    pub statistics: RoundStatistics,
}

impl RunSummary {
    /// Rounds finalized during the session.
    #[inline]
    #[must_use]
    pub fn rounds_recorded(&self) -> usize {
        self.statistics.rounds
    }
}

// ============================================================================
// FeedSession
// ============================================================================

/// One feed session: connection, aggregation and persistence.
pub struct FeedSession<C: Connector, S: TokenSource, K: RecordSink> {
    lifecycle: Lifecycle<C, S>,
    engine: RoundEngine,
    sink: K,
    cancel: CancellationToken,
    summary: RunSummary,
    betting_updates: u64,
}

impl<C: Connector, S: TokenSource, K: RecordSink> FeedSession<C, S, K> {
    /// Creates a session. The stop signal is the lifecycle's.
    #[must_use]
    pub fn new(lifecycle: Lifecycle<C, S>, sink: K) -> Self {
        let cancel = lifecycle.cancel_token().clone();
        Self {
            lifecycle,
            engine: RoundEngine::new(),
            sink,
            cancel,
            summary: RunSummary::default(),
            betting_updates: 0,
        }
    }

    /// The aggregation engine.
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &RoundEngine {
        &self.engine
    }

    /// The record sink.
    #[inline]
    #[must_use]
    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// The connection lifecycle.
    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle<C, S> {
        &self.lifecycle
    }

    /// Totals so far.
    #[inline]
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Connects and processes the feed until stopped.
    ///
    /// Transport failures trigger a reconnect once the frames read before
    /// the failure are processed. Sink failures are logged and counted but
    /// never stop the loop.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectFailed`] if the initial connect fails and
    /// [`Error::ReconnectExhausted`] once reconnecting gives up. A stop
    /// signal ends the run with `Ok`.
    pub async fn run(&mut self) -> Result<RunSummary> {
        match self.lifecycle.connect().await {
            Ok(()) => {}
            Err(Error::Cancelled) => return Ok(self.finish().await),
            Err(e) => return Err(e),
        }

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let received = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                received = self.lifecycle.receive_next() => received,
            };

            match received {
                Ok(Some(frame)) => self.handle_frame(frame),
                Ok(None) => {}
                Err(e) if e.is_transport_failure() => {
                    warn!(error = %e, "Feed connection lost");
                    for frame in self.lifecycle.take_buffered() {
                        self.handle_frame(frame);
                    }
                    match self.lifecycle.reconnect().await {
                        Ok(()) => self.summary.reconnects += 1,
                        Err(Error::Cancelled) => break,
                        Err(e) => {
                            error!(error = %e, "Feed stopped");
                            log_statistics(&self.summary.statistics);
                            return Err(e);
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Unrecoverable feed error");
                    self.lifecycle.shutdown().await;
                    return Err(e);
                }
            }
        }

        Ok(self.finish().await)
    }

    /// Routes one frame. Only broadcast publishes reach the engine.
    fn handle_frame(&mut self, frame: Frame) {
        let (topic, payload) = match frame {
            Frame::Publish { topic, payload } => (topic, payload),
            other => {
                trace!(kind = ?other.kind(), "Non-publish frame ignored");
                return;
            }
        };

        if topic != self.lifecycle.config().broadcast_topic {
            trace!(%topic, len = payload.len(), "Identity topic message ignored");
            return;
        }

        let snapshot = match RoundSnapshot::from_payload(&payload, OffsetDateTime::now_utc()) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return,
            Err(e) => {
                debug!(error = %e, len = payload.len(), "Broadcast payload discarded");
                self.summary.discarded_payloads += 1;
                return;
            }
        };

        self.ingest(&snapshot);
    }

    /// Folds one snapshot and records the result, if any.
    fn ingest(&mut self, snapshot: &RoundSnapshot) {
        self.summary.snapshots += 1;

        let previous_round = self.engine.round_number();
        let record = self.engine.ingest(snapshot);

        if self.engine.round_number() != previous_round {
            info!(round = self.engine.round_number(), "New round started");
        }
        if snapshot.game_state == GameState::Betting {
            self.betting_updates += 1;
            if self.betting_updates % BETTING_LOG_INTERVAL == 0 {
                debug!(total = snapshot.total_real_stake(), "Betting update");
            }
        }

        if let Some(record) = record {
            self.record(&record);
        }
    }

    fn record(&mut self, record: &RoundRecord) {
        self.summary.statistics.observe(record);
        log_round(record);
        log_statistics(&self.summary.statistics);

        if let Err(e) = self.sink.append(record) {
            warn!(round = record.round_number, error = %e, "Failed to persist round");
            self.summary.persist_failures += 1;
        }
    }

    async fn finish(&mut self) -> RunSummary {
        self.lifecycle.shutdown().await;
        info!(
            rounds = self.summary.rounds_recorded(),
            snapshots = self.summary.snapshots,
            reconnects = self.summary.reconnects,
            "Feed session stopped"
        );
        self.summary.clone()
    }
}

// ============================================================================
// Reporting
// ============================================================================

fn log_round(record: &RoundRecord) {
    let odds = record.odds();
    info!(
        round = record.round_number,
        fingerprint = %record.fingerprint,
        winner = %record.winner.label,
        bets_a = record.bets.a,
        bets_b = record.bets.b,
        bets_c = record.bets.c,
        points = ?record.points,
        total_staked = record.total_staked,
        payout = record.payout,
        highest = record.betting_pattern.by_real_stake.highest.label(),
        lowest = record.betting_pattern.by_real_stake.lowest.label(),
        house_take = record.house_edge.amount,
        house_edge_pct = format_args!("{:.2}", record.house_edge.percentage),
        expected_payout = format_args!("{:.0}", odds.expected_payout),
        "Round finalized"
    );
    debug!(
        round = record.round_number,
        hand_a = ?record.hand(OptionId::A),
        hand_b = ?record.hand(OptionId::B),
        hand_c = ?record.hand(OptionId::C),
        "Hands dealt"
    );
    if let Some(margin) = odds.house_margin_percent {
        debug!(round = record.round_number, margin_pct = format_args!("{margin:.2}"), "Payout against 2.98x odds");
    }
}

fn log_statistics(stats: &RoundStatistics) {
    if stats.rounds == 0 {
        return;
    }
    info!(
        rounds = stats.rounds,
        winners = ?stats.winners,
        winner_highest_pct = format_args!("{:.1}", stats.share(stats.winner_highest)),
        winner_medium_pct = format_args!("{:.1}", stats.share(stats.winner_medium)),
        winner_lowest_pct = format_args!("{:.1}", stats.share(stats.winner_lowest)),
        total_staked = stats.total_staked,
        house_take = stats.total_house_take,
        house_edge_pct = format_args!("{:.2}", stats.overall_edge_percent()),
        "Session statistics"
    );
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::config::FeedConfig;
    use crate::protocol::encode_publish;
    use crate::transport::StaticToken;
    use crate::transport::mock::{MockConnector, Peer, Step};

    type Session = FeedSession<MockConnector, StaticToken, Vec<RoundRecord>>;

    fn broadcast(value: serde_json::Value) -> Step {
        let payload = serde_json::to_vec(&value).expect("serialize");
        Step::Frame(encode_publish("goldenflower/broadcast", &payload).expect("publish"))
    }

    fn betting() -> Step {
        broadcast(json!({
            "action": "updateSysInfo",
            "sys_info": {
                "gameState": 1,
                "bet_info": {"0": {"pay_amount": 100}, "1": {"pay_amount": 50}, "2": {"pay_amount": 10}}
            }
        }))
    }

    fn settled(first_card: i64) -> Step {
        broadcast(json!({
            "action": "updateSysInfo",
            "sys_info": {
                "gameState": 0,
                "bet_id": 0,
                "award_amount": 298,
                "bet_info": {"0": {"pay_amount": 100}, "1": {"pay_amount": 50}, "2": {"pay_amount": 10}},
                "result_pk_num1": first_card, "result_pk_num2": 2, "result_pk_num3": 3,
                "result_pk_num4": 4, "result_pk_num5": 5, "result_pk_num6": 6,
                "result_point_0": 8, "result_point_1": 5, "result_point_2": 3
            }
        }))
    }

    fn session(connector: MockConnector, config: FeedConfig) -> (Session, CancellationToken) {
        let cancel = CancellationToken::new();
        let lifecycle = Lifecycle::new(config, connector, StaticToken::new("tok"), cancel.clone());
        (FeedSession::new(lifecycle, Vec::new()), cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_each_round_once() {
        let connector = MockConnector::new();
        connector.accept(
            Peer::new()
                .then(betting())
                .then(settled(1))
                .then(settled(1))
                .then(settled(1))
                .then(betting())
                .then(settled(9))
                .then(Step::Close),
        );
        let config = FeedConfig::default().with_max_reconnect_attempts(1);
        let (mut session, _cancel) = session(connector, config);

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, Error::ReconnectExhausted { .. }));

        let records = session.sink();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].round_number, 0);
        assert_eq!(records[1].round_number, 1);
        assert_eq!(records[0].house_edge.amount, -138);
        assert_eq!(session.summary().snapshots, 6);
        assert_eq!(session.summary().rounds_recorded(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignores_identity_topics_and_other_actions() {
        let connector = MockConnector::new();
        let identity = encode_publish("goldenflower/7", br#"{"action":"updateSysInfo"}"#).expect("publish");
        connector.accept(
            Peer::new()
                .then(Step::Frame(identity))
                .then(broadcast(json!({"action": "chat"})))
                .then(Step::Frame(encode_publish("goldenflower/broadcast", b"{oops").expect("publish")))
                .then(Step::Close),
        );
        let config = FeedConfig::default().with_uid(7).with_max_reconnect_attempts(1);
        let (mut session, _cancel) = session(connector, config);

        assert!(session.run().await.is_err());
        assert_eq!(session.summary().snapshots, 0);
        assert_eq!(session.summary().discarded_payloads, 1);
        assert!(session.sink().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_keeps_engine_state() {
        let connector = MockConnector::new();
        connector.accept(Peer::new().then(settled(1)).then(Step::Close));
        connector.accept(Peer::new().then(settled(1)).then(settled(2)).then(Step::Close));
        let config = FeedConfig::default().with_max_reconnect_attempts(1);
        let (mut session, _cancel) = session(connector, config);

        assert!(session.run().await.is_err());
        assert_eq!(session.sink().len(), 2);
        assert_eq!(session.summary().reconnects, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_signal_returns_summary() {
        let connector = MockConnector::new();
        connector.accept(Peer::new().then(betting()).then(settled(1)));
        let (mut session, cancel) = session(connector, FeedConfig::default());

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(10)).await;
            cancel.cancel();
        });
        let summary = session.run().await.expect("run");
        stopper.await.expect("join");

        assert_eq!(summary.rounds_recorded(), 1);
        assert_eq!(summary.reconnects, 0);
        assert_eq!(
            session.lifecycle().state(),
            crate::transport::ConnectionState::Disconnected
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_connect() {
        let connector = MockConnector::new();
        connector.accept(Peer::new());
        let (mut session, cancel) = session(connector.clone(), FeedConfig::default());
        cancel.cancel();

        let summary = session.run().await.expect("run");
        assert_eq!(summary.rounds_recorded(), 0);
        assert_eq!(connector.open_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_propagates() {
        let (mut session, _cancel) = session(MockConnector::new(), FeedConfig::default());
        let err = session.run().await.unwrap_err();
        assert!(matches!(err, Error::ConnectFailed { attempts: 3, .. }));
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn append(&mut self, _record: &RoundRecord) -> Result<()> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_does_not_stop_loop() {
        let connector = MockConnector::new();
        connector.accept(Peer::new().then(settled(1)).then(settled(2)).then(Step::Close));
        let cancel = CancellationToken::new();
        let lifecycle = Lifecycle::new(
            FeedConfig::default().with_max_reconnect_attempts(1),
            connector,
            StaticToken::new("tok"),
            cancel,
        );
        let mut session = FeedSession::new(lifecycle, FailingSink);

        assert!(session.run().await.is_err());
        assert_eq!(session.summary().persist_failures, 2);
        assert_eq!(session.summary().rounds_recorded(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_read_during_keepalive_are_recorded() {
        let connector = MockConnector::new();
        let peer = (0..30).fold(Peer::new().without_ping_replies(), |peer, _| {
            peer.then(Step::Idle)
        });
        connector.accept(peer.then(settled(1)));
        let config = FeedConfig::default().with_max_reconnect_attempts(1);
        let (mut session, _cancel) = session(connector, config);

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, Error::ReconnectExhausted { .. }));
        assert_eq!(session.summary().snapshots, 1);
        assert_eq!(session.sink().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_connecting() {
        let connector = MockConnector::new();
        connector.hang();
        let (mut session, cancel) = session(connector.clone(), FeedConfig::default());

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            cancel.cancel();
        });
        let summary = session.run().await.expect("run");
        stopper.await.expect("join");

        assert_eq!(summary.rounds_recorded(), 0);
        assert_eq!(connector.open_count(), 1);
        assert_eq!(
            session.lifecycle().state(),
            crate::transport::ConnectionState::Disconnected
        );
    }
}
