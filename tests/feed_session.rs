//! End-to-end run of a feed session against an in-process broker.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use round_tracker::protocol::{
    Frame, PING_RESPONSE, decode_frame, encode_connect_ack, encode_publish, encode_subscribe_ack,
};
use round_tracker::transport::{Connector, StaticToken, Transport};
use round_tracker::round::Winner;
use round_tracker::{Error, FeedConfig, FeedSession, JsonFileStore, Lifecycle, Result};

const TOPIC: &str = "goldenflower/broadcast";

/// Accepts one connection per script, then refuses.
struct ScriptedBroker {
    scripts: Mutex<VecDeque<Vec<Vec<u8>>>>,
}

impl ScriptedBroker {
    fn new(scripts: Vec<Vec<Vec<u8>>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
        }
    }
}

#[async_trait]
impl Connector for ScriptedBroker {
    type Transport = BrokerStream;

    async fn open(&self) -> Result<BrokerStream> {
        match self.scripts.lock().pop_front() {
            Some(script) => Ok(BrokerStream {
                replies: VecDeque::new(),
                script: script.into(),
            }),
            None => Err(Error::connection("broker offline")),
        }
    }
}

struct BrokerStream {
    replies: VecDeque<Vec<u8>>,
    script: VecDeque<Vec<u8>>,
}

#[async_trait]
impl Transport for BrokerStream {
    async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<()> {
        match decode_frame(&bytes) {
            Some(Frame::Connect { .. }) => self.replies.push_back(encode_connect_ack(0)),
            Some(Frame::Subscribe { packet_id, .. }) => {
                self.replies.push_back(encode_subscribe_ack(packet_id));
            }
            Some(Frame::PingRequest) => self.replies.push_back(PING_RESPONSE.to_vec()),
            _ => {}
        }
        Ok(())
    }

    async fn recv_binary(&mut self, _wait: Duration) -> Result<Option<Vec<u8>>> {
        if let Some(reply) = self.replies.pop_front() {
            return Ok(Some(reply));
        }
        self.script.pop_front().map(Some).ok_or(Error::ConnectionClosed)
    }

    async fn close(&mut self) {}
}

fn broadcast(state: i64, first_card: i64, winner: i64) -> anyhow::Result<Vec<u8>> {
    let payload = serde_json::to_vec(&json!({
        "action": "updateSysInfo",
        "sys_info": {
            "gameState": state,
            "bet_id": winner,
            "award_amount": 600,
            "bet_info": {
                "0": {"pay_amount": 100, "bean_pay_amount": 7},
                "1": {"pay_amount": 300},
                "2": {"pay_amount": 200}
            },
            "result_pk_num1": first_card, "result_pk_num2": 20, "result_pk_num3": 30,
            "result_point_0": 1, "result_point_1": 9, "result_point_2": 4
        }
    }))?;
    Ok(encode_publish(TOPIC, &payload)?)
}

#[tokio::test(start_paused = true)]
async fn rounds_survive_a_reconnect_and_land_on_disk() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("results.json");

    let broker = ScriptedBroker::new(vec![
        vec![broadcast(1, 0, -1)?, broadcast(0, 11, 1)?, broadcast(0, 11, 1)?],
        vec![broadcast(0, 11, 1)?, broadcast(1, 0, -1)?, broadcast(0, 12, 2)?],
    ]);
    let config = FeedConfig::default()
        .with_reconnect_base_delay(Duration::from_secs(1))
        .with_max_reconnect_attempts(1);
    let lifecycle = Lifecycle::new(
        config,
        broker,
        StaticToken::new("token"),
        CancellationToken::new(),
    );
    let mut session = FeedSession::new(lifecycle, JsonFileStore::new(&path));

    let err = session.run().await.expect_err("broker goes offline");
    assert!(matches!(err, Error::ReconnectExhausted { .. }));
    assert_eq!(session.summary().reconnects, 1);
    assert_eq!(session.summary().snapshots, 6);

    let records = JsonFileStore::new(&path).load()?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].winner, Winner::from_wire(1));
    assert_eq!(records[0].total_staked, 600);
    assert_eq!(records[0].house_edge.amount, 0);
    assert_eq!(records[1].round_number, records[0].round_number + 1);
    assert_ne!(records[0].fingerprint, records[1].fingerprint);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn existing_results_are_kept() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("results.json");

    for first_card in [5, 6] {
        let broker = ScriptedBroker::new(vec![vec![broadcast(0, first_card, 0)?]]);
        let config = FeedConfig::default().with_max_reconnect_attempts(0);
        let lifecycle = Lifecycle::new(
            config,
            broker,
            StaticToken::new("token"),
            CancellationToken::new(),
        );
        let mut session = FeedSession::new(lifecycle, JsonFileStore::new(&path));
        assert!(session.run().await.is_err());
    }

    let records = JsonFileStore::new(&path).load()?;
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.round_number == 0));
    Ok(())
}
