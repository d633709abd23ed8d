use super::*;
use std::sync::Mutex;

use crate::state::test_helpers;
#[cfg(feature = "live-db-tests")]
use crate::state::test_helpers::{integration_pool, seed_rider};

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<QueuedWrite>>,
}

#[async_trait]
impl WriteSink for RecordingSink {
    async fn insert(&self, write: &QueuedWrite) -> Result<(), SinkError> {
        self.seen.lock().unwrap().push(write.clone());
        if write.table == "sessions" { Ok(()) } else { Err(SinkError::Rejected("no".into())) }
    }
}

fn queued(table: &str, rider_id: Uuid) -> QueuedWrite {
    QueuedWrite { id: Uuid::new_v4(), rider_id, table: table.into(), payload: serde_json::json!({}) }
}

// =============================================================================
// error mapping
// =============================================================================

#[test]
fn connection_failures_are_unavailable() {
    let io = sqlx::Error::Io(std::io::Error::other("connection refused"));
    assert!(matches!(database_error(&io), SinkError::Unavailable(_)));
    assert!(matches!(database_error(&sqlx::Error::PoolTimedOut), SinkError::Unavailable(_)));
}

#[test]
fn statement_failures_are_rejected() {
    assert!(matches!(database_error(&sqlx::Error::RowNotFound), SinkError::Rejected(_)));
}

#[test]
fn service_errors_map_to_sink_errors() {
    assert!(matches!(SinkError::from(bike::BikeError::Invalid("brand")), SinkError::InvalidPayload(_)));
    assert!(matches!(SinkError::from(circuit::CircuitError::NotFound(Uuid::nil())), SinkError::Rejected(_)));
    assert!(matches!(
        SinkError::from(track_day::TrackDayError::Database(sqlx::Error::PoolClosed)),
        SinkError::Unavailable(_)
    ));
    assert!(matches!(
        SinkError::from(track_session::SessionError::NumberContention),
        SinkError::Unavailable(_)
    ));
    assert!(matches!(
        SinkError::from(track_session::SessionError::TrackDayNotFound(Uuid::nil())),
        SinkError::Rejected(_)
    ));
    assert!(matches!(SinkError::from(preferences::PreferencesError::Invalid("range")), SinkError::Rejected(_)));
}

#[test]
fn decode_reports_bad_payloads() {
    let write = QueuedWrite {
        id: Uuid::nil(),
        rider_id: Uuid::nil(),
        table: "bikes".into(),
        payload: serde_json::json!({ "brand": 7 }),
    };
    assert!(matches!(decode::<bike::BikeInput>(&write), Err(SinkError::InvalidPayload(_))));
}

#[test]
fn decode_accepts_session_payload() {
    let write = QueuedWrite {
        id: Uuid::nil(),
        rider_id: Uuid::nil(),
        table: "sessions".into(),
        payload: serde_json::json!({ "track_day_id": Uuid::nil(), "lap_times": ["1:50.100"] }),
    };
    let input = decode::<track_session::SessionInput>(&write).unwrap();
    assert_eq!(input.lap_times, vec!["1:50.100"]);
}

// =============================================================================
// sink / replay
// =============================================================================

#[tokio::test]
async fn unknown_table_is_refused_before_touching_the_database() {
    let state = test_helpers::test_app_state();
    let sink = PgWriteSink::new(state.pool.clone());
    let result = sink.insert(&queued("riders", Uuid::nil())).await;
    assert!(matches!(result, Err(SinkError::UnknownTable(t)) if t == "riders"));
}

#[tokio::test]
async fn replay_attributes_writes_to_authenticated_rider() {
    let sink = RecordingSink::default();
    let rider = Uuid::new_v4();
    let writes = vec![queued("sessions", Uuid::new_v4()), queued("bikes", Uuid::new_v4())];
    let failed_id = writes[1].id;

    let report = replay_batch(&sink, rider, writes).await.unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.pending_ids, vec![failed_id]);
    assert!(sink.seen.lock().unwrap().iter().all(|w| w.rider_id == rider));
}

#[tokio::test]
async fn empty_batch_replays_nothing() {
    let sink = RecordingSink::default();
    let report = replay_batch(&sink, Uuid::new_v4(), Vec::new()).await.unwrap();
    assert_eq!(report, DrainReport::default());
    assert!(sink.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn defer_write_queues_under_given_id() {
    let state = test_helpers::test_app_state();
    let id = Uuid::new_v4();
    let rider = Uuid::new_v4();
    let input = serde_json::json!({ "name": "Mugello" });

    let queued_id = defer_write(&state, rider, id, "circuits", &input).await.unwrap();

    assert_eq!(queued_id, id);
    let pending = state.outbox.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].rider_id, rider);
    assert_eq!(pending[0].table, "circuits");
    assert_eq!(pending[0].payload, input);
}

#[tokio::test]
async fn drain_with_empty_outbox_is_skipped() {
    let state = test_helpers::test_app_state();
    let sink = RecordingSink::default();
    assert!(drain_server_outbox(&state, &sink).await.is_none());
    assert!(sink.seen.lock().unwrap().is_empty());
}

// =============================================================================
// LIVE DATABASE
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn replaying_a_batch_twice_lands_each_write_once() {
    let pool = integration_pool().await;
    let rider = seed_rider(&pool).await;
    let sink = PgWriteSink::new(pool.clone());

    let circuit = QueuedWrite {
        id: Uuid::new_v4(),
        rider_id: rider,
        table: "circuits".into(),
        payload: serde_json::json!({ "name": "Vallelunga" }),
    };
    let day = QueuedWrite {
        id: Uuid::new_v4(),
        rider_id: rider,
        table: "track_days".into(),
        payload: serde_json::json!({ "date": "2024-05-12", "circuit_id": circuit.id }),
    };
    let session = QueuedWrite {
        id: Uuid::new_v4(),
        rider_id: rider,
        table: "sessions".into(),
        payload: serde_json::json!({ "track_day_id": day.id, "lap_times": ["1:41.200", "1:40.900"] }),
    };
    let batch = vec![circuit, day, session.clone()];

    let first = replay_batch(&sink, rider, batch.clone()).await.expect("first replay");
    let second = replay_batch(&sink, rider, batch).await.expect("second replay");
    assert_eq!(first.succeeded, 3);
    assert_eq!(second.succeeded, 3);

    let sessions = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions WHERE rider_id = $1")
        .bind(rider)
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(sessions, 1);

    let stored = track_session::get_session(&pool, rider, session.id).await.expect("session by queued id");
    assert_eq!(stored.session_number, 1);
    assert_eq!(stored.best_lap.as_deref(), Some("1:40.900"));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL/live Postgres"]
async fn write_applied_for_one_rider_is_not_skipped_for_another() {
    let pool = integration_pool().await;
    let owner = seed_rider(&pool).await;
    let other = seed_rider(&pool).await;
    let sink = PgWriteSink::new(pool.clone());

    let circuit = QueuedWrite {
        id: Uuid::new_v4(),
        rider_id: owner,
        table: "circuits".into(),
        payload: serde_json::json!({ "name": "Misano" }),
    };
    let first = replay_batch(&sink, owner, vec![circuit.clone()]).await.expect("owner replay");
    assert_eq!(first.succeeded, 1);

    let second = replay_batch(&sink, other, vec![circuit.clone()]).await.expect("other replay");
    assert_eq!(second.succeeded, 0);
    assert_eq!(second.pending_ids, vec![circuit.id]);

    let others = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM circuits WHERE rider_id = $1")
        .bind(other)
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(others, 0);
}
