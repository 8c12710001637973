//! End-to-end session scenarios: the dispatch layer's view of one client
//! from first contact through failover and teardown.

use std::sync::Arc;

use bytes::Bytes;
use mds_session::{
    CapId, ClientId, ConnectionHandle, Ino, Limits, PushSeq, SessionState, SessionTable, Tid,
};

type Work = &'static str;

fn table() -> SessionTable<Work> {
    SessionTable::new(Limits::default())
}

#[test]
fn open_handshake_delivers_queued_messages() {
    let mut table = table();
    let client = ClientId::new(100);

    let session = table.get_or_create(client).expect("create");
    assert!(session.is_closed());

    // messages produced before the transport exists are queued
    session.queue_preopen_message(Bytes::from("cap-grant-1"));
    session.queue_preopen_message(Bytes::from("cap-grant-2"));

    session.set_state(SessionState::Opening);
    session.set_state(SessionState::Open);
    assert_eq!(session.state_seq().get(), 2);

    session.set_connection(Arc::new(ConnectionHandle::new("172.16.0.9:6800")));
    let backlog = session.drain_preopen_queue();
    assert_eq!(
        backlog.iter().collect::<Vec<_>>(),
        vec![&Bytes::from("cap-grant-1"), &Bytes::from("cap-grant-2")]
    );
    assert_eq!(session.preopen_queue_len(), 0);
}

#[test]
fn flush_acks_release_work_in_push_order() {
    let mut table = table();
    let session = table.get_or_create(ClientId::new(101)).expect("create");
    session.set_state(SessionState::Opening);
    session.set_state(SessionState::Open);

    assert_eq!(session.wait_for_flush("journal-open"), PushSeq::ZERO);
    assert_eq!(session.inc_push_seq(), PushSeq::new(1));
    assert_eq!(session.wait_for_flush("unlock-inode"), PushSeq::new(1));
    assert_eq!(session.inc_push_seq(), PushSeq::new(2));
    assert_eq!(session.wait_for_flush("reply-client"), PushSeq::new(2));

    let mut batch = Vec::new();
    session.finish_flush(PushSeq::new(1), &mut batch);
    assert_eq!(batch, vec!["journal-open", "unlock-inode"]);
    assert_eq!(session.pending_flush_len(), 1);

    let mut rest = Vec::new();
    session.finish_flush(PushSeq::new(2), &mut rest);
    assert_eq!(rest, vec!["reply-client"]);
    assert_eq!(session.pending_flush_len(), 0);
}

#[test]
fn replayed_request_is_answered_from_the_ledger() {
    let mut table = table();
    let session = table.get_or_create(ClientId::new(102)).expect("create");
    session.set_state(SessionState::Opening);
    session.set_state(SessionState::Open);

    session.reserve_prealloc(Ino::new(0x400), 16);
    session.commit_prealloc();

    // first execution of the create
    let tid = Tid::new(77);
    assert!(session.have_completed_request(tid).is_none());
    let created = session.take_ino(None);
    session.add_completed_request(tid, Some(created));

    // the retry short-circuits with the recorded outcome
    assert_eq!(session.have_completed_request(tid), Some(Some(created)));

    // client will never retry below tid 78
    session.trim_completed_requests(Tid::new(78));
    assert!(session.have_completed_request(tid).is_none());
}

#[test]
fn failover_reopen_restores_durable_identity() {
    let mut pre_failover = table();
    let client = ClientId::new(103);
    let record = {
        let session = pre_failover.get_or_create(client).expect("create");
        session.set_client_metadata([
            ("hostname".to_string(), "compute-12".to_string()),
            ("entity_id".to_string(), "fuse-3".to_string()),
        ]);
        session.set_state(SessionState::Opening);
        session.set_state(SessionState::Open);
        session.reserve_prealloc(Ino::new(0x800), 8);
        session.commit_prealloc();
        let ino = session.take_ino(Some(Ino::new(0x803)));
        session.add_completed_request(Tid::new(5), Some(ino));
        session.encode_record().expect("encode")
    };

    // rank failover: the table is rebuilt and the journal replays the record
    let session = pre_failover.remove(client).expect("remove");
    assert!(session.is_open());
    drop(session);

    let mut table = table();
    let session = table.get_or_create(client).expect("recreate");
    session.decode_record(&record).expect("decode");

    assert_eq!(session.human_name(), "compute-12:fuse-3");
    assert_eq!(
        session.have_completed_request(Tid::new(5)),
        Some(Some(Ino::new(0x803)))
    );
    assert_eq!(session.get_num_projected_prealloc_inos(), 7);
    assert!(session.info().used_inos.contains(Ino::new(0x803)));
    assert!(session.next_ino().is_some());
}

#[test]
fn stale_session_recovers_or_dies() {
    let mut table = table();
    let client = ClientId::new(104);
    let session = table.get_or_create(client).expect("create");
    session.set_state(SessionState::Opening);
    session.set_state(SessionState::Open);

    // renewal missed: the dispatch layer stales the session
    session.set_state(SessionState::Stale);
    let seq_at_stale = session.state_seq();
    assert!(session.is_stale());

    // a late renewal revives it
    session.set_state(SessionState::Open);
    session.touch_cap_renew(30_000);
    assert!(session.state_seq() > seq_at_stale);

    // second staleness is terminal this time
    session.set_state(SessionState::Stale);
    session.set_state(SessionState::Killing);
    session.clear_connection();

    // pending flush work is drained before destruction
    session.wait_for_flush("late-journal");
    let seq = session.push_seq();
    let mut pending = Vec::new();
    session.finish_flush(seq, &mut pending);
    assert_eq!(pending, vec!["late-journal"]);

    let session = table.remove(client).expect("remove");
    assert!(session.is_killing());
}

#[test]
fn recall_cycle_tracks_cold_cap_eviction() {
    let mut table = table();
    let session = table.get_or_create(ClientId::new(105)).expect("create");
    session.set_state(SessionState::Opening);
    session.set_state(SessionState::Open);

    for id in 1..=5u64 {
        session.add_cap(CapId::new(id));
    }
    session.touch_cap(CapId::new(2));
    session.touch_cap(CapId::new(4));

    // eviction scans from the cold end: untouched grants first
    let eviction_order: Vec<CapId> = session.caps().iter_lru().collect();
    assert_eq!(
        eviction_order,
        vec![
            CapId::new(5),
            CapId::new(3),
            CapId::new(1),
            CapId::new(2),
            CapId::new(4)
        ]
    );

    session.notify_recall_sent(2, 60_000);
    assert_eq!(session.recall().recall_count(), 3);

    // the client complies in two steps
    session.notify_cap_release(2);
    for cap in [CapId::new(5), CapId::new(3)] {
        assert!(session.remove_cap(cap));
    }
    assert!(session.recall().in_recall());

    session.notify_cap_release(1);
    assert!(session.remove_cap(CapId::new(1)));
    assert!(!session.recall().in_recall());
    assert_eq!(session.caps().len(), 2);
}

#[test]
fn importing_counter_survives_state_churn() {
    let mut table = table();
    let session = table.get_or_create(ClientId::new(106)).expect("create");

    session.inc_importing();
    session.set_state(SessionState::Opening);
    session.set_state(SessionState::Open);
    assert!(session.is_importing());
    assert!(table.any_importing());

    let session = table.get_mut(ClientId::new(106)).expect("session");
    session.dec_importing();
    assert!(!session.is_importing());
    assert!(!table.any_importing());
}
