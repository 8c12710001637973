//! One connected client's server-side session.
//!
//! The session is the unit of cache-coherence enforcement: it owns the
//! client's lifecycle state, the membership of its capability and lease
//! grants, the flush sequencing that orders asynchronous acknowledgements,
//! the idempotency ledger for retried requests, and the inode
//! preallocation accounting. All mutation is serialized by the dispatch
//! layer; nothing here blocks or performs I/O.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::{
    AuthCaps, CapId, ClientId, Ino, InoSet, LeaseId, LeaseSeq, Limits, PushSeq, RequestId,
    StateSeq, Tid,
};

use super::flush::FlushSequencer;
use super::info::{derive_human_name, RecordError, SessionInfo};
use super::mru::MruList;
use super::recall::RecallState;
use super::state::SessionState;

/// Opaque handle to the client's transport connection.
///
/// The session stores and clears this; it never interprets the transport's
/// protocol state.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: Uuid,
    peer: String,
}

impl ConnectionHandle {
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer: peer.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}

/// Server-side record of one connected client.
///
/// Generic over `W`, the pending-work item released by flush
/// acknowledgements; the embedding layer decides what a work item is and
/// how released batches run.
#[derive(Debug)]
pub struct Session<W> {
    state: SessionState,
    state_seq: StateSeq,
    importing_count: u32,
    human_name: String,

    info: SessionInfo,
    auth_caps: AuthCaps,

    connection: Option<Arc<ConnectionHandle>>,
    preopen_out_queue: VecDeque<Bytes>,
    active_requests: BTreeSet<RequestId>,

    pending_prealloc_inos: InoSet,

    flush: FlushSequencer<W>,
    caps: MruList<CapId>,
    leases: MruList<LeaseId>,
    lease_seq: LeaseSeq,
    last_cap_renew_ms: Option<u64>,

    recall: RecallState,
    limits: Limits,
}

impl<W> Session<W> {
    /// New session in `Closed` state, created by the dispatch layer on
    /// first contact.
    pub fn new(client: ClientId, limits: Limits) -> Self {
        let info = SessionInfo::new(client);
        let human_name = derive_human_name(client, &info.client_metadata);
        Self {
            state: SessionState::Closed,
            state_seq: StateSeq::ZERO,
            importing_count: 0,
            human_name,
            info,
            auth_caps: AuthCaps::default(),
            connection: None,
            preopen_out_queue: VecDeque::new(),
            active_requests: BTreeSet::new(),
            pending_prealloc_inos: InoSet::new(),
            flush: FlushSequencer::new(),
            caps: MruList::new(),
            leases: MruList::new(),
            lease_seq: LeaseSeq::ZERO,
            last_cap_renew_ms: None,
            recall: RecallState::new(),
            limits,
        }
    }

    // -- lifecycle --

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn state_seq(&self) -> StateSeq {
        self.state_seq
    }

    pub fn state_name(&self) -> &'static str {
        self.state.as_str()
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    pub fn is_opening(&self) -> bool {
        self.state == SessionState::Opening
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub fn is_closing(&self) -> bool {
        self.state == SessionState::Closing
    }

    pub fn is_stale(&self) -> bool {
        self.state == SessionState::Stale
    }

    pub fn is_killing(&self) -> bool {
        self.state == SessionState::Killing
    }

    /// Apply a state change driven by the protocol layer. Setting the
    /// current state again is a no-op that does not bump the state seq.
    /// Transition legality is the caller's contract; changes outside the
    /// protocol table are applied but logged.
    ///
    /// Returns whether the state actually changed.
    pub fn set_state(&mut self, new_state: SessionState) -> bool {
        if self.state == new_state {
            return false;
        }
        if !self.state.can_transition_to(new_state) {
            warn!(
                client = %self.info.client,
                from = %self.state,
                to = %new_state,
                "session state change outside protocol table"
            );
        }
        let old = self.state;
        self.state = new_state;
        self.state_seq = self.state_seq.next();
        debug!(
            client = %self.info.client,
            from = %old,
            to = %new_state,
            seq = self.state_seq.get(),
            "session state change"
        );
        true
    }

    pub fn inc_importing(&mut self) {
        self.importing_count += 1;
    }

    /// # Panics
    /// If no subtree import is in progress (contract violation).
    pub fn dec_importing(&mut self) {
        assert!(self.importing_count > 0, "importing count underflow");
        self.importing_count -= 1;
    }

    pub fn is_importing(&self) -> bool {
        self.importing_count > 0
    }

    // -- identity & durable state --

    pub fn client(&self) -> ClientId {
        self.info.client
    }

    /// Friendly display name derived from client metadata; soft state only.
    pub fn human_name(&self) -> &str {
        &self.human_name
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Replace the client-supplied metadata and re-derive the display name.
    pub fn set_client_metadata(
        &mut self,
        metadata: impl IntoIterator<Item = (String, String)>,
    ) {
        self.info.client_metadata = metadata.into_iter().collect();
        self.human_name = derive_human_name(self.info.client, &self.info.client_metadata);
    }

    pub fn client_metadata(&self) -> &std::collections::BTreeMap<String, String> {
        &self.info.client_metadata
    }

    /// Populate durable state from an encoded record (session re-open
    /// after reconnect or failover) and re-derive the display name.
    /// Decoding the same record twice leaves the session unchanged.
    pub fn decode_record(&mut self, bytes: &[u8]) -> Result<(), RecordError> {
        self.info = SessionInfo::from_record_bytes(bytes)?;
        self.human_name = derive_human_name(self.info.client, &self.info.client_metadata);
        Ok(())
    }

    pub fn encode_record(&self) -> Result<Vec<u8>, RecordError> {
        self.info.to_record_bytes()
    }

    pub fn set_auth_caps(&mut self, caps: AuthCaps) {
        self.auth_caps = caps;
    }

    pub fn auth_caps(&self) -> &AuthCaps {
        &self.auth_caps
    }

    /// Reset the durable identity while the connection identity persists:
    /// pending preallocations, durable ino accounting, the idempotency
    /// ledger, the push sequence, and the renew stamp. State and
    /// membership lists are untouched.
    pub fn clear(&mut self) {
        self.pending_prealloc_inos.clear();
        self.info.clear_meta();
        self.flush.reset();
        self.last_cap_renew_ms = None;
        debug!(client = %self.info.client, "session durable identity cleared");
    }

    // -- connection & preopen queue --

    pub fn set_connection(&mut self, connection: Arc<ConnectionHandle>) {
        self.connection = Some(connection);
    }

    /// Drop the transport handle (network loss). Returns the old handle so
    /// the caller can tear it down.
    pub fn clear_connection(&mut self) -> Option<Arc<ConnectionHandle>> {
        self.connection.take()
    }

    pub fn connection(&self) -> Option<&Arc<ConnectionHandle>> {
        self.connection.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Queue an outbound message while the client has no connection. The
    /// queue is bounded; overflow drops the oldest message.
    pub fn queue_preopen_message(&mut self, message: Bytes) {
        if self.preopen_out_queue.len() >= self.limits.max_preopen_messages {
            self.preopen_out_queue.pop_front();
            warn!(
                client = %self.info.client,
                max = self.limits.max_preopen_messages,
                "preopen queue full, dropping oldest message"
            );
        }
        self.preopen_out_queue.push_back(message);
    }

    /// Take every queued preopen message, in queueing order, for delivery
    /// on the freshly attached connection.
    pub fn drain_preopen_queue(&mut self) -> VecDeque<Bytes> {
        std::mem::take(&mut self.preopen_out_queue)
    }

    pub fn preopen_queue_len(&self) -> usize {
        self.preopen_out_queue.len()
    }

    // -- in-flight requests --

    pub fn register_request(&mut self, request: RequestId) -> bool {
        self.active_requests.insert(request)
    }

    pub fn unregister_request(&mut self, request: RequestId) -> bool {
        self.active_requests.remove(&request)
    }

    pub fn request_count(&self) -> usize {
        self.active_requests.len()
    }

    // -- inode preallocation --

    /// First available preallocated ino without consuming it.
    pub fn next_ino(&self) -> Option<Ino> {
        self.info.prealloc_inos.first()
    }

    /// Consume one preallocated ino, moving it into the used set.
    ///
    /// If `hint` names an ino that is present in the pool, that ino is
    /// consumed. If the hint is absent from the pool (or `None`), the
    /// first available ino is consumed instead — the caller's preference
    /// is silently ignored, so callers that require a specific ino must
    /// check `info().prealloc_inos` themselves first.
    ///
    /// # Panics
    /// If the pool is empty (contract violation; gate on
    /// `get_num_projected_prealloc_inos` / `next_ino`).
    pub fn take_ino(&mut self, hint: Option<Ino>) -> Ino {
        assert!(
            !self.info.prealloc_inos.is_empty(),
            "take_ino on an empty prealloc pool"
        );
        let ino = match hint {
            Some(requested) if self.info.prealloc_inos.erase(requested) => requested,
            _ => {
                let first = self
                    .info
                    .prealloc_inos
                    .first()
                    .expect("pool checked non-empty");
                self.info.prealloc_inos.erase(first);
                first
            }
        };
        self.info.used_inos.insert(ino);
        ino
    }

    /// Reserve a freshly granted ino range; it joins the durable pool only
    /// once the grant's journal write commits.
    pub fn reserve_prealloc(&mut self, start: Ino, len: u64) {
        self.pending_prealloc_inos.insert_span(start, len);
    }

    /// Journal commit for reserved inos: merge the pending set into the
    /// durable pool.
    pub fn commit_prealloc(&mut self) {
        self.info.prealloc_inos.insert_all(&self.pending_prealloc_inos);
        self.pending_prealloc_inos.clear();
    }

    pub fn pending_prealloc_inos(&self) -> &InoSet {
        &self.pending_prealloc_inos
    }

    /// Durable plus pending pool size; the allocator tops the session up
    /// before this runs dry.
    pub fn get_num_projected_prealloc_inos(&self) -> u64 {
        self.info.prealloc_inos.count() + self.pending_prealloc_inos.count()
    }

    pub fn wants_prealloc(&self) -> bool {
        self.get_num_projected_prealloc_inos() < self.limits.prealloc_low_water
    }

    // -- idempotency --

    pub fn add_completed_request(&mut self, tid: Tid, created: Option<Ino>) {
        self.info.completed_requests.insert(tid, created);
        self.info
            .completed_requests
            .evict_to(self.limits.max_completed_requests);
    }

    /// `Some(created)` when `tid` already completed; `None` signals
    /// first-time execution.
    pub fn have_completed_request(&self, tid: Tid) -> Option<Option<Ino>> {
        self.info.completed_requests.get(tid)
    }

    pub fn trim_completed_requests(&mut self, min_tid: Tid) {
        self.info.completed_requests.trim(min_tid);
    }

    // -- flush sequencing --

    pub fn push_seq(&self) -> PushSeq {
        self.flush.push_seq()
    }

    pub fn inc_push_seq(&mut self) -> PushSeq {
        self.flush.inc_push_seq()
    }

    pub fn wait_for_flush(&mut self, work: W) -> PushSeq {
        self.flush.wait_for_flush(work)
    }

    pub fn finish_flush(&mut self, ack_seq: PushSeq, out: &mut Vec<W>) {
        self.flush.finish_flush(ack_seq, out)
    }

    pub fn pending_flush_len(&self) -> usize {
        self.flush.pending_len()
    }

    // -- capability & lease membership --

    /// Add a freshly granted capability at the least-recently-used end.
    pub fn add_cap(&mut self, cap: CapId) {
        self.caps.insert_lru(cap);
    }

    /// Mark a capability as just used, moving it to the front.
    pub fn touch_cap(&mut self, cap: CapId) {
        self.caps.touch(cap);
    }

    pub fn remove_cap(&mut self, cap: CapId) -> bool {
        self.caps.remove(cap)
    }

    pub fn caps(&self) -> &MruList<CapId> {
        &self.caps
    }

    /// Mark a lease as just used, inserting it if new.
    pub fn touch_lease(&mut self, lease: LeaseId) {
        self.leases.touch(lease);
    }

    pub fn remove_lease(&mut self, lease: LeaseId) -> bool {
        self.leases.remove(lease)
    }

    pub fn leases(&self) -> &MruList<LeaseId> {
        &self.leases
    }

    pub fn lease_seq(&self) -> LeaseSeq {
        self.lease_seq
    }

    pub fn inc_lease_seq(&mut self) -> LeaseSeq {
        self.lease_seq = self.lease_seq.next();
        self.lease_seq
    }

    pub fn touch_cap_renew(&mut self, now_ms: u64) {
        self.last_cap_renew_ms = Some(now_ms);
    }

    pub fn last_cap_renew(&self) -> Option<u64> {
        self.last_cap_renew_ms
    }

    // -- recall accounting --

    /// Record a memory-pressure recall asking the client to shrink to
    /// `new_limit` held caps.
    pub fn notify_recall_sent(&mut self, new_limit: usize, now_ms: u64) {
        self.recall
            .notify_recall_sent(self.caps.len(), new_limit, now_ms);
    }

    pub fn notify_cap_release(&mut self, n_caps: usize) {
        self.recall.notify_cap_release(n_caps);
    }

    pub fn recall(&self) -> &RecallState {
        &self.recall
    }
}
