//! Flush sequencing for capability messages.
//!
//! Every capability message pushed to a client is tagged with a push
//! sequence number. Work that must wait until the client has flushed up
//! through a given message registers here and is released, in batches, when
//! the matching acknowledgement arrives. Acknowledgement is cumulative:
//! acking sequence `n` releases everything registered at or below `n`,
//! mirroring a sliding window.
//!
//! The sequencer never runs work itself; `finish_flush` hands the released
//! batch back to the caller, which schedules it however it likes. There is
//! no cancellation: a caller tearing a session down drains pending work by
//! acking the current push sequence (or deliberately drops it).

use std::collections::BTreeMap;

use crate::core::PushSeq;

/// Pending-work registry keyed by push sequence.
///
/// Generic over the work item `W` so the execution strategy stays with the
/// embedding layer.
#[derive(Clone, Debug)]
pub struct FlushSequencer<W> {
    push_seq: PushSeq,
    waitfor: BTreeMap<PushSeq, Vec<W>>,
}

impl<W> FlushSequencer<W> {
    pub fn new() -> Self {
        Self {
            push_seq: PushSeq::ZERO,
            waitfor: BTreeMap::new(),
        }
    }

    /// Current push sequence (the tag of the most recently pushed message).
    pub fn push_seq(&self) -> PushSeq {
        self.push_seq
    }

    /// Advance the push sequence and return the new value, which tags the
    /// message about to be pushed.
    pub fn inc_push_seq(&mut self) -> PushSeq {
        self.push_seq = self.push_seq.next();
        self.push_seq
    }

    /// Register `work` to run once the client has flushed up through the
    /// *current* push sequence. Returns that sequence as the correlation
    /// token the caller can match against later acknowledgements.
    pub fn wait_for_flush(&mut self, work: W) -> PushSeq {
        let seq = self.push_seq;
        self.waitfor.entry(seq).or_default().push(work);
        seq
    }

    /// Release everything registered at or below `ack_seq`, appending work
    /// items to `out` in increasing sequence order and, within one
    /// sequence, in registration order. Never blocks.
    pub fn finish_flush(&mut self, ack_seq: PushSeq, out: &mut Vec<W>) {
        while let Some(entry) = self.waitfor.first_entry() {
            if *entry.key() > ack_seq {
                break;
            }
            out.extend(entry.remove());
        }
    }

    /// Work items still waiting on an acknowledgement.
    pub fn pending_len(&self) -> usize {
        self.waitfor.values().map(Vec::len).sum()
    }

    pub fn has_pending(&self) -> bool {
        !self.waitfor.is_empty()
    }

    /// Reset the push sequence to zero for a durable-identity reset.
    ///
    /// Pending work is left untouched; the caller is expected to have
    /// drained it (`finish_flush` with the pre-reset sequence) first.
    pub fn reset(&mut self) {
        self.push_seq = PushSeq::ZERO;
    }
}

impl<W> Default for FlushSequencer<W> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_follows_registration_and_sequence_order() {
        let mut seq = FlushSequencer::new();

        assert_eq!(seq.wait_for_flush("c1"), PushSeq::ZERO);
        assert_eq!(seq.inc_push_seq(), PushSeq::new(1));
        assert_eq!(seq.wait_for_flush("c2"), PushSeq::new(1));

        let mut out = Vec::new();
        seq.finish_flush(PushSeq::ZERO, &mut out);
        assert_eq!(out, vec!["c1"]);
        assert_eq!(seq.pending_len(), 1);

        let mut out2 = Vec::new();
        seq.finish_flush(PushSeq::new(1), &mut out2);
        assert_eq!(out2, vec!["c2"]);
        assert!(!seq.has_pending());
    }

    #[test]
    fn cumulative_ack_releases_whole_prefix() {
        let mut seq = FlushSequencer::new();
        seq.wait_for_flush("a");
        seq.inc_push_seq();
        seq.wait_for_flush("b1");
        seq.wait_for_flush("b2");
        seq.inc_push_seq();
        seq.inc_push_seq();
        seq.wait_for_flush("d");

        let mut out = Vec::new();
        seq.finish_flush(PushSeq::new(2), &mut out);
        assert_eq!(out, vec!["a", "b1", "b2"]);
        assert_eq!(seq.pending_len(), 1);

        // acking again below the remaining key releases nothing
        seq.finish_flush(PushSeq::new(2), &mut out);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn never_releases_beyond_the_ack() {
        let mut seq = FlushSequencer::new();
        seq.inc_push_seq();
        seq.wait_for_flush("later");
        let mut out: Vec<&str> = Vec::new();
        seq.finish_flush(PushSeq::ZERO, &mut out);
        assert!(out.is_empty());
        assert!(seq.has_pending());
    }

    #[test]
    fn reset_rewinds_sequence_only() {
        let mut seq = FlushSequencer::new();
        seq.inc_push_seq();
        seq.inc_push_seq();
        seq.wait_for_flush("w");
        seq.reset();
        assert_eq!(seq.push_seq(), PushSeq::ZERO);
        assert_eq!(seq.pending_len(), 1);
    }
}
