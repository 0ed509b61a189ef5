//! Rolling history buffer for one named component quantity.
//!
//! A [`State`] holds `solver_history + 1` slots of `slot_len` values
//! each: slot 0 is the value being computed this step, slot `-k` the
//! value committed `k` rotations ago. Rotation is index arithmetic over
//! a single pre-allocated buffer; nothing is copied or reallocated on
//! the stepping path.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// A fixed-depth history buffer over a flat, pre-allocated `f64` buffer.
///
/// Logical slots are addressed relative to the step in progress:
/// slot 0 is the scratch being computed, slot -1 the last committed
/// value, down to slot `-(depth - 1)` for the oldest retained value.
/// [`rotate`](State::rotate) commits slot 0 as the new slot -1 and
/// recycles the oldest slot as a fresh, zeroed slot 0.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    buf: Vec<f64>,
    depth: usize,
    slot_len: usize,
    /// Physical index of logical slot 0.
    head: usize,
}

impl State {
    /// Allocate a zeroed buffer for `solver_history + 1` slots.
    ///
    /// # Panics
    ///
    /// Panics if `slot_len` is zero.
    pub fn new(solver_history: usize, slot_len: usize) -> Self {
        assert!(slot_len > 0, "state slot length must be non-zero");
        let depth = solver_history + 1;
        Self {
            buf: vec![0.0; depth * slot_len],
            depth,
            slot_len,
            head: 0,
        }
    }

    /// Rebuild a buffer from dumped slots, ordered oldest to newest
    /// with the scratch slot 0 last.
    ///
    /// # Panics
    ///
    /// Panics if `slots` is empty or any slot's length differs from
    /// `slot_len`.
    pub fn from_slots(slot_len: usize, slots: &[Vec<f64>]) -> Self {
        assert!(slot_len > 0, "state slot length must be non-zero");
        assert!(!slots.is_empty(), "state needs at least one slot");
        let depth = slots.len();
        let mut buf = Vec::with_capacity(depth * slot_len);
        for slot in slots {
            assert_eq!(slot.len(), slot_len, "slot length mismatch");
            buf.extend_from_slice(slot);
        }
        // Laid out oldest-first, the scratch slot sits at the end.
        Self {
            buf,
            depth,
            slot_len,
            head: depth - 1,
        }
    }

    /// Number of slots retained (`solver_history + 1`).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of past steps retained beyond the one being computed.
    pub fn solver_history(&self) -> usize {
        self.depth - 1
    }

    /// Number of values per slot.
    pub fn slot_len(&self) -> usize {
        self.slot_len
    }

    fn physical(&self, k: usize) -> usize {
        // Logical slot -k counted back from the head.
        (self.head + self.depth - k) % self.depth
    }

    fn slice(&self, physical: usize) -> &[f64] {
        let start = physical * self.slot_len;
        &self.buf[start..start + self.slot_len]
    }

    fn slice_mut(&mut self, physical: usize) -> &mut [f64] {
        let start = physical * self.slot_len;
        &mut self.buf[start..start + self.slot_len]
    }

    /// The value being computed this step (slot 0).
    pub fn current(&self) -> &[f64] {
        self.slice(self.head)
    }

    /// Mutable access to the value being computed this step (slot 0).
    pub fn current_mut(&mut self) -> &mut [f64] {
        self.slice_mut(self.head)
    }

    /// The last committed value (slot -1).
    ///
    /// With history depth 1 this aliases slot 0.
    pub fn last(&self) -> &[f64] {
        self.slice(self.physical(1))
    }

    /// Mutable access to the last committed value (slot -1).
    ///
    /// Used to seed initial conditions before the first step.
    pub fn last_mut(&mut self) -> &mut [f64] {
        let p = self.physical(1);
        self.slice_mut(p)
    }

    /// The value committed `k` rotations ago, for `k` in
    /// `0..=solver_history` (slot `-k`).
    ///
    /// # Panics
    ///
    /// Panics if `k` exceeds the retained history.
    pub fn slot(&self, k: usize) -> &[f64] {
        assert!(k < self.depth, "slot -{k} beyond history depth {}", self.depth);
        self.slice(self.physical(k))
    }

    /// Split access to the scratch slot 0 and the committed slot -1.
    ///
    /// Lets a process compute `slot 0` from `slot -1` without copying.
    ///
    /// # Panics
    ///
    /// Panics with history depth 1, where the two slots alias.
    pub fn current_and_last(&mut self) -> (&mut [f64], &[f64]) {
        assert!(
            self.depth >= 2,
            "slot 0 and slot -1 alias with history depth 1"
        );
        let cur = self.head;
        let last = self.physical(1);
        let sl = self.slot_len;
        if cur < last {
            let (left, right) = self.buf.split_at_mut(last * sl);
            (&mut left[cur * sl..(cur + 1) * sl], &right[..sl])
        } else {
            let (left, right) = self.buf.split_at_mut(cur * sl);
            (&mut right[..sl], &left[last * sl..(last + 1) * sl])
        }
    }

    /// Commit slot 0 as the new slot -1 and recycle the oldest slot as
    /// a fresh, zeroed slot 0.
    ///
    /// The value previously at slot `-(depth - 1)` is dropped.
    pub fn rotate(&mut self) {
        self.head = (self.head + 1) % self.depth;
        let head = self.head;
        self.slice_mut(head).fill(0.0);
    }

    /// All slots ordered oldest to newest, the scratch slot 0 last.
    ///
    /// This is the layout [`from_slots`](State::from_slots) accepts, so
    /// dump and restore reproduce every slot exactly.
    pub fn slots(&self) -> Vec<&[f64]> {
        (0..self.depth)
            .map(|j| self.slice((self.head + 1 + j) % self.depth))
            .collect()
    }
}
