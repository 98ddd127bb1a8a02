//! Per-document tracking of live edit drift.
//!
//! While a recorded take plays back into a document, the user may keep typing
//! into that same document. Every user edit shifts the text that later
//! replayed events expect to find, so recorded positions go stale. The
//! tracker records each live edit as signed drift units and translates
//! recorded coordinates into current-document coordinates on demand.
//!
//! Representation: an ordered multiset of drift units, stored as a
//! `BTreeMap<usize, i64>` keyed by current-document coordinate. A positive
//! count means live-inserted characters sit at that coordinate (always one
//! unit per key, since inserted characters occupy consecutive distinct
//! coordinates). A negative count is a collapsed deletion run: that many
//! characters were deleted live at that coordinate, one unit per character,
//! all sharing the run's start key.
//!
//! Edits made by the playback engine itself move the document too, so they
//! re-key existing units ([`OffsetTracker::discount_edit`]) — but they add no
//! drift of their own, because the log already accounts for them. Only
//! user-originated edits ([`OffsetTracker::record_edit`]) add units. That
//! asymmetry is what keeps repeated resolution consistent while a take plays.

use std::collections::BTreeMap;

/// Ordered multiset of live drift units for one document.
///
/// Created when playback or recording first touches a document, dropped when
/// that session ends. One writer, one reader, never concurrent; no locking.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    entries: BTreeMap<usize, i64>,
}

impl OffsetTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user-originated edit at `position` (current coordinates).
    ///
    /// Insertions add one positive unit per inserted character and push every
    /// unit at or after `position` forward. Deletions pull units beyond the
    /// removed span back, clamp deletion runs inside the span to its start,
    /// annihilate live-insert units the span covers (a net-zero insert/delete
    /// pair at one point cancels outright), and add one negative unit per
    /// remaining removed character at the span start.
    pub fn record_edit(&mut self, position: usize, length: usize, is_deletion: bool) {
        if is_deletion {
            self.apply_deletion(position, length, true);
        } else {
            self.apply_insertion(position, length, true);
        }
    }

    /// Registers an edit the playback engine performed itself.
    ///
    /// Re-keys existing units exactly like [`Self::record_edit`] — the
    /// document moved underneath them — but contributes no drift units.
    pub fn discount_edit(&mut self, position: usize, length: usize, is_deletion: bool) {
        if is_deletion {
            self.apply_deletion(position, length, false);
        } else {
            self.apply_insertion(position, length, false);
        }
    }

    /// Translates a recorded position into current-document coordinates.
    ///
    /// Bounded ascending prefix scan: walk units in coordinate order,
    /// accumulating drift into a running position that starts at `position`.
    /// Live-inserted characters at or below the running position push it
    /// forward — an insert exactly at the point counts, so replayed content
    /// lands *after* text typed live at the same spot. Deletion runs pull the
    /// running position back, but never below their own start: resolving at a
    /// run's collapse point stays put, and resolving into a deleted span
    /// clamps to where the span collapsed. The walk stops at the first unit
    /// beyond the running position.
    ///
    /// Resolution is pure; calling it repeatedly gives the same answer.
    pub fn resolve(&self, position: usize) -> usize {
        let mut adjusted = position;
        for (&key, &count) in &self.entries {
            if key > adjusted {
                break;
            }
            if count > 0 {
                adjusted += count as usize;
            } else {
                adjusted = adjusted.saturating_sub((-count) as usize).max(key);
            }
        }
        adjusted
    }

    /// Removes every unit. A fresh tracker is equivalent.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// True when no drift is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of drift units (one per live-edited character).
    pub fn unit_count(&self) -> usize {
        self.entries
            .values()
            .map(|count| count.unsigned_abs() as usize)
            .sum()
    }

    fn apply_insertion(&mut self, position: usize, length: usize, add_units: bool) {
        if length == 0 {
            return;
        }
        // Everything at or after the insertion point moves forward. Keys stay
        // distinct: the moved range lands wholly above the untouched one.
        let moved = self.entries.split_off(&position);
        for (key, count) in moved {
            self.entries.insert(key + length, count);
        }
        if add_units {
            for key in position..position + length {
                self.entries.insert(key, 1);
            }
        }
    }

    fn apply_deletion(&mut self, position: usize, length: usize, add_units: bool) {
        if length == 0 {
            return;
        }
        let end = position + length;
        let tail = self.entries.split_off(&position);

        let mut annihilated: usize = 0;
        let mut carried_ghosts: i64 = 0;
        for (key, count) in tail {
            if key < end {
                if count > 0 {
                    // A live-inserted character inside the removed span is
                    // gone, and so is the drift it contributed.
                    annihilated += count as usize;
                } else {
                    // An earlier deletion run inside the span collapses to
                    // the new span start.
                    carried_ghosts += -count;
                }
            } else {
                self.entries.insert(key - length, count);
            }
        }

        let mut ghosts = carried_ghosts;
        if add_units {
            ghosts += length.saturating_sub(annihilated) as i64;
        }
        if ghosts > 0 {
            *self.entries.entry(position).or_insert(0) -= ghosts;
            if self.entries.get(&position) == Some(&0) {
                self.entries.remove(&position);
            }
        }
    }
}
