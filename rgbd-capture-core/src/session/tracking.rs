use std::sync::Arc;

use parking_lot::Mutex;

use crate::layout::body::{BodySet, MAX_BODIES};

pub type SharedTrackingTable = Arc<Mutex<TrackingTable>>;

/// Body tracking ids per hardware slot, handed from the acquisition thread
/// to the face thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingTable {
    tracking_ids: [u64; MAX_BODIES],
    search_started: [bool; MAX_BODIES],
}

/// What the face thread should do on this pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacePass {
    /// Slots whose search must be (re)started, with the id to search for.
    pub to_start: Vec<(usize, u64)>,
    /// Slots with a running search, with their current id.
    pub searching: Vec<(usize, u64)>,
}

impl TrackingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTrackingTable {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Reconcile with the latest compacted body set.
    ///
    /// A slot that now carries a different id gets the new id and an
    /// unstarted search; slots without a tracked body are cleared.
    pub fn exchange(&mut self, bodies: &BodySet) {
        for index in 0..bodies.len() {
            let (Some(slot), Some(id)) = (bodies.initial_index(index), bodies.tracking_id(index)) else {
                continue;
            };
            if slot < MAX_BODIES && self.tracking_ids[slot] != id {
                self.tracking_ids[slot] = id;
                self.search_started[slot] = false;
            }
        }

        for slot in 0..MAX_BODIES {
            if !bodies.is_present(slot) {
                self.tracking_ids[slot] = 0;
                self.search_started[slot] = false;
            }
        }
    }

    /// Mark every pending search as started and report the pass plan.
    pub fn begin_pass(&mut self) -> FacePass {
        let mut pass = FacePass::default();
        for slot in 0..MAX_BODIES {
            let id = self.tracking_ids[slot];
            if id == 0 {
                continue;
            }
            if !self.search_started[slot] {
                self.search_started[slot] = true;
                pass.to_start.push((slot, id));
            }
            pass.searching.push((slot, id));
        }
        pass
    }

    pub fn tracking_id(&self, slot: usize) -> u64 {
        self.tracking_ids.get(slot).copied().unwrap_or(0)
    }

    pub fn is_search_started(&self, slot: usize) -> bool {
        self.search_started.get(slot).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::body::{BodyData, BodyFrame, BodySample};

    fn bodies(slots: &[(usize, u64)]) -> BodySet {
        let mut frame = BodyFrame::default();
        for &(slot, tracking_id) in slots {
            frame.slots[slot] = Some(BodySample {
                is_tracked: true,
                data: BodyData {
                    tracking_id,
                    ..Default::default()
                },
            });
        }
        let mut set = BodySet::new();
        set.compact(&frame).unwrap();
        set
    }

    #[test]
    fn new_ids_start_unsearched() {
        let mut table = TrackingTable::new();
        table.exchange(&bodies(&[(1, 11), (4, 44)]));

        assert_eq!(table.tracking_id(1), 11);
        assert_eq!(table.tracking_id(4), 44);
        assert!(!table.is_search_started(1));

        let pass = table.begin_pass();
        assert_eq!(pass.to_start, vec![(1, 11), (4, 44)]);
        assert!(table.is_search_started(4));
        assert!(table.begin_pass().to_start.is_empty());
    }

    #[test]
    fn changed_id_resets_search() {
        let mut table = TrackingTable::new();
        table.exchange(&bodies(&[(2, 20)]));
        table.begin_pass();

        table.exchange(&bodies(&[(2, 20)]));
        assert!(table.is_search_started(2));

        table.exchange(&bodies(&[(2, 21)]));
        assert!(!table.is_search_started(2));
        assert_eq!(table.begin_pass().to_start, vec![(2, 21)]);
    }

    #[test]
    fn absent_slots_are_cleared() {
        let mut table = TrackingTable::new();
        table.exchange(&bodies(&[(0, 5), (3, 7)]));
        table.begin_pass();

        table.exchange(&bodies(&[(3, 7)]));
        assert_eq!(table.tracking_id(0), 0);
        assert!(!table.is_search_started(0));
        assert_eq!(table.begin_pass().searching, vec![(3, 7)]);

        table.exchange(&bodies(&[]));
        assert_eq!(table, TrackingTable::new());
    }
}
