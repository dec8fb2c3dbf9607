use std::ops::Range;

use crate::models::error::CaptureError;

use super::schema::RecordLayout;
use super::view::{RecordView, RecordViewMut};

/// Fixed-capacity arena of records sharing one layout, packed back to back.
///
/// Each stored record remembers the hardware slot it came from, so a dense
/// index can always be mapped back to its origin.
#[derive(Debug, Clone)]
pub struct RecordArena {
    layout: &'static RecordLayout,
    capacity: usize,
    bytes: Vec<u8>,
    origins: Vec<usize>,
}

impl RecordArena {
    pub fn new(layout: &'static RecordLayout, capacity: usize) -> Self {
        Self {
            layout,
            capacity,
            bytes: vec![0u8; layout.size() * capacity],
            origins: Vec::with_capacity(capacity),
        }
    }

    /// Rebuild an arena from previously serialized dense records.
    ///
    /// Origins are not part of the serialized form; they default to the
    /// dense index.
    pub fn from_bytes(
        layout: &'static RecordLayout,
        capacity: usize,
        bytes: &[u8],
    ) -> Result<Self, CaptureError> {
        let size = layout.size();
        if size == 0 || bytes.len() % size != 0 {
            return Err(CaptureError::StorageError(format!(
                "{} bytes is not a whole number of {} records ({} bytes each)",
                bytes.len(),
                layout.name(),
                size
            )));
        }
        let count = bytes.len() / size;
        if count > capacity {
            return Err(CaptureError::BufferTooSmall {
                needed: bytes.len(),
                available: size * capacity,
            });
        }

        let mut arena = Self::new(layout, capacity);
        arena.bytes[..bytes.len()].copy_from_slice(bytes);
        arena.origins.extend(0..count);
        Ok(arena)
    }

    pub fn layout(&self) -> &'static RecordLayout {
        self.layout
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    pub fn clear(&mut self) {
        self.origins.clear();
    }

    /// Append one zeroed record, let `fill` populate it, and return its dense index.
    pub fn push_with<F>(&mut self, origin: usize, fill: F) -> Result<usize, CaptureError>
    where
        F: FnOnce(&mut RecordViewMut<'_>) -> Result<(), CaptureError>,
    {
        let index = self.len();
        if index == self.capacity {
            return Err(CaptureError::BufferTooSmall {
                needed: (index + 1) * self.layout.size(),
                available: self.bytes.len(),
            });
        }

        let layout = self.layout;
        let range = self.record_range(index);
        let mut view = layout.bind_mut(&mut self.bytes[range])?;
        view.clear();
        fill(&mut view)?;
        self.origins.push(origin);
        Ok(index)
    }

    pub fn view(&self, index: usize) -> Option<RecordView<'_>> {
        if index >= self.len() {
            return None;
        }
        self.layout.bind(&self.bytes[self.record_range(index)]).ok()
    }

    pub fn origin(&self, index: usize) -> Option<usize> {
        self.origins.get(index).copied()
    }

    pub fn origins(&self) -> &[usize] {
        &self.origins
    }

    /// The populated records, densely packed.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len() * self.layout.size()]
    }

    fn record_range(&self, index: usize) -> Range<usize> {
        let size = self.layout.size();
        index * size..(index + 1) * size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::schema::{field, FieldType, Schema};
    use std::sync::OnceLock;

    const TINY: Schema = Schema {
        name: "tiny",
        fields: &[field("id", FieldType::U64, 1), field("state", FieldType::I32, 1)],
    };

    fn tiny() -> &'static RecordLayout {
        static LAYOUT: OnceLock<RecordLayout> = OnceLock::new();
        LAYOUT.get_or_init(|| RecordLayout::compute(&TINY))
    }

    #[test]
    fn records_are_packed_densely_with_origins() {
        let mut arena = RecordArena::new(tiny(), 3);
        arena.push_with(4, |v| v.set("id", 0, 40u64)).unwrap();
        arena.push_with(1, |v| v.set("id", 0, 10u64)).unwrap();

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.origins(), &[4, 1]);
        assert_eq!(arena.as_bytes().len(), 24);
        assert_eq!(arena.view(1).unwrap().get::<u64>("id", 0).unwrap(), 10);
        assert!(arena.view(2).is_none());
    }

    #[test]
    fn push_beyond_capacity_fails() {
        let mut arena = RecordArena::new(tiny(), 1);
        arena.push_with(0, |_| Ok(())).unwrap();
        assert!(matches!(
            arena.push_with(1, |_| Ok(())),
            Err(CaptureError::BufferTooSmall { needed: 24, available: 12 })
        ));
    }

    #[test]
    fn reused_slots_start_zeroed() {
        let mut arena = RecordArena::new(tiny(), 1);
        arena.push_with(0, |v| v.set("state", 0, 9i32)).unwrap();
        arena.clear();
        arena.push_with(0, |_| Ok(())).unwrap();
        assert_eq!(arena.view(0).unwrap().get::<i32>("state", 0).unwrap(), 0);
    }

    #[test]
    fn from_bytes_rejects_partial_records() {
        assert!(RecordArena::from_bytes(tiny(), 6, &[0u8; 13]).is_err());
        let arena = RecordArena::from_bytes(tiny(), 6, &[0u8; 24]).unwrap();
        assert_eq!(arena.origins(), &[0, 1]);
    }
}
