use crate::models::error::CaptureError;

use super::primitives::FieldValue;
use super::schema::{FieldSlot, RecordLayout};

fn typed_slot<'l, T: FieldValue>(
    layout: &'l RecordLayout,
    name: &str,
    index: usize,
) -> Result<&'l FieldSlot, CaptureError> {
    let slot = layout.slot(name)?;
    if slot.ty != T::TYPE {
        return Err(CaptureError::UnknownField(format!(
            "{}.{} is {:?}, not {:?}",
            layout.name(),
            name,
            slot.ty,
            T::TYPE
        )));
    }
    if index >= slot.count {
        return Err(CaptureError::UnknownField(format!(
            "{}.{}[{}] out of {}",
            layout.name(),
            name,
            index,
            slot.count
        )));
    }
    Ok(slot)
}

/// Read-only typed access to one record bound over caller memory.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    layout: &'a RecordLayout,
    bytes: &'a [u8],
}

impl<'a> RecordView<'a> {
    pub(crate) fn new(layout: &'a RecordLayout, bytes: &'a [u8]) -> Self {
        Self { layout, bytes }
    }

    pub fn layout(&self) -> &'a RecordLayout {
        self.layout
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn get<T: FieldValue>(&self, name: &str, index: usize) -> Result<T, CaptureError> {
        let slot = typed_slot::<T>(self.layout, name, index)?;
        Ok(T::read(&self.bytes[slot.element_range(index)]))
    }

    pub fn get_all<T: FieldValue>(&self, name: &str) -> Result<Vec<T>, CaptureError> {
        let slot = typed_slot::<T>(self.layout, name, 0)?;
        Ok((0..slot.count)
            .map(|i| T::read(&self.bytes[slot.element_range(i)]))
            .collect())
    }
}

/// Mutable typed access to one record bound over caller memory.
#[derive(Debug)]
pub struct RecordViewMut<'a> {
    layout: &'a RecordLayout,
    bytes: &'a mut [u8],
}

impl<'a> RecordViewMut<'a> {
    pub(crate) fn new(layout: &'a RecordLayout, bytes: &'a mut [u8]) -> Self {
        Self { layout, bytes }
    }

    pub fn as_view(&self) -> RecordView<'_> {
        RecordView::new(self.layout, self.bytes)
    }

    pub fn set<T: FieldValue>(&mut self, name: &str, index: usize, value: T) -> Result<(), CaptureError> {
        let slot = typed_slot::<T>(self.layout, name, index)?;
        value.write(&mut self.bytes[slot.element_range(index)]);
        Ok(())
    }

    /// Write `values` into the leading elements of an array field.
    pub fn set_all<T: FieldValue>(&mut self, name: &str, values: &[T]) -> Result<(), CaptureError> {
        let slot = *typed_slot::<T>(self.layout, name, 0)?;
        if values.len() > slot.count {
            return Err(CaptureError::BufferTooSmall {
                needed: values.len(),
                available: slot.count,
            });
        }
        for (i, value) in values.iter().enumerate() {
            value.write(&mut self.bytes[slot.element_range(i)]);
        }
        Ok(())
    }

    /// Zero the whole record.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::primitives::PointF;
    use crate::layout::schema::{field, FieldType, Schema};

    const SAMPLE: Schema = Schema {
        name: "sample",
        fields: &[
            field("id", FieldType::U64, 1),
            field("points", FieldType::PointF, 2),
            field("state", FieldType::I32, 1),
        ],
    };

    #[test]
    fn set_then_get_through_offsets() {
        let layout = RecordLayout::compute(&SAMPLE);
        let mut arena = vec![0u8; layout.size() + 4];
        {
            let mut view = layout.bind_mut(&mut arena).unwrap();
            view.set("id", 0, 77u64).unwrap();
            view.set("points", 1, PointF { x: 1.5, y: -1.0 }).unwrap();
            view.set("state", 0, 2i32).unwrap();
        }

        // id at 0, points at 8, state at 24
        assert_eq!(&arena[0..8], &77u64.to_le_bytes());
        assert_eq!(&arena[16..20], &1.5f32.to_le_bytes());
        assert_eq!(&arena[24..28], &2i32.to_le_bytes());

        let view = layout.bind(&arena).unwrap();
        assert_eq!(view.get::<u64>("id", 0).unwrap(), 77);
        assert_eq!(view.get_all::<PointF>("points").unwrap()[1], PointF { x: 1.5, y: -1.0 });
    }

    #[test]
    fn type_and_index_are_checked() {
        let layout = RecordLayout::compute(&SAMPLE);
        let arena = vec![0u8; layout.size()];
        let view = layout.bind(&arena).unwrap();
        assert!(view.get::<f32>("id", 0).is_err());
        assert!(view.get::<PointF>("points", 2).is_err());
        assert!(view.get::<i32>("missing", 0).is_err());
    }

    #[test]
    fn set_all_rejects_overflow() {
        let layout = RecordLayout::compute(&SAMPLE);
        let mut arena = vec![0u8; layout.size()];
        let mut view = layout.bind_mut(&mut arena).unwrap();
        let points = [PointF::default(); 3];
        assert!(view.set_all("points", &points).is_err());
    }
}
