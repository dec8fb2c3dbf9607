use std::ops::Range;

use crate::models::error::CaptureError;

use super::view::{RecordView, RecordViewMut};

/// Primitive or small-struct type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    U8,
    I32,
    U64,
    F32,
    PointF,
    PixelPosition,
    Vector4,
    RectI,
    Joint,
    JointOrientation,
    /// Device-resident handle (e.g. a coordinate mapper). Never serialized.
    Handle,
}

impl FieldType {
    /// Encoded size of one element, in bytes.
    pub const fn size(self) -> usize {
        match self {
            FieldType::U8 => 1,
            FieldType::I32 | FieldType::F32 => 4,
            FieldType::U64 | FieldType::PointF | FieldType::PixelPosition => 8,
            FieldType::Vector4 | FieldType::RectI => 16,
            FieldType::Joint | FieldType::JointOrientation => 20,
            FieldType::Handle => 0,
        }
    }
}

/// One declared field: name, element type, element count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: &'static str,
    pub ty: FieldType,
    pub count: usize,
}

pub const fn field(name: &'static str, ty: FieldType, count: usize) -> FieldDecl {
    FieldDecl { name, ty, count }
}

/// Ordered field declaration of a record kind.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [FieldDecl],
}

/// A field placed in a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSlot {
    pub name: &'static str,
    pub ty: FieldType,
    pub count: usize,
    pub offset: usize,
}

impl FieldSlot {
    pub fn len(&self) -> usize {
        self.ty.size() * self.count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len()
    }

    /// Byte range of element `index` within the record.
    pub fn element_range(&self, index: usize) -> Range<usize> {
        let start = self.offset + index * self.ty.size();
        start..start + self.ty.size()
    }
}

/// Offset table computed from a schema.
///
/// Fields are laid out contiguously in declaration order; handles and
/// zero-count fields take no space and get no slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    name: &'static str,
    slots: Vec<FieldSlot>,
    size: usize,
}

impl RecordLayout {
    pub fn compute(schema: &Schema) -> Self {
        let mut slots = Vec::with_capacity(schema.fields.len());
        let mut running_offset = 0;

        for decl in schema.fields {
            if decl.count == 0 || decl.ty == FieldType::Handle {
                continue;
            }
            slots.push(FieldSlot {
                name: decl.name,
                ty: decl.ty,
                count: decl.count,
                offset: running_offset,
            });
            running_offset += decl.ty.size() * decl.count;
        }

        Self {
            name: schema.name,
            slots,
            size: running_offset,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Total bytes of one record.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Result<&FieldSlot, CaptureError> {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| CaptureError::UnknownField(format!("{}.{}", self.name, name)))
    }

    /// Bind a read-only view over the first `size()` bytes of `buffer`.
    pub fn bind<'a>(&'a self, buffer: &'a [u8]) -> Result<RecordView<'a>, CaptureError> {
        self.check_len(buffer.len())?;
        Ok(RecordView::new(self, &buffer[..self.size]))
    }

    /// Bind a mutable view over the first `size()` bytes of `buffer`.
    pub fn bind_mut<'a>(&'a self, buffer: &'a mut [u8]) -> Result<RecordViewMut<'a>, CaptureError> {
        self.check_len(buffer.len())?;
        Ok(RecordViewMut::new(self, &mut buffer[..self.size]))
    }

    fn check_len(&self, available: usize) -> Result<(), CaptureError> {
        if available < self.size {
            return Err(CaptureError::BufferTooSmall {
                needed: self.size,
                available,
            });
        }
        Ok(())
    }
}
