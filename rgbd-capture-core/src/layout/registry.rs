use std::sync::OnceLock;

use crate::models::sources::Modality;

use super::body::BODY_SCHEMA;
use super::face::FACE_SCHEMA;
use super::schema::RecordLayout;

static REGISTRY: OnceLock<LayoutRegistry> = OnceLock::new();

/// Process-wide table of record layouts, computed exactly once.
#[derive(Debug)]
pub struct LayoutRegistry {
    body: RecordLayout,
    face: RecordLayout,
}

impl LayoutRegistry {
    /// Compute every layout. Safe to call more than once; later calls are no-ops.
    pub fn init() -> &'static LayoutRegistry {
        REGISTRY.get_or_init(|| {
            let registry = LayoutRegistry {
                body: RecordLayout::compute(&BODY_SCHEMA),
                face: RecordLayout::compute(&FACE_SCHEMA),
            };
            log::debug!(
                "record layouts ready: body {} bytes, face {} bytes",
                registry.body.size(),
                registry.face.size()
            );
            registry
        })
    }

    pub fn global() -> &'static LayoutRegistry {
        Self::init()
    }

    pub fn body(&self) -> &RecordLayout {
        &self.body
    }

    pub fn face(&self) -> &RecordLayout {
        &self.face
    }

    /// Layout of the records stored by a set modality, if any.
    pub fn for_modality(&self, modality: Modality) -> Option<&RecordLayout> {
        match modality {
            Modality::Body => Some(&self.body),
            Modality::Face => Some(&self.face),
            _ => None,
        }
    }
}
