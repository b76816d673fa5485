//! Data structures mirroring the SQLite tables.

use sqlx::FromRow;

/// One persisted difficulty attribute.
#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct AttributeRow {
    pub attribute_id: u16,
    pub value: f32,
}

impl AttributeRow {
    pub fn new(attribute_id: u16, value: f32) -> Self {
        Self {
            attribute_id,
            value,
        }
    }
}
