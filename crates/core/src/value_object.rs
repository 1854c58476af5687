//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values, e.g. a
/// rule's validity window or its pricing formula. To "modify" one, build a new
/// one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
