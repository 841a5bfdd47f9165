//! Data Array (spec.md §3 "Data array")
//!
//! A typed, strided 1D/2D/3D buffer. Two payload kinds exist: a flat byte
//! buffer for numeric [`SourceType`]s, and a handle buffer for arrays of
//! object references (`ANARI_ARRAY` of objects in the source API). Object
//! arrays participate in refcounting: every element contributes to its
//! target's internal count, and the map/unmap protocol in spec.md §5
//! (“mapping an object array transparently snapshots the prior contents so
//! that differences can be reconciled at unmap”) is implemented by
//! [`DataArray::map_objects`] / [`DataArray::unmap_objects`].

use rustc_hash::FxHashMap;

use crate::errors::{BridgeError, Result};
use crate::object::{ObjectGraph, ObjectHandle};
use crate::types::SourceType;

#[derive(Debug, Clone)]
enum Payload {
    Bytes(Vec<u8>),
    Objects(Vec<ObjectHandle>),
}

/// A 1D/2D/3D typed buffer owned privately by the bridge (the FFI-facing
/// "client pointer + deleter" variant from the original design collapses,
/// in safe Rust, to "the bytes are copied in at construction time").
#[derive(Debug, Clone)]
pub struct DataArray {
    element_type: Option<SourceType>,
    dims: (usize, usize, usize),
    payload: Payload,
    mapped_snapshot: Option<Vec<ObjectHandle>>,
}

impl DataArray {
    /// Builds a numeric data array. Fails with `InvalidArgument` if the
    /// buffer size doesn't match `dims` and the element's byte size, or if
    /// every dimension is zero (spec.md §7: "zero-size arrays").
    pub fn new_typed(element_type: SourceType, dims: (usize, usize, usize), bytes: Vec<u8>) -> Result<Self> {
        let count = dims.0 * dims.1.max(1) * dims.2.max(1);
        if count == 0 {
            return Err(BridgeError::InvalidArgument("data array has zero elements".into()));
        }
        let expected = count * element_type.byte_size();
        if bytes.len() != expected {
            return Err(BridgeError::InvalidArgument(format!(
                "data array buffer is {} bytes, expected {expected} for {count} elements of {element_type:?}",
                bytes.len()
            )));
        }
        Ok(Self {
            element_type: Some(element_type),
            dims: (dims.0, dims.1.max(1), dims.2.max(1)),
            payload: Payload::Bytes(bytes),
            mapped_snapshot: None,
        })
    }

    /// Builds an array of object handles, incrementing each referenced
    /// object's internal refcount immediately (spec.md §3: "Arrays of
    /// object handles increment internal counts on the contained objects").
    pub fn new_objects(dims: (usize, usize, usize), handles: Vec<ObjectHandle>, graph: &mut ObjectGraph) -> Result<Self> {
        if handles.is_empty() {
            return Err(BridgeError::InvalidArgument("object array has zero elements".into()));
        }
        for &h in &handles {
            graph.internal_inc(h);
        }
        Ok(Self {
            element_type: None,
            dims: (dims.0, dims.1.max(1), dims.2.max(1)),
            payload: Payload::Objects(handles),
            mapped_snapshot: None,
        })
    }

    #[must_use]
    pub fn dims(&self) -> (usize, usize, usize) {
        self.dims
    }

    #[must_use]
    pub fn is_one_dimensional(&self) -> bool {
        self.dims.1 == 1 && self.dims.2 == 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dims.0 * self.dims.1 * self.dims.2
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn element_type(&self) -> Option<SourceType> {
        self.element_type
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Bytes(b) => Some(b),
            Payload::Objects(_) => None,
        }
    }

    #[must_use]
    pub fn as_objects(&self) -> Option<&[ObjectHandle]> {
        match &self.payload {
            Payload::Objects(o) => Some(o),
            Payload::Bytes(_) => None,
        }
    }

    /// Begins a map session over an object array: snapshots current
    /// contents and returns a mutable view the caller may freely rewrite.
    pub fn map_objects(&mut self) -> Option<&mut [ObjectHandle]> {
        match &mut self.payload {
            Payload::Objects(objects) => {
                self.mapped_snapshot = Some(objects.clone());
                Some(objects.as_mut_slice())
            }
            Payload::Bytes(_) => None,
        }
    }

    /// Ends a map session: diffs the post-map contents against the
    /// pre-map snapshot and reconciles internal refcounts so that each
    /// element still present contributes exactly one reference.
    pub fn unmap_objects(&mut self, graph: &mut ObjectGraph) {
        let Some(before) = self.mapped_snapshot.take() else {
            return;
        };
        let Payload::Objects(after) = &self.payload else {
            return;
        };

        let mut delta: FxHashMap<ObjectHandle, i64> = FxHashMap::default();
        for h in &before {
            *delta.entry(*h).or_insert(0) -= 1;
        }
        for h in after {
            *delta.entry(*h).or_insert(0) += 1;
        }

        for (handle, count) in delta {
            if count > 0 {
                for _ in 0..count {
                    graph.internal_inc(handle);
                }
            } else {
                for _ in 0..(-count) {
                    graph.internal_dec(handle);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectKind;
    use crate::types::ScalarKind;

    #[test]
    fn zero_size_array_is_rejected() {
        let err = DataArray::new_typed(SourceType::Scalar(ScalarKind::Float), (0, 1, 1), vec![]);
        assert!(matches!(err, Err(BridgeError::InvalidArgument(_))));
    }

    #[test]
    fn mismatched_buffer_length_is_rejected() {
        let err = DataArray::new_typed(SourceType::Vec3(ScalarKind::Float), (2, 1, 1), vec![0u8; 4]);
        assert!(err.is_err());
    }

    #[test]
    fn map_unmap_reconciles_refcounts_on_swap() {
        let mut graph = ObjectGraph::new();
        let a = graph.create(ObjectKind::Instance, None);
        let b = graph.create(ObjectKind::Instance, None);

        let mut arr = DataArray::new_objects((2, 1, 1), vec![a, a], &mut graph).unwrap();
        assert_eq!(graph.get(a).unwrap().internal_count(), 2);

        {
            let view = arr.map_objects().unwrap();
            view[0] = b;
            view[1] = b;
        }
        arr.unmap_objects(&mut graph);

        assert_eq!(graph.get(a).unwrap().internal_count(), 0);
        assert_eq!(graph.get(b).unwrap().internal_count(), 2);
    }
}
