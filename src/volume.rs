//! VolumeWriter interface (spec.md §6). OpenVDB encoding internals are out
//! of scope; this is the input contract the writer drives a volume
//! encoder through. [`StubVolumeWriter`] is a minimal in-memory
//! implementation used by this crate's own tests — production embedders
//! supply their own.

use crate::errors::Result;

/// Dense volume data handed to a `VolumeWriter` (spec.md §8 scenario S6).
#[derive(Debug, Clone)]
pub struct VolumeData {
    pub dims: (u32, u32, u32),
    pub origin: [f32; 3],
    pub spacing: [f32; 3],
    pub grid_name: String,
    pub values: Vec<f32>,
}

pub trait VolumeWriter {
    fn initialize(&mut self) -> Result<bool>;
    fn to_vdb(&mut self, data: &VolumeData) -> Result<()>;
    fn serialized_volume_data(&self) -> &[u8];
    fn release(&mut self);
}

/// Not an OpenVDB encoder: records a small header plus the raw `f32`
/// payload so tests can assert the writer called through with the right
/// shape, without depending on an actual VDB library.
#[derive(Default)]
pub struct StubVolumeWriter {
    buffer: Vec<u8>,
}

impl StubVolumeWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VolumeWriter for StubVolumeWriter {
    fn initialize(&mut self) -> Result<bool> {
        self.buffer.clear();
        Ok(true)
    }

    fn to_vdb(&mut self, data: &VolumeData) -> Result<()> {
        self.buffer.extend_from_slice(b"VDBSTUB1");
        self.buffer.extend_from_slice(&data.dims.0.to_le_bytes());
        self.buffer.extend_from_slice(&data.dims.1.to_le_bytes());
        self.buffer.extend_from_slice(&data.dims.2.to_le_bytes());
        for v in &data.values {
            self.buffer.extend_from_slice(&v.to_le_bytes());
        }
        Ok(())
    }

    fn serialized_volume_data(&self) -> &[u8] {
        &self.buffer
    }

    fn release(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_vdb_encodes_dims_and_payload_length() {
        let mut writer = StubVolumeWriter::new();
        writer.initialize().unwrap();
        let data = VolumeData {
            dims: (2, 2, 2),
            origin: [0.0; 3],
            spacing: [1.0; 3],
            grid_name: "density".into(),
            values: vec![0.0; 8],
        };
        writer.to_vdb(&data).unwrap();
        assert_eq!(writer.serialized_volume_data().len(), 8 + 4 + 4 + 4 + 8 * 4);
    }
}
