// src/uniform_pack.rs
//! Fixed-capacity, versioned uniform storage.
//!
//! A pack owns `version_count` independent copies of the same float-slot
//! layout. One slot is one `f32`; scalars and 4-vectors take a 4-slot
//! group, matrices take 16. Allocation is monotonic for the lifetime of
//! the pack and the resulting offsets are the layout contract with the
//! consuming shader.
//!
//! Writes land in CPU storage and mark their version dirty; [`UniformPack::flush`]
//! uploads every dirty version's byte range into the backing GPU buffer.

use glam::{Mat4, Vec4};

use crate::error::{Error, Result};
use crate::gpu::GpuContext;

/// Offset of an allocation, in float slots from the start of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle(u32);

impl SlotHandle {
    pub fn offset(self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
pub struct UniformPack {
    label: String,
    /// Slots per version.
    stride: u32,
    version_count: u32,
    /// Allocated slots within one version.
    cursor: u32,
    storage: Vec<f32>,
    dirty: Vec<bool>,
}

impl UniformPack {
    /// `capacity` is the total slot budget across all versions; each
    /// version gets `capacity / version_count` slots.
    pub fn new(label: impl Into<String>, capacity: u32, version_count: u32) -> Self {
        debug_assert!(version_count >= 1);
        let stride = capacity / version_count.max(1);
        Self {
            label: label.into(),
            stride,
            version_count,
            cursor: 0,
            storage: vec![0.0; (stride * version_count) as usize],
            // Start dirty so the first flush initializes the whole buffer.
            dirty: vec![true; version_count as usize],
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn version_count(&self) -> u32 {
        self.version_count
    }

    /// Slots available to one version.
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Slots allocated so far within one version.
    pub fn allocated(&self) -> u32 {
        self.cursor
    }

    /// Size of the backing GPU buffer in bytes.
    pub fn byte_size(&self) -> u64 {
        (self.stride as u64) * (self.version_count as u64) * 4
    }

    /// Reserve `size` slots in every version. Offsets are never reused.
    pub fn allocate(&mut self, size: u32) -> Result<SlotHandle> {
        let end = self.cursor + size;
        if end > self.stride {
            return Err(Error::CapacityExceeded {
                label: self.label.clone(),
                needed: end,
                capacity: self.stride,
            });
        }
        let handle = SlotHandle(self.cursor);
        self.cursor = end;
        Ok(handle)
    }

    fn float_index(&self, handle: SlotHandle, size: u32, version: u32) -> Result<usize> {
        if version >= self.version_count {
            return Err(Error::InvalidHandle("pack version"));
        }
        if handle.0 + size > self.cursor {
            return Err(Error::InvalidHandle("pack slot"));
        }
        Ok((version * self.stride + handle.0) as usize)
    }

    /// Scalars broadcast into all four lanes of their group, so scalar and
    /// vector writes share one layout rule.
    pub fn write_scalar(&mut self, handle: SlotHandle, value: f32, version: u32) -> Result<()> {
        let at = self.float_index(handle, 4, version)?;
        self.storage[at..at + 4].fill(value);
        self.dirty[version as usize] = true;
        Ok(())
    }

    pub fn write_vec4(&mut self, handle: SlotHandle, value: Vec4, version: u32) -> Result<()> {
        let at = self.float_index(handle, 4, version)?;
        self.storage[at..at + 4].copy_from_slice(&value.to_array());
        self.dirty[version as usize] = true;
        Ok(())
    }

    /// Column-major, one 4-float column per slot group, exactly the layout
    /// the GPU consumes. No transposition anywhere.
    pub fn write_mat4(&mut self, handle: SlotHandle, value: &Mat4, version: u32) -> Result<()> {
        let at = self.float_index(handle, 16, version)?;
        self.storage[at..at + 16].copy_from_slice(&value.to_cols_array());
        self.dirty[version as usize] = true;
        Ok(())
    }

    pub fn read_scalar(&self, handle: SlotHandle, version: u32) -> Result<f32> {
        let at = self.float_index(handle, 4, version)?;
        Ok(self.storage[at])
    }

    pub fn read_vec4(&self, handle: SlotHandle, version: u32) -> Result<Vec4> {
        let at = self.float_index(handle, 4, version)?;
        Ok(Vec4::from_slice(&self.storage[at..at + 4]))
    }

    pub fn read_mat4(&self, handle: SlotHandle, version: u32) -> Result<Mat4> {
        let at = self.float_index(handle, 16, version)?;
        let mut cols = [0.0; 16];
        cols.copy_from_slice(&self.storage[at..at + 16]);
        Ok(Mat4::from_cols_array(&cols))
    }

    /// Raw view of `count` slots, mainly for layout inspection.
    pub fn read_slots(&self, handle: SlotHandle, count: u32, version: u32) -> Result<&[f32]> {
        let at = self.float_index(handle, count, version)?;
        Ok(&self.storage[at..at + count as usize])
    }

    /// Versions written since the last flush, clearing the marks.
    pub fn take_dirty(&mut self) -> Vec<u32> {
        let mut out = Vec::new();
        for (v, flag) in self.dirty.iter_mut().enumerate() {
            if *flag {
                out.push(v as u32);
                *flag = false;
            }
        }
        out
    }

    pub fn has_dirty(&self) -> bool {
        self.dirty.iter().any(|d| *d)
    }

    /// Upload each dirty version's full byte range into `buffer`.
    pub fn flush(&mut self, gpu: &GpuContext, buffer: &wgpu::Buffer) {
        let stride = self.stride as usize;
        for version in self.take_dirty() {
            let start = version as usize * stride;
            let bytes = bytemuck::cast_slice(&self.storage[start..start + stride]);
            gpu.write_buffer(buffer, (start * 4) as u64, bytes);
            log::trace!(
                "uniform pack '{}': uploaded version {version} ({} bytes)",
                self.label,
                bytes.len()
            );
        }
    }
}
