//! The caller-owned target buffer.
//!
//! Bound values are written directly into a flat byte slice the host
//! allocated and sized according to its own descriptor tree — this crate
//! never owns or allocates the primary storage, only offsets into it (plus
//! whatever heap blocks the [`crate::alloc`] registry tracks for `DYN`
//! fields). All widths are written in host-native byte order: descriptor
//! offsets are meaningful only within a single process anyway, so there is no
//! wire format to be consistent with.

use crate::error::{Error, Result, SourceOrigin};
use crate::span::Span;

pub struct TargetBuffer<'a> {
    bytes: &'a mut [u8],
}

impl<'a> TargetBuffer<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        TargetBuffer { bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn check(&self, offset: usize, width: usize, span: Span, source: SourceOrigin) -> Result<()> {
        if offset.checked_add(width).map(|end| end > self.bytes.len()).unwrap_or(true) {
            return Err(Error::siz(
                format!("write at offset {offset} (width {width}) exceeds target buffer of {} bytes", self.bytes.len()),
                span,
                source,
            ));
        }
        Ok(())
    }

    pub fn write_i8(&mut self, offset: usize, v: i8, span: Span, source: SourceOrigin) -> Result<()> {
        self.check(offset, 1, span, source)?;
        self.bytes[offset] = v as u8;
        Ok(())
    }

    pub fn write_i16(&mut self, offset: usize, v: i16, span: Span, source: SourceOrigin) -> Result<()> {
        self.check(offset, 2, span, source)?;
        self.bytes[offset..offset + 2].copy_from_slice(&v.to_ne_bytes());
        Ok(())
    }

    pub fn write_i32(&mut self, offset: usize, v: i32, span: Span, source: SourceOrigin) -> Result<()> {
        self.check(offset, 4, span, source)?;
        self.bytes[offset..offset + 4].copy_from_slice(&v.to_ne_bytes());
        Ok(())
    }

    pub fn write_i64(&mut self, offset: usize, v: i64, span: Span, source: SourceOrigin) -> Result<()> {
        self.check(offset, 8, span, source)?;
        self.bytes[offset..offset + 8].copy_from_slice(&v.to_ne_bytes());
        Ok(())
    }

    pub fn write_f32(&mut self, offset: usize, v: f32, span: Span, source: SourceOrigin) -> Result<()> {
        self.check(offset, 4, span, source)?;
        self.bytes[offset..offset + 4].copy_from_slice(&v.to_ne_bytes());
        Ok(())
    }

    pub fn write_f64(&mut self, offset: usize, v: f64, span: Span, source: SourceOrigin) -> Result<()> {
        self.check(offset, 8, span, source)?;
        self.bytes[offset..offset + 8].copy_from_slice(&v.to_ne_bytes());
        Ok(())
    }

    /// Writes `value` truncated to `size` bytes (1/2/4, else 8), the common
    /// case for link-role and scalar numeric fields whose width is only
    /// known at runtime via `Descriptor::size`.
    pub fn write_sized(&mut self, offset: usize, size: usize, value: i64, span: Span, source: SourceOrigin) -> Result<()> {
        match size {
            1 => self.write_i8(offset, value as i8, span, source),
            2 => self.write_i16(offset, value as i16, span, source),
            4 => self.write_i32(offset, value as i32, span, source),
            _ => self.write_i64(offset, value, span, source),
        }
    }

    pub fn write_bytes(&mut self, offset: usize, data: &[u8], span: Span, source: SourceOrigin) -> Result<()> {
        self.check(offset, data.len(), span, source)?;
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn read_i64(&self, offset: usize, width: usize) -> Option<i64> {
        if offset + width > self.bytes.len() {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[..width].copy_from_slice(&self.bytes[offset..offset + width]);
        Some(match width {
            1 => self.bytes[offset] as i8 as i64,
            2 => i16::from_ne_bytes(buf[..2].try_into().unwrap()) as i64,
            4 => i32::from_ne_bytes(buf[..4].try_into().unwrap()) as i64,
            8 => i64::from_ne_bytes(buf),
            _ => return None,
        })
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.bytes.get(offset..offset + len)
    }

    /// Overwrites `len` bytes at `offset` with zero. Used by the allocator
    /// registry to securely wipe `PWD`-flagged values before shrinking or
    /// freeing their backing storage.
    pub fn zero_range(&mut self, offset: usize, len: usize) {
        if let Some(slice) = self.bytes.get_mut(offset..offset + len) {
            slice.fill(0);
        }
    }
}
