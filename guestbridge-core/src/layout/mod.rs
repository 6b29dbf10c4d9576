//! Byte-layout reader for guest linear memory.
//!
//! Responsibilities:
//! - Describe a record's fields once, in order, and derive every offset, the padding between
//!   fields and the record stride from that description ([`RecordBuilder`]).
//! - Read little-endian scalars, guest pointers, strings, optionals and `(ptr, count)` arrays out
//!   of a borrowed memory view ([`GuestMemory`]), bounds-checking every access.
//!
//! Layout rules follow the guest's C ABI: every scalar is aligned to its own size, pointers and
//! `usize` fields are as wide as the guest's address space, a record is aligned to its most
//! aligned field and its size is rounded up to that alignment.
//!
//! An optional field is stored inline as `{ value: T, present: bool }` and padded to `T`'s
//! alignment; absence is never inferred from a sentinel value.

pub mod records;

use crate::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};

/// Width of a guest address (and of `usize`-class fields).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PointerWidth {
    #[default]
    W32,
    W64,
}

impl PointerWidth {
    pub const fn bytes(self) -> u64 {
        match self {
            PointerWidth::W32 => 4,
            PointerWidth::W64 => 8,
        }
    }

    pub const fn bits(self) -> u32 {
        match self {
            PointerWidth::W32 => 32,
            PointerWidth::W64 => 64,
        }
    }
}

impl TryFrom<u32> for PointerWidth {
    type Error = String;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            32 => Ok(PointerWidth::W32),
            64 => Ok(PointerWidth::W64),
            other => Err(format!("unsupported pointer width {other} (expected 32 or 64)")),
        }
    }
}

impl From<PointerWidth> for u32 {
    fn from(width: PointerWidth) -> u32 {
        width.bits()
    }
}

/// Round `offset` up to the next multiple of `align` (a power of two).
pub const fn align_to(offset: u64, align: u64) -> u64 {
    (offset + align - 1) & !(align - 1)
}

/// Size and alignment of one field or of a whole record.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FieldLayout {
    pub size: u64,
    pub align: u64,
}

impl FieldLayout {
    pub const U8: Self = Self::scalar(1);
    pub const BOOL: Self = Self::scalar(1);
    pub const U16: Self = Self::scalar(2);
    pub const U32: Self = Self::scalar(4);
    pub const I32: Self = Self::scalar(4);
    pub const F32: Self = Self::scalar(4);
    pub const U64: Self = Self::scalar(8);
    pub const F64: Self = Self::scalar(8);

    pub const fn scalar(size: u64) -> Self {
        Self { size, align: size }
    }

    pub const fn pointer(width: PointerWidth) -> Self {
        Self::scalar(width.bytes())
    }

    /// `{ value: self, present: bool }`, padded to `self`'s alignment.
    pub const fn optional(self) -> Self {
        Self {
            size: align_to(self.size + 1, self.align),
            align: self.align,
        }
    }

    /// Storage for an untagged union of `arms`.
    pub fn union(arms: &[FieldLayout]) -> Self {
        let align = arms.iter().map(|a| a.align).max().unwrap_or(1);
        let size = arms.iter().map(|a| a.size).max().unwrap_or(0);
        Self {
            size: align_to(size, align),
            align,
        }
    }
}

/// Offsets of a `(ptr, count)` pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SliceOffsets {
    pub ptr: u64,
    pub len: u64,
}

impl SliceOffsets {
    /// The same pair, relative to a record placed at `base`.
    pub fn shifted(self, base: u64) -> Self {
        Self {
            ptr: base + self.ptr,
            len: base + self.len,
        }
    }
}

/// Offsets of an inline optional.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OptionalOffsets {
    pub value: u64,
    pub present: u64,
}

impl OptionalOffsets {
    pub fn shifted(self, base: u64) -> Self {
        Self {
            value: base + self.value,
            present: base + self.present,
        }
    }
}

/// Appends fields in declaration order and hands back each field's offset.
#[derive(Debug)]
pub struct RecordBuilder {
    width: PointerWidth,
    offset: u64,
    align: u64,
}

impl RecordBuilder {
    pub fn new(width: PointerWidth) -> Self {
        Self {
            width,
            offset: 0,
            align: 1,
        }
    }

    pub fn field(&mut self, field: FieldLayout) -> u64 {
        let at = align_to(self.offset, field.align);
        self.offset = at + field.size;
        self.align = self.align.max(field.align);
        at
    }

    pub fn u8(&mut self) -> u64 {
        self.field(FieldLayout::U8)
    }

    pub fn bool(&mut self) -> u64 {
        self.field(FieldLayout::BOOL)
    }

    pub fn u16(&mut self) -> u64 {
        self.field(FieldLayout::U16)
    }

    pub fn u32(&mut self) -> u64 {
        self.field(FieldLayout::U32)
    }

    pub fn i32(&mut self) -> u64 {
        self.field(FieldLayout::I32)
    }

    pub fn f32(&mut self) -> u64 {
        self.field(FieldLayout::F32)
    }

    pub fn u64(&mut self) -> u64 {
        self.field(FieldLayout::U64)
    }

    pub fn f64(&mut self) -> u64 {
        self.field(FieldLayout::F64)
    }

    /// Guest pointer.
    pub fn ptr(&mut self) -> u64 {
        self.field(FieldLayout::pointer(self.width))
    }

    /// `usize`-class count.
    pub fn usize(&mut self) -> u64 {
        self.field(FieldLayout::pointer(self.width))
    }

    pub fn slice(&mut self) -> SliceOffsets {
        let ptr = self.ptr();
        let len = self.usize();
        SliceOffsets { ptr, len }
    }

    pub fn optional(&mut self, inner: FieldLayout) -> OptionalOffsets {
        let value = self.field(inner.optional());
        OptionalOffsets {
            value,
            present: value + inner.size,
        }
    }

    pub fn union(&mut self, arms: &[FieldLayout]) -> u64 {
        self.field(FieldLayout::union(arms))
    }

    /// Final size (rounded up to the record alignment) and alignment.
    pub fn finish(self) -> FieldLayout {
        FieldLayout {
            size: align_to(self.offset, self.align),
            align: self.align,
        }
    }
}

/// A read-only view of guest memory for the duration of one boundary call.
///
/// Never store one of these across calls: the guest may grow its memory in between, which
/// invalidates the underlying slice.
#[derive(Copy, Clone, Debug)]
pub struct GuestMemory<'a> {
    bytes: &'a [u8],
    width: PointerWidth,
}

impl<'a> GuestMemory<'a> {
    pub fn new(bytes: &'a [u8], width: PointerWidth) -> Self {
        Self { bytes, width }
    }

    pub fn width(&self) -> PointerWidth {
        self.width
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: u64, len: u64) -> BridgeResult<&'a [u8]> {
        let out_of_bounds = || BridgeError::MemoryBounds {
            offset,
            len,
            memory_size: self.size(),
        };
        let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
        if end > self.size() {
            return Err(out_of_bounds());
        }
        Ok(&self.bytes[offset as usize..end as usize])
    }

    fn array<const N: usize>(&self, offset: u64) -> BridgeResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N as u64)?);
        Ok(out)
    }

    pub fn read_u8(&self, offset: u64) -> BridgeResult<u8> {
        Ok(self.array::<1>(offset)?[0])
    }

    pub fn read_bool(&self, offset: u64) -> BridgeResult<bool> {
        Ok(self.read_u8(offset)? != 0)
    }

    pub fn read_u16(&self, offset: u64) -> BridgeResult<u16> {
        self.array(offset).map(u16::from_le_bytes)
    }

    pub fn read_u32(&self, offset: u64) -> BridgeResult<u32> {
        self.array(offset).map(u32::from_le_bytes)
    }

    pub fn read_i32(&self, offset: u64) -> BridgeResult<i32> {
        self.array(offset).map(i32::from_le_bytes)
    }

    pub fn read_u64(&self, offset: u64) -> BridgeResult<u64> {
        self.array(offset).map(u64::from_le_bytes)
    }

    pub fn read_i64(&self, offset: u64) -> BridgeResult<i64> {
        self.array(offset).map(i64::from_le_bytes)
    }

    pub fn read_f32(&self, offset: u64) -> BridgeResult<f32> {
        self.array(offset).map(f32::from_le_bytes)
    }

    pub fn read_f64(&self, offset: u64) -> BridgeResult<f64> {
        self.array(offset).map(f64::from_le_bytes)
    }

    /// A guest pointer, widened to `u64`.
    pub fn read_ptr(&self, offset: u64) -> BridgeResult<u64> {
        match self.width {
            PointerWidth::W32 => self.read_u32(offset).map(u64::from),
            PointerWidth::W64 => self.read_u64(offset),
        }
    }

    pub fn read_usize(&self, offset: u64) -> BridgeResult<u64> {
        self.read_ptr(offset)
    }

    pub fn read_optional<T>(
        &self,
        at: OptionalOffsets,
        read: impl FnOnce(&Self, u64) -> BridgeResult<T>,
    ) -> BridgeResult<Option<T>> {
        if self.read_bool(at.present)? {
            read(self, at.value).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn read_optional_u32(&self, at: OptionalOffsets) -> BridgeResult<Option<u32>> {
        self.read_optional(at, |m, off| m.read_u32(off))
    }

    /// UTF-8 string given as `(ptr, len)`.
    pub fn read_str(&self, ptr: u64, len: u64) -> BridgeResult<&'a str> {
        let bytes = self.bytes(ptr, len)?;
        std::str::from_utf8(bytes)
            .map_err(|e| BridgeError::malformed("string", format!("invalid utf-8 at {ptr}: {e}")))
    }

    /// Zero-terminated UTF-8 string; a null pointer reads as `None`.
    pub fn read_c_str(&self, ptr: u64) -> BridgeResult<Option<&'a str>> {
        if ptr == 0 {
            return Ok(None);
        }
        let tail = self.bytes(ptr, self.size().saturating_sub(ptr))?;
        let Some(len) = tail.iter().position(|&b| b == 0) else {
            return Err(BridgeError::malformed(
                "string",
                format!("no terminator after offset {ptr}"),
            ));
        };
        self.read_str(ptr, len as u64).map(Some)
    }

    /// Base offsets of `count` elements of `stride` bytes starting at `ptr`.
    ///
    /// The whole region is bounds-checked up front so a bad count fails before any element is
    /// decoded. `count == 0` yields nothing regardless of `ptr`.
    pub fn elements(
        &self,
        ptr: u64,
        count: u64,
        stride: u64,
    ) -> BridgeResult<impl Iterator<Item = u64> + use<>> {
        if count > 0 {
            let total = count.checked_mul(stride).ok_or(BridgeError::MemoryBounds {
                offset: ptr,
                len: u64::MAX,
                memory_size: self.size(),
            })?;
            self.bytes(ptr, total)?;
        }
        Ok((0..count).map(move |i| ptr + i * stride))
    }

    pub fn read_u32_array(&self, ptr: u64, count: u64) -> BridgeResult<Vec<u32>> {
        self.elements(ptr, count, 4)?
            .map(|at| self.read_u32(at))
            .collect()
    }
}

/// A small guest-memory image for tests, written with the same layouts the decoders read.
#[cfg(test)]
pub(crate) mod testing {
    use super::{OptionalOffsets, PointerWidth, SliceOffsets, align_to};

    pub struct Scratch {
        pub bytes: Vec<u8>,
        pub width: PointerWidth,
        next: u64,
    }

    impl Scratch {
        pub fn new(width: PointerWidth) -> Self {
            // Keep offset 0 unused so a zero pointer always means null.
            Self {
                bytes: vec![0; 4096],
                width,
                next: 16,
            }
        }

        pub fn memory(&self) -> super::GuestMemory<'_> {
            super::GuestMemory::new(&self.bytes, self.width)
        }

        pub fn alloc(&mut self, size: u64, align: u64) -> u64 {
            let at = align_to(self.next, align.max(1));
            self.next = at + size.max(1);
            if self.next as usize > self.bytes.len() {
                self.bytes.resize(self.next as usize + 1024, 0);
            }
            at
        }

        pub fn put(&mut self, at: u64, data: &[u8]) {
            let at = at as usize;
            self.bytes[at..at + data.len()].copy_from_slice(data);
        }

        pub fn put_u8(&mut self, at: u64, v: u8) {
            self.put(at, &[v]);
        }

        pub fn put_bool(&mut self, at: u64, v: bool) {
            self.put_u8(at, v as u8);
        }

        pub fn put_u16(&mut self, at: u64, v: u16) {
            self.put(at, &v.to_le_bytes());
        }

        pub fn put_u32(&mut self, at: u64, v: u32) {
            self.put(at, &v.to_le_bytes());
        }

        pub fn put_i32(&mut self, at: u64, v: i32) {
            self.put(at, &v.to_le_bytes());
        }

        pub fn put_u64(&mut self, at: u64, v: u64) {
            self.put(at, &v.to_le_bytes());
        }

        pub fn put_f32(&mut self, at: u64, v: f32) {
            self.put(at, &v.to_le_bytes());
        }

        pub fn put_f64(&mut self, at: u64, v: f64) {
            self.put(at, &v.to_le_bytes());
        }

        pub fn put_ptr(&mut self, at: u64, v: u64) {
            match self.width {
                PointerWidth::W32 => self.put_u32(at, v as u32),
                PointerWidth::W64 => self.put_u64(at, v),
            }
        }

        pub fn put_slice(&mut self, at: SliceOffsets, ptr: u64, len: u64) {
            self.put_ptr(at.ptr, ptr);
            self.put_ptr(at.len, len);
        }

        pub fn put_opt_u32(&mut self, at: OptionalOffsets, v: Option<u32>) {
            self.put_u32(at.value, v.unwrap_or(0));
            self.put_bool(at.present, v.is_some());
        }

        /// Copy a zero-terminated string into fresh memory and return its address.
        pub fn c_str(&mut self, s: &str) -> u64 {
            let at = self.alloc(s.len() as u64 + 1, 1);
            self.put(at, s.as_bytes());
            self.put_u8(at + s.len() as u64, 0);
            at
        }

        pub fn data(&mut self, data: &[u8]) -> u64 {
            let at = self.alloc(data.len() as u64, 8);
            self.put(at, data);
            at
        }

        pub fn u32_array(&mut self, values: &[u32]) -> u64 {
            let at = self.alloc(values.len() as u64 * 4, 4);
            for (i, v) in values.iter().enumerate() {
                self.put_u32(at + i as u64 * 4, *v);
            }
            at
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Scratch;
    use super::*;

    #[test]
    fn builder_pads_64_bit_fields() {
        let mut b = RecordBuilder::new(PointerWidth::W32);
        assert_eq!(b.ptr(), 0);
        assert_eq!(b.u64(), 8);
        assert_eq!(b.u32(), 16);
        assert_eq!(b.bool(), 20);
        assert_eq!(b.finish(), FieldLayout { size: 24, align: 8 });
    }

    #[test]
    fn pointer_width_changes_offsets() {
        let mut b = RecordBuilder::new(PointerWidth::W64);
        assert_eq!(b.u32(), 0);
        let s = b.slice();
        assert_eq!((s.ptr, s.len), (8, 16));
        assert_eq!(b.finish().size, 24);
    }

    #[test]
    fn optional_places_flag_after_value() {
        let mut b = RecordBuilder::new(PointerWidth::W32);
        b.u8();
        let opt = b.optional(FieldLayout::U32);
        assert_eq!(opt, OptionalOffsets { value: 4, present: 8 });
        assert_eq!(b.finish().size, 12);

        let f64_opt = FieldLayout::F64.optional();
        assert_eq!(f64_opt, FieldLayout { size: 16, align: 8 });
    }

    #[test]
    fn union_takes_largest_arm() {
        let u = FieldLayout::union(&[
            FieldLayout::U32,
            FieldLayout { size: 12, align: 4 },
            FieldLayout { size: 20, align: 8 },
        ]);
        assert_eq!(u, FieldLayout { size: 24, align: 8 });
    }

    #[test]
    fn reads_past_end_fail_cleanly() {
        let bytes = [0u8; 8];
        let mem = GuestMemory::new(&bytes, PointerWidth::W32);
        assert!(mem.read_u32(4).is_ok());
        let err = mem.read_u32(6).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::MemoryBounds {
                offset: 6,
                len: 4,
                memory_size: 8
            }
        ));
        assert!(mem.bytes(u64::MAX, 2).is_err());
    }

    #[test]
    fn c_str_requires_terminator() {
        let mut s = Scratch::new(PointerWidth::W32);
        let at = s.c_str("main");
        assert_eq!(s.memory().read_c_str(at).unwrap(), Some("main"));
        assert_eq!(s.memory().read_c_str(0).unwrap(), None);

        let bytes = *b"abc";
        let mem = GuestMemory::new(&bytes, PointerWidth::W32);
        assert!(matches!(
            mem.read_c_str(1),
            Err(BridgeError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn elements_bounds_check_whole_region() {
        let bytes = [0u8; 32];
        let mem = GuestMemory::new(&bytes, PointerWidth::W32);
        let offsets: Vec<u64> = mem.elements(8, 3, 8).unwrap().collect();
        assert_eq!(offsets, vec![8, 16, 24]);
        assert!(mem.elements(8, 4, 8).is_err());
        assert_eq!(mem.elements(9999, 0, 8).unwrap().count(), 0);
        assert!(mem.elements(0, u64::MAX, 16).is_err());
    }

    #[test]
    fn optional_reads_respect_presence_flag() {
        let mut s = Scratch::new(PointerWidth::W32);
        let at = OptionalOffsets {
            value: 32,
            present: 36,
        };
        s.put_opt_u32(at, None);
        s.put_u32(32, 9);
        assert_eq!(s.memory().read_optional_u32(at).unwrap(), None);
        s.put_opt_u32(at, Some(0));
        assert_eq!(s.memory().read_optional_u32(at).unwrap(), Some(0));
    }

    #[test]
    fn pointer_width_parses_from_bits() {
        assert_eq!(PointerWidth::try_from(64), Ok(PointerWidth::W64));
        assert!(PointerWidth::try_from(16).is_err());
    }
}
