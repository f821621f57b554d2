//! # Frame Strings
//!
//! Short-lived text whose bytes live in a [`LinearAllocator`].
//!
//! A [`StringArena`] binds one allocator; every string it builds draws
//! exactly the bytes it needs from that allocator and is never freed on its
//! own. All of them go away together when the allocator is released at the
//! end of the cycle, and the borrow checker makes sure none is used after
//! that.
//!
//! ```rust
//! use kiln_core::{LinearAllocator, StringArena};
//!
//! let mut arena = LinearAllocator::new(1024)?;
//! {
//!     let strings = StringArena::new(&arena);
//!     let fps = strings.format(format_args!("{:.1}", 59.94))?;
//!     let label = strings.concat("FPS: ", &fps)?;
//!     assert_eq!(label, "FPS: 59.9");
//! }
//! arena.release();
//! # Ok::<(), kiln_core::MemoryError>(())
//! ```

#![allow(unsafe_code)]

use std::ffi::CStr;
use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::mem;
use std::ops::{Deref, Index};
use std::ptr;

use super::error::{MemoryError, MemoryResult};
use super::linear::LinearAllocator;

/// Immutable text borrowed from a [`LinearAllocator`].
///
/// The empty string owns no storage: [`as_ptr`](Self::as_ptr) is null if and
/// only if the length is zero. Strings are deliberately not `Clone`; a copy
/// must take fresh bytes from the arena through [`StringArena::copy`].
#[derive(Default)]
pub struct FrameString<'a> {
    text: Option<&'a str>,
}

impl<'a> FrameString<'a> {
    /// Returns the canonical empty string. Allocates nothing.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { text: None }
    }

    /// Length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.map_or(0, str::len)
    }

    /// Returns true for the empty string.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.text.is_none()
    }

    /// The text, valid until the backing allocator is released.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'a str {
        self.text.unwrap_or("")
    }

    /// The raw bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.as_str().as_bytes()
    }

    /// Address of the first byte inside the arena, null when empty.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.text.map_or(ptr::null(), str::as_ptr)
    }

    /// Byte at `index`, or `None` past the end.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<u8> {
        self.as_bytes().get(index).copied()
    }

    /// Moves the text out, leaving `self` as the empty string.
    #[inline]
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Wraps bytes just written into the arena.
    ///
    /// # Safety
    ///
    /// `bytes` must be valid UTF-8.
    unsafe fn from_arena_bytes(bytes: &'a [u8]) -> Self {
        if bytes.is_empty() {
            Self::new()
        } else {
            Self {
                text: Some(std::str::from_utf8_unchecked(bytes)),
            }
        }
    }
}

impl Deref for FrameString<'_> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for FrameString<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<[u8]> for FrameString<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Checked byte access. Panics when `index >= len()`.
impl Index<usize> for FrameString<'_> {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.as_bytes()[index]
    }
}

impl fmt::Display for FrameString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FrameString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl Hash for FrameString<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialEq<FrameString<'_>> for FrameString<'_> {
    fn eq(&self, other: &FrameString<'_>) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for FrameString<'_> {}

impl PartialEq<str> for FrameString<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for FrameString<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<String> for FrameString<'_> {
    fn eq(&self, other: &String) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Compares against the bytes before the terminator, never past it.
impl PartialEq<CStr> for FrameString<'_> {
    fn eq(&self, other: &CStr) -> bool {
        self.as_bytes() == other.to_bytes()
    }
}

impl PartialEq<&CStr> for FrameString<'_> {
    fn eq(&self, other: &&CStr) -> bool {
        self.as_bytes() == other.to_bytes()
    }
}

impl PartialEq<FrameString<'_>> for str {
    fn eq(&self, other: &FrameString<'_>) -> bool {
        other == self
    }
}

impl PartialEq<FrameString<'_>> for &str {
    fn eq(&self, other: &FrameString<'_>) -> bool {
        other == self
    }
}

impl PartialEq<FrameString<'_>> for String {
    fn eq(&self, other: &FrameString<'_>) -> bool {
        other == self
    }
}

impl PartialEq<FrameString<'_>> for CStr {
    fn eq(&self, other: &FrameString<'_>) -> bool {
        other == self
    }
}

/// Factory that builds [`FrameString`]s from one bound allocator.
///
/// Binding is explicit: the context is created with an allocator and can be
/// pointed at another one with
/// [`set_frame_allocator`](Self::set_frame_allocator). Strings already built
/// keep referring to the allocator they came from.
#[derive(Clone, Copy, Debug)]
pub struct StringArena<'a> {
    allocator: &'a LinearAllocator,
}

impl<'a> StringArena<'a> {
    /// Binds a new context to `allocator`.
    #[inline]
    #[must_use]
    pub const fn new(allocator: &'a LinearAllocator) -> Self {
        Self { allocator }
    }

    /// Rebinds the context. Later strings draw from `allocator`.
    #[inline]
    pub fn set_frame_allocator(&mut self, allocator: &'a LinearAllocator) {
        self.allocator = allocator;
    }

    /// The currently bound allocator.
    #[inline]
    #[must_use]
    pub const fn allocator(&self) -> &'a LinearAllocator {
        self.allocator
    }

    /// Copies `text` into the arena. Empty text allocates nothing.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ArenaExhausted`] if the bound allocator is full.
    pub fn make_string(&self, text: &str) -> MemoryResult<FrameString<'a>> {
        self.concat_all(&[text])
    }

    /// Copies `source` into a fresh region; the two never share bytes.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ArenaExhausted`] if the bound allocator is full.
    pub fn copy(&self, source: &FrameString<'_>) -> MemoryResult<FrameString<'a>> {
        self.make_string(source.as_str())
    }

    /// Builds `lhs` followed by `rhs` in one region of exactly
    /// `lhs.len() + rhs.len()` bytes. Neither operand changes.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ArenaExhausted`] if the bound allocator is full.
    pub fn concat(&self, lhs: &str, rhs: &str) -> MemoryResult<FrameString<'a>> {
        self.concat_all(&[lhs, rhs])
    }

    /// Joins every part, in order, into one region sized to fit.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ArenaExhausted`] if the bound allocator is full.
    pub fn concat_all(&self, parts: &[&str]) -> MemoryResult<FrameString<'a>> {
        let total = parts
            .iter()
            .try_fold(0usize, |total, part| total.checked_add(part.len()))
            .ok_or(MemoryError::ArenaExhausted {
                requested: usize::MAX,
                remaining: self.allocator.remaining(),
                capacity: self.allocator.capacity(),
            })?;
        if total == 0 {
            return Ok(FrameString::new());
        }

        let bytes = self.allocator.allocate(total)?;
        let mut cursor = 0;
        for part in parts {
            bytes[cursor..cursor + part.len()].copy_from_slice(part.as_bytes());
            cursor += part.len();
        }

        // SAFETY: the region is filled end to end with whole `str`s.
        Ok(unsafe { FrameString::from_arena_bytes(bytes) })
    }

    /// Formats `args` into a region of exactly the formatted length.
    ///
    /// Formatting runs twice: once to measure, once to write.
    ///
    /// # Errors
    ///
    /// * [`MemoryError::ArenaExhausted`] if the bound allocator is full.
    /// * [`MemoryError::Format`] if a `Display` impl fails or writes a
    ///   different length on the second pass. The measured bytes stay used
    ///   until the next release.
    pub fn format(&self, args: fmt::Arguments<'_>) -> MemoryResult<FrameString<'a>> {
        let mut counter = ByteCounter(0);
        counter.write_fmt(args).map_err(|_| MemoryError::Format)?;
        if counter.0 == 0 {
            return Ok(FrameString::new());
        }

        let bytes = self.allocator.allocate(counter.0)?;
        let mut writer = SliceWriter { buf: bytes, len: 0 };
        writer.write_fmt(args).map_err(|_| MemoryError::Format)?;
        if writer.len != counter.0 {
            return Err(MemoryError::Format);
        }

        // SAFETY: the writer copied whole `str`s and filled every byte.
        Ok(unsafe { FrameString::from_arena_bytes(writer.buf) })
    }
}

/// Measures formatted output without storing it.
struct ByteCounter(usize);

impl fmt::Write for ByteCounter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

/// Writes formatted output into a fixed slice.
struct SliceWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len.checked_add(s.len()).ok_or(fmt::Error)?;
        let dest = self.buf.get_mut(self.len..end).ok_or(fmt::Error)?;
        dest.copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}
