use super::module::*;

use std::hash::{Hash, Hasher};
use std::ptr;

/// A random-access memory declared in a [`Module`], created by [`Module::memory`].
///
/// A memory is an array of `size` words of `width` bits, addressed starting at `start_offset`.
/// It is accessed through `$memrd`, `$memwr` and `$meminit` cells that refer to it by name.
#[must_use]
pub struct Memory<'a> {
    pub(crate) module: &'a Module<'a>,

    pub(crate) name: String,
    pub(crate) width: u32,
    pub(crate) size: u32,
    pub(crate) start_offset: i64,
}

impl<'a> Memory<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &'a Module<'a> {
        self.module
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn start_offset(&self) -> i64 {
        self.start_offset
    }

    /// Number of bits needed to index every word, never less than 1.
    pub fn address_bits(&self) -> u32 {
        let mut bits = 0;
        while (1u64 << bits) < self.size as u64 {
            bits += 1;
        }
        bits.max(1)
    }
}

impl<'a> Eq for &'a Memory<'a> {}

impl<'a> Hash for &'a Memory<'a> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(*self as *const _ as usize)
    }
}

impl<'a> PartialEq for &'a Memory<'a> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(*self, *other)
    }
}
