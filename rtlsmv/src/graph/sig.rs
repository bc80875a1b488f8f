use super::constant::*;
use super::wire::*;

use std::fmt;

/// A single bit of a signal: either a constant or one bit of a [`Wire`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SigBit<'a> {
    Const(State),
    Wire { wire: &'a Wire<'a>, offset: u32 },
}

impl<'a> SigBit<'a> {
    pub fn wire(&self) -> Option<&'a Wire<'a>> {
        match *self {
            SigBit::Const(_) => None,
            SigBit::Wire { wire, .. } => Some(wire),
        }
    }
}

/// A maximal run of bits that are either all constant or a contiguous slice of one [`Wire`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum SigChunk<'a> {
    Const(Const),
    Wire {
        wire: &'a Wire<'a>,
        offset: u32,
        width: u32,
    },
}

impl<'a> SigChunk<'a> {
    pub fn width(&self) -> u32 {
        match self {
            SigChunk::Const(value) => value.width(),
            SigChunk::Wire { width, .. } => *width,
        }
    }

    /// Returns `true` for a chunk that spans an entire wire.
    pub fn is_whole_wire(&self) -> bool {
        match self {
            SigChunk::Const(_) => false,
            SigChunk::Wire {
                wire,
                offset,
                width,
            } => *offset == 0 && *width == wire.width,
        }
    }
}

/// An ordered list of bits, least significant first, stored as normalized chunks.
///
/// Adjacent bits of the same wire with consecutive offsets are always merged into one chunk, as are adjacent constant bits, so two `SigSpec`s with the same bits compare and hash equal.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct SigSpec<'a> {
    chunks: Vec<SigChunk<'a>>,
    width: u32,
}

impl<'a> SigSpec<'a> {
    pub fn new() -> SigSpec<'a> {
        SigSpec {
            chunks: Vec::new(),
            width: 0,
        }
    }

    pub fn from_bits<I: IntoIterator<Item = SigBit<'a>>>(bits: I) -> SigSpec<'a> {
        let mut ret = SigSpec::new();
        for bit in bits {
            ret.push_bit(bit);
        }
        ret
    }

    pub fn from_wire_slice(wire: &'a Wire<'a>, offset: u32, width: u32) -> SigSpec<'a> {
        SigSpec::from_bits((offset..offset + width).map(|offset| SigBit::Wire { wire, offset }))
    }

    fn push_bit(&mut self, bit: SigBit<'a>) {
        self.width += 1;
        if let Some(last) = self.chunks.last_mut() {
            match (last, bit) {
                (SigChunk::Const(value), SigBit::Const(state)) => {
                    value.bits.push(state);
                    return;
                }
                (
                    SigChunk::Wire {
                        wire: last_wire,
                        offset: last_offset,
                        width: last_width,
                    },
                    SigBit::Wire { wire, offset },
                ) if *last_wire == wire && *last_offset + *last_width == offset => {
                    *last_width += 1;
                    return;
                }
                _ => (),
            }
        }
        self.chunks.push(match bit {
            SigBit::Const(state) => SigChunk::Const(Const::new(vec![state])),
            SigBit::Wire { wire, offset } => SigChunk::Wire {
                wire,
                offset,
                width: 1,
            },
        });
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    pub fn chunks(&self) -> &[SigChunk<'a>] {
        &self.chunks
    }

    pub fn is_chunk(&self) -> bool {
        self.chunks.len() == 1
    }

    pub fn bits(&self) -> Vec<SigBit<'a>> {
        let mut ret = Vec::with_capacity(self.width as usize);
        for chunk in self.chunks.iter() {
            match chunk {
                SigChunk::Const(value) => ret.extend(value.bits.iter().map(|&s| SigBit::Const(s))),
                SigChunk::Wire {
                    wire,
                    offset,
                    width,
                } => ret.extend((*offset..*offset + *width).map(|offset| SigBit::Wire { wire, offset })),
            }
        }
        ret
    }

    pub fn extract(&self, offset: u32, width: u32) -> SigSpec<'a> {
        SigSpec::from_bits(
            self.bits()
                .into_iter()
                .skip(offset as usize)
                .take(width as usize),
        )
    }

    pub fn append(&mut self, other: &SigSpec<'a>) {
        for bit in other.bits() {
            self.push_bit(bit);
        }
    }

    /// Zero-extends or truncates to `width` bits.
    pub fn extend_u0(&mut self, width: u32) {
        if width < self.width {
            *self = self.extract(0, width);
        } else {
            while self.width < width {
                self.push_bit(SigBit::Const(State::S0));
            }
        }
    }

    pub fn is_fully_const(&self) -> bool {
        self.chunks.iter().all(|chunk| matches!(chunk, SigChunk::Const(_)))
    }

    pub fn as_const(&self) -> Option<Const> {
        if !self.is_fully_const() {
            return None;
        }
        let mut ret = Const::default();
        for chunk in self.chunks.iter() {
            if let SigChunk::Const(value) = chunk {
                ret.bits.extend(value.bits.iter().copied());
            }
        }
        Some(ret)
    }
}

impl<'a> From<&'a Wire<'a>> for SigSpec<'a> {
    fn from(wire: &'a Wire<'a>) -> Self {
        SigSpec::from_wire_slice(wire, 0, wire.width)
    }
}

impl<'a> From<Const> for SigSpec<'a> {
    fn from(value: Const) -> Self {
        SigSpec::from_bits(value.bits.into_iter().map(SigBit::Const))
    }
}

impl<'a> From<SigBit<'a>> for SigSpec<'a> {
    fn from(bit: SigBit<'a>) -> Self {
        SigSpec::from_bits(std::iter::once(bit))
    }
}

impl<'a> fmt::Display for SigSpec<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_chunk = |f: &mut fmt::Formatter<'_>, chunk: &SigChunk<'a>| match chunk {
            SigChunk::Const(value) => write!(f, "{}", value),
            SigChunk::Wire {
                wire,
                offset,
                width,
            } => {
                if chunk.is_whole_wire() {
                    write!(f, "{}", wire.name)
                } else if *width == 1 {
                    write!(f, "{}[{}]", wire.name, offset)
                } else {
                    write!(f, "{}[{}:{}]", wire.name, offset + width - 1, offset)
                }
            }
        };
        if self.chunks.len() == 1 {
            return write_chunk(f, &self.chunks[0]);
        }
        write!(f, "{{")?;
        for (i, chunk) in self.chunks.iter().rev().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_chunk(f, chunk)?;
        }
        write!(f, "}}")
    }
}
