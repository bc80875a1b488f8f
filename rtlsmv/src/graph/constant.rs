use std::fmt;

/// The value of a single constant bit.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum State {
    S0,
    S1,
    /// Undefined
    Sx,
    /// High impedance
    Sz,
}

impl State {
    pub fn from_char(c: char) -> Option<State> {
        match c {
            '0' => Some(State::S0),
            '1' => Some(State::S1),
            'x' | 'X' => Some(State::Sx),
            'z' | 'Z' => Some(State::Sz),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            State::S0 => '0',
            State::S1 => '1',
            State::Sx => 'x',
            State::Sz => 'z',
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        if value {
            State::S1
        } else {
            State::S0
        }
    }
}

/// A constant bit-string, stored least significant bit first.
///
/// `Const` is used both for constant signal chunks and for cell parameters and wire attributes.
/// Its textual form (see [`Const::as_string`] and the `FromStr`-like [`Const::from_bit_str`]) is most significant bit first, matching how netlists write them.
///
/// # Examples
///
/// ```
/// use rtlsmv::*;
///
/// let c = Const::from_u64(5, 4);
/// assert_eq!(c.as_string(), "0101");
/// assert_eq!(c.as_u64(), Some(5));
/// assert_eq!(Const::from_bit_str("0101"), Some(c));
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Const {
    pub bits: Vec<State>,
}

impl Const {
    pub fn new(bits: Vec<State>) -> Const {
        Const { bits }
    }

    pub fn from_u64(value: u64, width: u32) -> Const {
        Const {
            bits: (0..width)
                .map(|i| State::from(i < 64 && (value >> i) & 1 == 1))
                .collect(),
        }
    }

    pub fn from_bool(value: bool) -> Const {
        Const {
            bits: vec![State::from(value)],
        }
    }

    /// Parses an MSB-first string of `0`, `1`, `x` and `z` characters.
    ///
    /// Returns `None` if any other character is present or the string is empty.
    pub fn from_bit_str(s: &str) -> Option<Const> {
        if s.is_empty() {
            return None;
        }
        let bits = s.chars().rev().map(State::from_char).collect::<Option<Vec<_>>>()?;
        Some(Const { bits })
    }

    pub fn width(&self) -> u32 {
        self.bits.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn is_fully_def(&self) -> bool {
        self.bits.iter().all(|&b| b == State::S0 || b == State::S1)
    }

    /// MSB-first string form.
    pub fn as_string(&self) -> String {
        self.bits.iter().rev().map(|b| b.as_char()).collect()
    }

    pub fn as_bool(&self) -> bool {
        self.bits.iter().any(|&b| b == State::S1)
    }

    /// Interprets the fully-defined low 64 bits as an unsigned integer.
    ///
    /// Returns `None` if any bit is undefined or a set bit lies above bit 63.
    pub fn as_u64(&self) -> Option<u64> {
        let mut value = 0u64;
        for (i, &b) in self.bits.iter().enumerate() {
            match b {
                State::S0 => (),
                State::S1 if i < 64 => value |= 1 << i,
                _ => return None,
            }
        }
        Some(value)
    }

    pub fn extract(&self, offset: u32, width: u32) -> Const {
        Const {
            bits: (offset..offset + width)
                .map(|i| self.bits.get(i as usize).copied().unwrap_or(State::S0))
                .collect(),
        }
    }

    /// Zero-extends or truncates to `width` bits.
    pub fn resized(&self, width: u32) -> Const {
        self.extract(0, width)
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'{}", self.width(), self.as_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u64_is_lsb_first() {
        let c = Const::from_u64(6, 3);
        assert_eq!(c.bits, vec![State::S0, State::S1, State::S1]);
        assert_eq!(c.as_string(), "110");
    }

    #[test]
    fn bit_str_rejects_garbage() {
        assert_eq!(Const::from_bit_str(""), None);
        assert_eq!(Const::from_bit_str("10a"), None);
        assert_eq!(Const::from_bit_str("1x0z").unwrap().as_string(), "1x0z");
    }

    #[test]
    fn as_u64_requires_defined_bits() {
        assert_eq!(Const::from_bit_str("1010").unwrap().as_u64(), Some(10));
        assert_eq!(Const::from_bit_str("1x10").unwrap().as_u64(), None);
    }

    #[test]
    fn extract_pads_with_zero() {
        let c = Const::from_u64(0b1011, 4);
        assert_eq!(c.extract(2, 4).as_string(), "0010");
        assert_eq!(c.resized(2).as_string(), "11");
    }
}
