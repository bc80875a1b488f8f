use super::module::*;
use super::sig::*;

use std::collections::HashMap;

/// Canonicalizes signals through a module's connections.
///
/// Every bit connected (directly or transitively) to another bit is mapped to one representative of its class.
/// Representatives are chosen by a fixed preference: constants, then input ports, then output ports, then public wires, then internal wires.
/// Ties between wires go to the wire created first, then the lowest bit offset.
pub struct SigMap<'a> {
    map: HashMap<SigBit<'a>, SigBit<'a>>,
}

fn rank(bit: &SigBit<'_>) -> (u8, usize, u32) {
    match *bit {
        SigBit::Const(_) => (0, 0, 0),
        SigBit::Wire { wire, offset } => {
            let class = if wire.port_input {
                1
            } else if wire.port_output {
                2
            } else if wire.is_public() {
                3
            } else {
                4
            };
            (class, wire.index, offset)
        }
    }
}

fn find<'a>(parent: &mut HashMap<SigBit<'a>, SigBit<'a>>, bit: SigBit<'a>) -> SigBit<'a> {
    let mut root = bit;
    while let Some(&next) = parent.get(&root) {
        if next == root {
            break;
        }
        root = next;
    }

    // Path compression
    let mut cur = bit;
    while cur != root {
        let next = parent[&cur];
        parent.insert(cur, root);
        cur = next;
    }

    root
}

impl<'a> SigMap<'a> {
    pub fn new(module: &Module<'a>) -> SigMap<'a> {
        let mut parent = HashMap::new();

        for (lhs, rhs) in module.connections.borrow().iter() {
            for (a, b) in lhs.bits().into_iter().zip(rhs.bits()) {
                let a = find(&mut parent, a);
                let b = find(&mut parent, b);
                if a == b {
                    continue;
                }
                let (root, child) = if rank(&a) <= rank(&b) { (a, b) } else { (b, a) };
                parent.insert(root, root);
                parent.insert(child, root);
            }
        }

        let bits = parent.keys().copied().collect::<Vec<_>>();
        let mut map = HashMap::new();
        for bit in bits {
            let root = find(&mut parent, bit);
            if root != bit {
                map.insert(bit, root);
            }
        }

        SigMap { map }
    }

    pub fn apply_bit(&self, bit: SigBit<'a>) -> SigBit<'a> {
        self.map.get(&bit).copied().unwrap_or(bit)
    }

    pub fn apply(&self, sig: &SigSpec<'a>) -> SigSpec<'a> {
        SigSpec::from_bits(sig.bits().into_iter().map(|bit| self.apply_bit(bit)))
    }
}
