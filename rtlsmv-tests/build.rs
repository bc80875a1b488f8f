use rtlsmv::*;

use std::env;
use std::fs::File;
use std::path::Path;

fn main() -> std::result::Result<(), Error> {
    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("designs.smv");
    let file = File::create(&dest_path).unwrap();

    let c = Context::new();

    mux_test_module(&c);
    pmux_test_module(&c);
    memory_test_module(&c);
    round_trip_module(&c);
    register_chunks_module(&c);
    assert_test_module(&c);

    smv::generate_design(&c, &smv::Options::default(), file)?;

    Ok(())
}

fn mux_test_module<'a>(c: &'a Context<'a>) -> &Module<'a> {
    let m = c.module("mux_test_module");

    let clk = m.input("clk", 1);
    let s = m.input("s", 1);
    let r = m.output("r", 1);
    let y = m.wire("$mux$y", 1);
    m.add_cell(
        "$mux$1",
        CellKind::Mux {
            a: Const::from_u64(0, 1).into(),
            b: Const::from_u64(1, 1).into(),
            s: s.into(),
            y: y.into(),
        },
    );
    m.add_cell(
        "$dff$2",
        CellKind::Dff {
            clk: clk.into(),
            clk_polarity: true,
            d: y.into(),
            q: r.into(),
        },
    );

    m
}

fn pmux_test_module<'a>(c: &'a Context<'a>) -> &Module<'a> {
    let m = c.module("pmux_test_module");

    let clk = m.input("clk", 1);
    let s = m.input("s", 2);
    let r = m.output("r", 2);
    let y = m.wire("$pmux$y", 2);
    // Case 0 is 2'b01, case 1 is 2'b10, default is 2'b11
    m.add_cell(
        "$pmux$1",
        CellKind::Pmux {
            a: Const::from_u64(0b11, 2).into(),
            b: Const::from_u64(0b10_01, 4).into(),
            s: s.into(),
            y: y.into(),
        },
    );
    m.add_cell(
        "$dff$2",
        CellKind::Dff {
            clk: clk.into(),
            clk_polarity: true,
            d: y.into(),
            q: r.into(),
        },
    );

    m
}

fn memory_test_module<'a>(c: &'a Context<'a>) -> &Module<'a> {
    let m = c.module("memory_test_module");

    let clk = m.input("clk", 1);
    let en1 = m.input("en1", 1);
    let en2 = m.input("en2", 1);
    let _ = m.memory("\\mem", 4, 4, 0);
    for (i, &(name, en, data)) in [("$memwr$1", en1, 5), ("$memwr$2", en2, 6)].iter().enumerate() {
        m.add_cell(
            name,
            CellKind::MemWr(MemWr {
                memid: "\\mem".into(),
                abits: 2,
                clk: clk.into(),
                clk_enable: true,
                clk_polarity: true,
                priority: i as i64,
                addr: Const::from_u64(1, 2).into(),
                data: Const::from_u64(data, 4).into(),
                en: SigSpec::from_bits(vec![SigBit::Wire { wire: en, offset: 0 }; 4]),
            }),
        );
    }

    m
}

fn round_trip_module<'a>(c: &'a Context<'a>) -> &Module<'a> {
    let m = c.module("round_trip_module");

    let clk = m.input("clk", 1);
    let d = m.input("d", 1);
    let r = m.output("r", 1);
    r.set_init(Const::from_u64(1, 1));
    m.add_cell(
        "$dff$1",
        CellKind::Dff {
            clk: clk.into(),
            clk_polarity: true,
            d: d.into(),
            q: r.into(),
        },
    );

    m
}

fn register_chunks_module<'a>(c: &'a Context<'a>) -> &Module<'a> {
    let m = c.module("register_chunks_module");

    let clk = m.input("clk", 1);
    let arst = m.input("arst", 1);
    let d = m.input("d", 4);
    let lo = m.output("lo", 2);
    let hi = m.output("hi", 2);
    let mut q = SigSpec::from(lo);
    q.append(&hi.into());
    m.add_cell(
        "$adff$1",
        CellKind::Adff {
            clk: clk.into(),
            clk_polarity: true,
            arst: arst.into(),
            arst_polarity: true,
            arst_value: Const::from_u64(0b1010, 4),
            d: d.into(),
            q,
        },
    );

    m
}

fn assert_test_module<'a>(c: &'a Context<'a>) -> &Module<'a> {
    let m = c.module("assert_test_module");

    let a = m.input("a", 4);
    let b = m.input("b", 4);
    let en = m.input("en", 1);
    let nonzero = m.wire("$ne$y", 1);
    let less = m.wire("$lt$y", 1);
    m.add_cell(
        "$ne$1",
        CellKind::Binary {
            op: BinaryOp::Ne,
            a: a.into(),
            b: Const::from_u64(0, 4).into(),
            a_signed: false,
            b_signed: false,
            y: nonzero.into(),
        },
    );
    m.add_cell(
        "$lt$2",
        CellKind::Binary {
            op: BinaryOp::Lt,
            a: a.into(),
            b: b.into(),
            a_signed: true,
            b_signed: true,
            y: less.into(),
        },
    );
    m.add_cell(
        "$assert$3",
        CellKind::Assert {
            a: nonzero.into(),
            en: Const::from_u64(1, 1).into(),
        },
    );
    m.add_cell(
        "$assert$4",
        CellKind::Assert {
            a: less.into(),
            en: en.into(),
        },
    );

    m
}
