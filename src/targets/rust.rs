//! Translation to a standalone Rust program.
use super::{unsigned_delta, Target};
use crate::{
    ir::Op,
    vm::{BoundsPolicy, CellWidth, Config},
};

pub struct Rust;

const HELPERS: &str = r#"fn bounds(what: &str) -> ! {
    let _ = std::io::stdout().flush();
    eprintln!("Bounds error: {what}");
    std::process::exit(1)
}

fn put(out: &mut impl Write, c: Cell) {
    let ch = char::from_u32(c as u32).unwrap_or(char::REPLACEMENT_CHARACTER);
    let _ = write!(out, "{ch}");
}

fn get(out: &mut impl Write, input: &mut impl Iterator<Item = std::io::Result<u8>>) -> Cell {
    let _ = out.flush();
    let Some(Ok(first)) = input.next() else {
        return 0;
    };
    let (mut code, extra) = match first {
        0xF0.. => ((first & 0x07) as u32, 3),
        0xE0.. => ((first & 0x0F) as u32, 2),
        0xC0.. => ((first & 0x1F) as u32, 1),
        _ => (first as u32, 0),
    };
    for _ in 0..extra {
        match input.next() {
            Some(Ok(b)) => code = (code << 6) | (b & 0x3F) as u32,
            _ => break,
        }
    }
    code as Cell
}

"#;

impl Rust {
    fn cell_type(width: CellWidth) -> &'static str {
        match width {
            CellWidth::Eight => "u8",
            CellWidth::Sixteen => "u16",
            CellWidth::ThirtyTwo => "i32",
        }
    }

    fn shift(bounds: BoundsPolicy) -> &'static str {
        match bounds {
            BoundsPolicy::Wrap => {
                r#"fn shift(p: usize, d: isize) -> usize {
    (p as isize + d).rem_euclid(TAPE_SIZE as isize) as usize
}

"#
            }
            BoundsPolicy::Fatal => {
                r#"fn shift(p: usize, d: isize) -> usize {
    let q = p as isize + d;
    if q < 0 {
        bounds("the data pointer moved below cell 0")
    }
    if q >= TAPE_SIZE as isize {
        bounds("the data pointer moved past the last cell")
    }
    q as usize
}

"#
            }
        }
    }

    fn scans(bounds: BoundsPolicy) -> &'static str {
        match bounds {
            BoundsPolicy::Wrap => {
                r#"fn scan_right(tape: &[Cell], p: usize) -> usize {
    if let Some(i) = tape[p..].iter().position(|c| *c == 0) {
        return p + i;
    }
    match tape[..p].iter().position(|c| *c == 0) {
        Some(i) => i,
        None => bounds("no cell on the tape is zero"),
    }
}

fn scan_left(tape: &[Cell], p: usize) -> usize {
    if let Some(i) = tape[..=p].iter().rposition(|c| *c == 0) {
        return i;
    }
    match tape[p + 1..].iter().rposition(|c| *c == 0) {
        Some(i) => p + 1 + i,
        None => bounds("no cell on the tape is zero"),
    }
}

"#
            }
            BoundsPolicy::Fatal => {
                r#"fn scan_right(tape: &[Cell], p: usize) -> usize {
    match tape[p..].iter().position(|c| *c == 0) {
        Some(i) => p + i,
        None => bounds("the data pointer moved past the last cell"),
    }
}

fn scan_left(tape: &[Cell], p: usize) -> usize {
    match tape[..=p].iter().rposition(|c| *c == 0) {
        Some(i) => i,
        None => bounds("the data pointer moved below cell 0"),
    }
}

"#
            }
        }
    }
}

impl Target for Rust {
    fn name(&self) -> &'static str {
        "Rust"
    }

    fn extension(&self) -> &'static str {
        "rs"
    }

    fn prologue(&self, config: &Config) -> String {
        let mut result = String::from(
            "#![allow(dead_code, unused_imports, unused_mut, unused_variables)]\nuse std::io::{Read, Write};\n\n",
        );
        result += &format!(
            "type Cell = {};\nconst TAPE_SIZE: usize = {};\n\n",
            Self::cell_type(config.cell_width),
            config.tape_size.max(1)
        );
        result += HELPERS;
        result += Self::shift(config.bounds);
        result += Self::scans(config.bounds);
        result += r#"fn main() {
    let mut tape: Vec<Cell> = vec![0; TAPE_SIZE];
    let mut p: usize = 0;
    let mut out = std::io::stdout().lock();
    let mut input = std::io::stdin().lock().bytes();
"#;
        result
    }

    fn epilogue(&self, _config: &Config) -> String {
        "    let _ = out.flush();\n}\n".to_string()
    }

    fn op(&self, op: &Op, config: &Config) -> String {
        match *op {
            Op::Address(d) => format!("p = shift(p, {d});"),
            Op::Data(d) => match config.cell_width {
                CellWidth::ThirtyTwo => format!("tape[p] = tape[p].wrapping_add({d});"),
                width => format!(
                    "tape[p] = tape[p].wrapping_add({});",
                    unsigned_delta(d, width.bits())
                ),
            },
            Op::Output => "put(&mut out, tape[p]);".to_string(),
            Op::Input => "tape[p] = get(&mut out, &mut input);".to_string(),
            Op::SetZero => "tape[p] = 0;".to_string(),
            Op::ScanZeroLeft => "p = scan_left(&tape, p);".to_string(),
            Op::ScanZeroRight => "p = scan_right(&tape, p);".to_string(),
            Op::LoopStart(_) => "while tape[p] != 0 {".to_string(),
            Op::LoopEnd(_) => "}".to_string(),
            Op::Breakpoint => "// breakpoint".to_string(),
        }
    }
}
