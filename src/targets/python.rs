//! Translation to a Python 3 script.
//!
//! Python integers never overflow, so each cell is masked to its width
//! after every change, and 32-bit cells are sign-adjusted to stay signed.
use super::Target;
use crate::{
    ir::Op,
    vm::{BoundsPolicy, CellWidth, Config},
};

pub struct Python;

const HELPERS: &str = r#"def bounds(what):
    sys.stdout.flush()
    sys.stderr.write("Bounds error: " + what + "\n")
    sys.exit(1)


def put(cell):
    code = cell & 0xFFFFFFFF
    if code > 0x10FFFF or 0xD800 <= code <= 0xDFFF:
        code = 0xFFFD
    sys.stdout.write(chr(code))


def get():
    sys.stdout.flush()
    ch = sys.stdin.read(1)
    return add(0, ord(ch)) if ch else 0


"#;

impl Python {
    fn add(width: CellWidth) -> &'static str {
        match width {
            CellWidth::ThirtyTwo => {
                r#"def add(cell, d):
    cell = (cell + d) & MASK
    return cell - (1 << BITS) if cell >= (1 << (BITS - 1)) else cell


"#
            }
            _ => {
                r#"def add(cell, d):
    return (cell + d) & MASK


"#
            }
        }
    }

    fn shift(bounds: BoundsPolicy) -> &'static str {
        match bounds {
            BoundsPolicy::Wrap => {
                r#"def shift(p, d):
    return (p + d) % TAPE_SIZE


"#
            }
            BoundsPolicy::Fatal => {
                r#"def shift(p, d):
    q = p + d
    if q < 0:
        bounds("the data pointer moved below cell 0")
    if q >= TAPE_SIZE:
        bounds("the data pointer moved past the last cell")
    return q


"#
            }
        }
    }

    fn scans(bounds: BoundsPolicy) -> &'static str {
        match bounds {
            BoundsPolicy::Wrap => {
                r#"def scan_right(tape, p):
    try:
        return tape.index(0, p)
    except ValueError:
        pass
    try:
        return tape.index(0, 0, p)
    except ValueError:
        bounds("no cell on the tape is zero")


def scan_left(tape, p):
    for i in range(p, -1, -1):
        if tape[i] == 0:
            return i
    for i in range(TAPE_SIZE - 1, p, -1):
        if tape[i] == 0:
            return i
    bounds("no cell on the tape is zero")


"#
            }
            BoundsPolicy::Fatal => {
                r#"def scan_right(tape, p):
    try:
        return tape.index(0, p)
    except ValueError:
        bounds("the data pointer moved past the last cell")


def scan_left(tape, p):
    for i in range(p, -1, -1):
        if tape[i] == 0:
            return i
    bounds("the data pointer moved below cell 0")


"#
            }
        }
    }
}

impl Target for Python {
    fn name(&self) -> &'static str {
        "Python"
    }

    fn extension(&self) -> &'static str {
        "py"
    }

    fn prologue(&self, config: &Config) -> String {
        let mut result = String::from("#!/usr/bin/env python3\nimport sys\n\n");
        result += &format!(
            "TAPE_SIZE = {}\nBITS = {}\nMASK = (1 << BITS) - 1\n\n\n",
            config.tape_size.max(1),
            config.cell_width.bits()
        );
        result += Self::add(config.cell_width);
        result += HELPERS;
        result += Self::shift(config.bounds);
        result += Self::scans(config.bounds);
        result += "def main():\n    tape = [0] * TAPE_SIZE\n    p = 0\n";
        result
    }

    fn epilogue(&self, _config: &Config) -> String {
        "    sys.stdout.flush()\n\n\nif __name__ == \"__main__\":\n    main()\n".to_string()
    }

    fn op(&self, op: &Op, _config: &Config) -> String {
        match *op {
            Op::Address(d) => format!("p = shift(p, {d})"),
            Op::Data(d) => format!("tape[p] = add(tape[p], {d})"),
            Op::Output => "put(tape[p])".to_string(),
            Op::Input => "tape[p] = get()".to_string(),
            Op::SetZero => "tape[p] = 0".to_string(),
            Op::ScanZeroLeft => "p = scan_left(tape, p)".to_string(),
            Op::ScanZeroRight => "p = scan_right(tape, p)".to_string(),
            // The body may be empty, as in `[]`.
            Op::LoopStart(_) => "while tape[p]:\n    pass".to_string(),
            Op::LoopEnd(_) => String::new(),
            Op::Breakpoint => "# breakpoint".to_string(),
        }
    }
}
