//! An implementation of the virtual machine for the C language.
//!
//! This allows the virtual machine to target C programs. The output only
//! needs a C99 compiler and the standard library.
use super::{unsigned_delta, Target};
use crate::{
    ir::Op,
    vm::{BoundsPolicy, CellWidth, Config},
};

pub struct C;

impl C {
    fn cell_type(width: CellWidth) -> &'static str {
        match width {
            CellWidth::Eight => "uint8_t",
            CellWidth::Sixteen => "uint16_t",
            CellWidth::ThirtyTwo => "int32_t",
        }
    }

    fn shift(config: &Config) -> String {
        let n = config.tape_size.max(1);
        let body = match config.bounds {
            BoundsPolicy::Wrap => format!(
                "    long long q = ((long long)p + d) % {n}LL;\n    p = (size_t)(q < 0 ? q + {n}LL : q);\n"
            ),
            BoundsPolicy::Fatal => format!(
                r#"    long long q = (long long)p + d;
    if (q < 0) bounds("the data pointer moved below cell 0");
    if (q >= {n}LL) bounds("the data pointer moved past the last cell");
    p = (size_t)q;
"#
            ),
        };
        format!("static void shift(long long d) {{\n{body}}}\n\n")
    }

    fn scans(config: &Config) -> String {
        let n = config.tape_size.max(1);
        let (right_miss, left_miss) = match config.bounds {
            BoundsPolicy::Wrap => (
                "    for (size_t i = 0; i < p; i++) if (tape[i] == 0) { p = i; return; }\n    bounds(\"no cell on the tape is zero\");\n"
                    .to_string(),
                format!(
                    "    for (size_t i = {n}; i-- > p + 1;) if (tape[i] == 0) {{ p = i; return; }}\n    bounds(\"no cell on the tape is zero\");\n"
                ),
            ),
            BoundsPolicy::Fatal => (
                "    bounds(\"the data pointer moved past the last cell\");\n".to_string(),
                "    bounds(\"the data pointer moved below cell 0\");\n".to_string(),
            ),
        };

        let right_hit = if config.cell_width == CellWidth::Eight {
            format!(
                "    cell *z = memchr(tape + p, 0, {n} - p);\n    if (z) {{ p = (size_t)(z - tape); return; }}\n"
            )
        } else {
            format!("    for (size_t i = p; i < {n}; i++) if (tape[i] == 0) {{ p = i; return; }}\n")
        };
        let left_hit =
            "    for (size_t i = p + 1; i-- > 0;) if (tape[i] == 0) { p = i; return; }\n";

        format!(
            "static void scan_right(void) {{\n{right_hit}{right_miss}}}\n\nstatic void scan_left(void) {{\n{left_hit}{left_miss}}}\n\n"
        )
    }
}

/// Write a code point as UTF-8, or U+FFFD if it is not a scalar value.
const PUT: &str = r#"static void put(cell c) {
    uint32_t u = (uint32_t)c;
    if (u > 0x10FFFF || (u >= 0xD800 && u <= 0xDFFF)) u = 0xFFFD;
    if (u < 0x80) {
        putchar((int)u);
    } else if (u < 0x800) {
        putchar((int)(0xC0 | (u >> 6)));
        putchar((int)(0x80 | (u & 0x3F)));
    } else if (u < 0x10000) {
        putchar((int)(0xE0 | (u >> 12)));
        putchar((int)(0x80 | ((u >> 6) & 0x3F)));
        putchar((int)(0x80 | (u & 0x3F)));
    } else {
        putchar((int)(0xF0 | (u >> 18)));
        putchar((int)(0x80 | ((u >> 12) & 0x3F)));
        putchar((int)(0x80 | ((u >> 6) & 0x3F)));
        putchar((int)(0x80 | (u & 0x3F)));
    }
}

"#;

/// Read one UTF-8 character; end of input reads as 0.
const GET: &str = r#"static cell get(void) {
    fflush(stdout);
    int c = getchar();
    if (c == EOF) return 0;
    uint32_t u = (uint32_t)c;
    int extra = 0;
    if (u >= 0xF0) { u &= 0x07; extra = 3; }
    else if (u >= 0xE0) { u &= 0x0F; extra = 2; }
    else if (u >= 0xC0) { u &= 0x1F; extra = 1; }
    while (extra-- > 0 && (c = getchar()) != EOF) u = (u << 6) | ((uint32_t)c & 0x3F);
    return (cell)u;
}

"#;

impl Target for C {
    fn name(&self) -> &'static str {
        "C"
    }

    fn extension(&self) -> &'static str {
        "c"
    }

    fn prologue(&self, config: &Config) -> String {
        let mut result = String::from(
            "#include <stdint.h>\n#include <stdio.h>\n#include <stdlib.h>\n#include <string.h>\n\n",
        );
        result += &format!(
            "typedef {} cell;\nstatic cell tape[{}];\nstatic size_t p = 0;\n\n",
            Self::cell_type(config.cell_width),
            config.tape_size.max(1)
        );
        result += r#"static void bounds(const char *what) {
    fflush(stdout);
    fprintf(stderr, "Bounds error: %s\n", what);
    exit(1);
}

"#;
        result += &Self::shift(config);
        result += &Self::scans(config);
        result += PUT;
        result += GET;
        result += "int main(void) {\n";
        result
    }

    fn epilogue(&self, _config: &Config) -> String {
        "    fflush(stdout);\n    return 0;\n}\n".to_string()
    }

    fn op(&self, op: &Op, config: &Config) -> String {
        match *op {
            Op::Address(d) => format!("shift({d});"),
            Op::Data(d) => match config.cell_width {
                CellWidth::ThirtyTwo => {
                    format!("tape[p] = (cell)((uint32_t)tape[p] + {}u);", d as u32)
                }
                width => format!("tape[p] += {};", unsigned_delta(d, width.bits())),
            },
            Op::Output => "put(tape[p]);".to_string(),
            Op::Input => "tape[p] = get();".to_string(),
            Op::SetZero => "tape[p] = 0;".to_string(),
            Op::ScanZeroLeft => "scan_left();".to_string(),
            Op::ScanZeroRight => "scan_right();".to_string(),
            Op::LoopStart(_) => "while (tape[p]) {".to_string(),
            Op::LoopEnd(_) => "}".to_string(),
            Op::Breakpoint => "/* breakpoint */".to_string(),
        }
    }
}
