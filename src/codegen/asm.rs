use std::fmt;
use std::io;

use itertools::Itertools;

pub type Result = std::result::Result<(), io::Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Rax,
    Eax,
    Al,
    Rcx,
    Ecx,
    Rdx,
    Edx,
    Rdi,
    Rsi,
    Esi,
    R8,
    R9,
    Rsp,
    Rbp,
    Xmm(u8),
}

/// Integer-class argument registers, in ABI order.
pub const INT_ARGS: [Reg; 6] = [Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];

/// Float-class argument registers used for passing, in ABI order.
pub const FLOAT_ARGS: [Reg; 6] = [
    Reg::Xmm(0),
    Reg::Xmm(1),
    Reg::Xmm(2),
    Reg::Xmm(3),
    Reg::Xmm(4),
    Reg::Xmm(5),
];

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reg::Rax => "rax",
            Reg::Eax => "eax",
            Reg::Al => "al",
            Reg::Rcx => "rcx",
            Reg::Ecx => "ecx",
            Reg::Rdx => "rdx",
            Reg::Edx => "edx",
            Reg::Rdi => "rdi",
            Reg::Rsi => "rsi",
            Reg::Esi => "esi",
            Reg::R8 => "r8",
            Reg::R9 => "r9",
            Reg::Rsp => "rsp",
            Reg::Rbp => "rbp",
            Reg::Xmm(index) => return write!(f, "%xmm{index}"),
        };
        write!(f, "%{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(i64),
    /// `offset(%rbp)`
    Frame(i32),
    /// `symbol(%rip)`
    Rip(String),
    /// `(%rsp)`
    StackTop,
    /// Jump or call target.
    Label(String),
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Operand::Reg(reg)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm(value) => write!(f, "${value}"),
            Operand::Frame(offset) => write!(f, "{offset}(%rbp)"),
            Operand::Rip(symbol) => write!(f, "{symbol}(%rip)"),
            Operand::StackTop => f.write_str("(%rsp)"),
            Operand::Label(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Directive(String),
    Label(String),
    /// `label: .directive value`
    Data(String, String),
    Instr(&'static str, Vec<Operand>),
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Directive(directive) => f.write_str(directive),
            Line::Label(label) => write!(f, "{label}:"),
            Line::Data(label, value) => write!(f, "{label}: {value}"),
            Line::Instr(op, operands) if operands.is_empty() => write!(f, "\t{op}"),
            Line::Instr(op, operands) => write!(f, "\t{op} {}", operands.iter().join(", ")),
        }
    }
}

/// Lines of one module or one function body, in emission order.
#[derive(Debug, Default)]
pub struct Assembly {
    lines: Vec<Line>,
}

impl Assembly {
    pub fn directive(&mut self, directive: impl Into<String>) {
        self.lines.push(Line::Directive(directive.into()));
    }

    pub fn label(&mut self, label: impl Into<String>) {
        self.lines.push(Line::Label(label.into()));
    }

    pub fn data(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.lines.push(Line::Data(label.into(), value.into()));
    }

    pub fn op0(&mut self, op: &'static str) {
        self.lines.push(Line::Instr(op, vec![]));
    }

    pub fn op1(&mut self, op: &'static str, operand: impl Into<Operand>) {
        self.lines.push(Line::Instr(op, vec![operand.into()]));
    }

    pub fn op2(&mut self, op: &'static str, src: impl Into<Operand>, dst: impl Into<Operand>) {
        self.lines.push(Line::Instr(op, vec![src.into(), dst.into()]));
    }

    pub fn append(&mut self, other: Assembly) {
        self.lines.extend(other.lines);
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }
}

pub fn format<Writer: io::Write>(assembly: &Assembly, writer: &mut Writer) -> Result {
    assembly
        .lines()
        .iter()
        .try_for_each(|line| writeln!(writer, "{line}"))
}

#[cfg(test)]
mod tests {
    use super::{format, Assembly, Operand, Reg};

    #[test]
    fn formats_att_syntax() {
        let mut assembly = Assembly::default();
        assembly.directive(".text");
        assembly.label("main");
        assembly.op2("movl", Operand::Imm(14), Reg::Eax);
        assembly.op2("movss", Operand::Rip(".LCF0".to_owned()), Reg::Xmm(0));
        assembly.op2("movq", Reg::Rdi, Operand::Frame(-8));
        assembly.op2("movss", Operand::StackTop, Reg::Xmm(1));
        assembly.op1("call", Operand::Label("printf@PLT".to_owned()));
        assembly.op0("ret");
        assembly.data("x", ".long 0");

        let mut out = vec![];
        format(&assembly, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            ".text\n\
             main:\n\
             \tmovl $14, %eax\n\
             \tmovss .LCF0(%rip), %xmm0\n\
             \tmovq %rdi, -8(%rbp)\n\
             \tmovss (%rsp), %xmm1\n\
             \tcall printf@PLT\n\
             \tret\n\
             x: .long 0\n"
        );
    }
}
