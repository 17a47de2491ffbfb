mod asm;
mod frame;
mod pool;

use std::io;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::ast::declaration::{FunctionDecl, VarDecl};
use crate::ast::expression::{Expression, ExpressionKind};
use crate::ast::literal::Number;
use crate::ast::name::Name;
use crate::ast::operator::BinaryOp;
use crate::ast::r#type::Type;
use crate::ast::statement::{Block, IfStmt, Statement, WhileStmt};
use crate::ast::Program;
use crate::diagnostic::{Diagnostic, RegisterClass};
use crate::parse::MAIN;

use self::asm::{format, Assembly, Operand, Reg, FLOAT_ARGS, INT_ARGS};
use self::frame::Frame;
use self::pool::LiteralPool;

const PRINT_FMT: &str = "print_fmt";
const PRINT_FMT_FLOAT: &str = "print_fmt_float";

/// Writes the assembly module for a checked program and returns the
/// diagnostics raised on the way. Only writer failures are errors.
pub fn gen<Writer: io::Write>(
    program: &Program,
    writer: &mut Writer,
) -> io::Result<Vec<Diagnostic>> {
    let (assembly, diagnostics) = gen_program(program);
    format(&assembly, writer)?;
    Ok(diagnostics)
}

fn gen_program(program: &Program) -> (Assembly, Vec<Diagnostic>) {
    let mut module = ModuleGen::default();
    let mut asm = Assembly::default();

    asm.directive(".data");
    asm.data(PRINT_FMT, r#".string "%ld \n""#);
    asm.data(PRINT_FMT_FLOAT, r#".string "%f \n""#);
    for (name, r#type) in module.declare_globals(&program.var_decls) {
        asm.data(name.as_str(), zero_value(r#type));
    }

    asm.directive(".text");
    for func_decl in &program.function_decls {
        let function = module.gen_function_decl(func_decl);
        asm.append(function);
    }

    if !module.pool.is_empty() {
        asm.directive(".section .rodata");
        asm.directive(".balign 4");
        for (label, value) in module.pool.entries() {
            asm.data(label, value);
        }
    }
    asm.directive(r#".section .note.GNU-stack,"",@progbits"#);

    (asm, module.diagnostics)
}

fn zero_value(r#type: Type) -> &'static str {
    match r#type {
        Type::Int64 => ".quad 0",
        Type::Float32 => ".float 0.0",
        Type::Int32 | Type::Unsigned32 | Type::Bool => ".long 0",
    }
}

fn register_class(r#type: Type) -> RegisterClass {
    if r#type.is_float() {
        RegisterClass::Float
    } else {
        RegisterClass::Integer
    }
}

fn epilogue_label(function: &Name) -> String {
    format!(".Lend_{function}")
}

/// State shared by every function of one module.
#[derive(Debug, Default)]
struct ModuleGen {
    globals: FxHashMap<Name, Type>,
    pool: LiteralPool,
    labels: u32,
    diagnostics: Vec<Diagnostic>,
}

impl ModuleGen {
    /// Returns each distinct global once, in first-declaration order.
    fn declare_globals(&mut self, var_decls: &[VarDecl]) -> Vec<(Name, Type)> {
        let mut order = vec![];
        for var_decl in var_decls {
            for name in &var_decl.names {
                if self.globals.insert(name.clone(), var_decl.r#type).is_none() {
                    order.push(name.clone());
                }
            }
        }
        order
            .into_iter()
            .map(|name| {
                let r#type = self.globals.get(&name).copied().unwrap_or_default();
                (name, r#type)
            })
            .collect()
    }

    fn next_label(&mut self) -> u32 {
        let label = self.labels;
        self.labels += 1;
        label
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    fn gen_function_decl(&mut self, func_decl: &FunctionDecl) -> Assembly {
        debug!(function = %func_decl.name, "generating");
        let mut asm = Assembly::default();
        asm.directive(format!(".globl {}", func_decl.name));
        asm.label(func_decl.name.as_str());
        asm.op1("pushq", Reg::Rbp);
        asm.op2("movq", Reg::Rsp, Reg::Rbp);

        if func_decl.has_consistent_params() {
            let mut function = FunctionGen::new(self, func_decl.name.clone());
            function.gen_params(func_decl);
            function.gen_block(&func_decl.block);
            if func_decl.name.as_str() == MAIN {
                function.asm.op2("movl", Operand::Imm(0), Reg::Eax);
            }
            let (reserved, body) = function.finish();
            if reserved > 0 {
                asm.op2("subq", Operand::Imm(reserved.into()), Reg::Rsp);
            }
            asm.append(body);
        } else {
            self.report(Diagnostic::ParameterMismatch {
                function: func_decl.name.clone(),
                names: func_decl.param_names.len(),
                types: func_decl.param_type_names.len(),
            });
        }

        asm.label(epilogue_label(&func_decl.name));
        asm.op0("leave");
        asm.op0("ret");
        asm
    }
}

/// Hands out argument registers positionally, one counter per class.
#[derive(Debug, Default)]
struct ArgRegisters {
    int: usize,
    float: usize,
}

impl ArgRegisters {
    fn next(&mut self, class: RegisterClass) -> Option<Reg> {
        let (registers, used) = match class {
            RegisterClass::Integer => (&INT_ARGS, &mut self.int),
            RegisterClass::Float => (&FLOAT_ARGS, &mut self.float),
        };
        let register = registers.get(*used).copied();
        *used += 1;
        register
    }

    fn exhausted(&self) -> impl Iterator<Item = RegisterClass> {
        [
            (RegisterClass::Integer, self.int > INT_ARGS.len()),
            (RegisterClass::Float, self.float > FLOAT_ARGS.len()),
        ]
        .into_iter()
        .filter_map(|(class, exhausted)| exhausted.then_some(class))
    }
}

#[derive(Debug, Clone, Copy)]
struct Local {
    offset: i32,
    r#type: Type,
}

/// Per-function state. The body is buffered so the prologue can reserve
/// the frame once its final size is known.
struct FunctionGen<'module> {
    module: &'module mut ModuleGen,
    name: Name,
    locals: FxHashMap<Name, Local>,
    frame: Frame,
    /// 8-byte values currently pushed below the frame.
    pushed: u32,
    asm: Assembly,
}

impl<'module> FunctionGen<'module> {
    fn new(module: &'module mut ModuleGen, name: Name) -> Self {
        FunctionGen {
            module,
            name,
            locals: FxHashMap::default(),
            frame: Frame::default(),
            pushed: 0,
            asm: Assembly::default(),
        }
    }

    fn finish(self) -> (u32, Assembly) {
        (self.frame.reserved(), self.asm)
    }

    fn declare(&mut self, name: &Name, r#type: Type) -> i32 {
        let offset = self.frame.slot();
        self.locals.insert(name.clone(), Local { offset, r#type });
        offset
    }

    fn variable(&mut self, name: &Name) -> (Operand, Type) {
        if let Some(local) = self.locals.get(name) {
            return (Operand::Frame(local.offset), local.r#type);
        }
        if let Some(&r#type) = self.module.globals.get(name) {
            return (Operand::Rip(name.to_string()), r#type);
        }
        // Checked trees declare every name; anything else gets an int32 slot.
        let offset = self.declare(name, Type::Int32);
        (Operand::Frame(offset), Type::Int32)
    }

    fn gen_params(&mut self, func_decl: &FunctionDecl) {
        let mut registers = ArgRegisters::default();
        for (name, &r#type) in func_decl.param_names.iter().zip(&func_decl.param_types) {
            let offset = self.declare(name, r#type);
            let class = register_class(r#type);
            if let Some(register) = registers.next(class) {
                let op = match class {
                    RegisterClass::Integer => "movq",
                    RegisterClass::Float => "movss",
                };
                self.asm.op2(op, register, Operand::Frame(offset));
            }
        }
        for class in registers.exhausted() {
            self.module.report(Diagnostic::TooManyParameters {
                function: self.name.clone(),
                class,
            });
        }
    }

    fn gen_block(&mut self, block: &Block) {
        for var_decl in &block.var_decls {
            for name in &var_decl.names {
                self.declare(name, var_decl.r#type);
            }
        }
        for statement in &block.statements {
            self.gen_statement(statement);
        }
    }

    fn gen_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Assign(name, expr) => self.gen_assign(name, expr),
            Statement::Print(expr) => self.gen_print(expr),
            Statement::If(if_stmt) => self.gen_if_stmt(if_stmt),
            Statement::While(while_stmt) => self.gen_while_stmt(while_stmt),
            Statement::Expression(expr) => self.gen_expression(expr),
            Statement::Return(expr) => {
                self.gen_expression(expr);
                self.asm.op1("jmp", Operand::Label(epilogue_label(&self.name)));
            }
        }
    }

    fn gen_assign(&mut self, name: &Name, expr: &Expression) {
        self.gen_expression(expr);
        // The function's own name designates the result, which stays live in
        // the result register.
        if *name == self.name {
            return;
        }
        let (destination, r#type) = self.variable(name);
        self.store(r#type, destination);
    }

    fn gen_print(&mut self, expr: &Expression) {
        self.gen_expression(expr);
        if expr.r#type.is_float() {
            self.asm.op2("cvtss2sd", Reg::Xmm(0), Reg::Xmm(0));
            self.asm
                .op2("leaq", Operand::Rip(PRINT_FMT_FLOAT.to_owned()), Reg::Rdi);
            self.asm.op2("movl", Operand::Imm(1), Reg::Eax);
        } else {
            match expr.r#type {
                Type::Int64 => self.asm.op2("movq", Reg::Rax, Reg::Rsi),
                Type::Unsigned32 => self.asm.op2("movl", Reg::Eax, Reg::Esi),
                _ => self.asm.op2("movslq", Reg::Eax, Reg::Rsi),
            }
            self.asm
                .op2("leaq", Operand::Rip(PRINT_FMT.to_owned()), Reg::Rdi);
            self.asm.op2("movl", Operand::Imm(0), Reg::Eax);
        }
        self.call("printf@PLT");
    }

    fn gen_if_stmt(&mut self, if_stmt: &IfStmt) {
        let label = self.module.next_label();
        let else_label = format!(".Lelse{label}");
        let end_label = format!(".Lendif{label}");

        self.gen_condition(&if_stmt.condition, &else_label);
        self.gen_block(&if_stmt.then_block);
        self.asm.op1("jmp", Operand::Label(end_label.clone()));
        self.asm.label(else_label);
        if let Some(else_block) = &if_stmt.else_block {
            self.gen_block(else_block);
        }
        self.asm.label(end_label);
    }

    fn gen_while_stmt(&mut self, while_stmt: &WhileStmt) {
        let label = self.module.next_label();
        let top_label = format!(".Lwhile{label}");
        let end_label = format!(".Lendwhile{label}");

        self.asm.label(top_label.clone());
        self.gen_condition(&while_stmt.condition, &end_label);
        self.gen_block(&while_stmt.body);
        self.asm.op1("jmp", Operand::Label(top_label));
        self.asm.label(end_label);
    }

    /// Zero in the accumulator means false.
    fn gen_condition(&mut self, condition: &Expression, false_label: &str) {
        self.gen_expression(condition);
        self.asm.op2("cmpl", Operand::Imm(0), Reg::Eax);
        self.asm.op1("je", Operand::Label(false_label.to_owned()));
    }

    /// Leaves the value in `%eax`/`%rax`, or `%xmm0` for float32.
    fn gen_expression(&mut self, expr: &Expression) {
        match &expr.kind {
            ExpressionKind::Number(number) => self.gen_number(*number, expr.r#type),
            ExpressionKind::Identifier(name) => {
                let (source, r#type) = self.variable(name);
                self.load(source, r#type);
            }
            ExpressionKind::Binary(op, lhs, rhs) => self.gen_binary(*op, lhs, rhs),
            ExpressionKind::Cast(operand) => {
                self.gen_expression(operand);
                self.gen_conversion(operand.r#type, expr.r#type);
            }
            ExpressionKind::Call(callee, args) => self.gen_call(callee, args),
        }
    }

    fn gen_number(&mut self, number: Number, r#type: Type) {
        match r#type {
            Type::Float32 => {
                let index = self.module.pool.intern(number.as_f64());
                self.asm
                    .op2("movss", Operand::Rip(LiteralPool::label(index)), Reg::Xmm(0));
            }
            Type::Int64 => self.asm.op2("movq", Operand::Imm(number.as_i64()), Reg::Rax),
            Type::Int32 | Type::Unsigned32 | Type::Bool => {
                let value = number.as_i64() as i32;
                self.asm.op2("movl", Operand::Imm(value.into()), Reg::Eax);
            }
        }
    }

    fn load(&mut self, source: Operand, r#type: Type) {
        match r#type {
            Type::Float32 => self.asm.op2("movss", source, Reg::Xmm(0)),
            Type::Int64 => self.asm.op2("movq", source, Reg::Rax),
            Type::Int32 | Type::Unsigned32 | Type::Bool => self.asm.op2("movl", source, Reg::Eax),
        }
    }

    fn store(&mut self, r#type: Type, destination: Operand) {
        match r#type {
            Type::Float32 => self.asm.op2("movss", Reg::Xmm(0), destination),
            Type::Int64 => self.asm.op2("movq", Reg::Rax, destination),
            Type::Int32 | Type::Unsigned32 | Type::Bool => {
                self.asm.op2("movl", Reg::Eax, destination)
            }
        }
    }

    fn gen_binary(&mut self, op: BinaryOp, lhs: &Expression, rhs: &Expression) {
        let operand_type = Type::unify(lhs.r#type, rhs.r#type);
        match (operand_type.is_float(), op.is_relational()) {
            (true, true) => self.gen_float_comparison(op, lhs, rhs),
            (true, false) => self.gen_float_arithmetic(op, lhs, rhs),
            (false, _) => self.gen_integer_binary(op, lhs, rhs, operand_type),
        }
    }

    fn gen_integer_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expression,
        rhs: &Expression,
        operand_type: Type,
    ) {
        let wide = operand_type.is_wide();
        let unsigned = operand_type.is_unsigned();
        let sized = |long: &'static str, quad: &'static str| if wide { quad } else { long };
        let (acc, scratch, remainder) = if wide {
            (Reg::Rax, Reg::Rcx, Reg::Rdx)
        } else {
            (Reg::Eax, Reg::Ecx, Reg::Edx)
        };

        self.gen_expression(lhs);
        self.push(Reg::Rax);
        self.gen_expression(rhs);
        self.asm.op2(sized("movl", "movq"), acc, scratch);
        self.pop(Reg::Rax);

        match op {
            BinaryOp::Add => self.asm.op2(sized("addl", "addq"), scratch, acc),
            BinaryOp::Sub => self.asm.op2(sized("subl", "subq"), scratch, acc),
            BinaryOp::Mul => self.asm.op2(sized("imull", "imulq"), scratch, acc),
            BinaryOp::Div | BinaryOp::Mod => {
                if unsigned {
                    self.asm.op2("xorl", Reg::Edx, Reg::Edx);
                    self.asm.op1("divl", scratch);
                } else {
                    self.asm.op0(sized("cltd", "cqto"));
                    self.asm.op1(sized("idivl", "idivq"), scratch);
                }
                if op == BinaryOp::Mod {
                    self.asm.op2(sized("movl", "movq"), remainder, acc);
                }
            }
            BinaryOp::Pow => {
                let label = self.module.next_label();
                let top_label = format!(".Lpow{label}");
                let end_label = format!(".Lendpow{label}");
                self.asm.op2(sized("movl", "movq"), acc, remainder);
                self.asm.op2("movl", Operand::Imm(1), Reg::Eax);
                if !unsigned {
                    // A negative exponent truncates to zero unless the base
                    // is 1 or -1, where |exponent| multiplications give the
                    // exact power.
                    self.asm.op2(sized("cmpl", "cmpq"), Operand::Imm(0), scratch);
                    self.asm.op1("jge", Operand::Label(top_label.clone()));
                    self.asm.op1(sized("negl", "negq"), scratch);
                    self.asm.op2(sized("cmpl", "cmpq"), Operand::Imm(1), remainder);
                    self.asm.op1("je", Operand::Label(top_label.clone()));
                    self.asm.op2(sized("cmpl", "cmpq"), Operand::Imm(-1), remainder);
                    self.asm.op1("je", Operand::Label(top_label.clone()));
                    self.asm.op2("movl", Operand::Imm(0), Reg::Eax);
                    self.asm.op1("jmp", Operand::Label(end_label.clone()));
                }
                self.asm.label(top_label.clone());
                self.asm.op2(sized("cmpl", "cmpq"), Operand::Imm(0), scratch);
                self.asm
                    .op1(if unsigned { "je" } else { "jle" }, Operand::Label(end_label.clone()));
                self.asm.op2(sized("imull", "imulq"), remainder, acc);
                self.asm.op1(sized("decl", "decq"), scratch);
                self.asm.op1("jmp", Operand::Label(top_label));
                self.asm.label(end_label);
            }
            BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne => {
                self.asm.op2(sized("cmpl", "cmpq"), scratch, acc);
                self.gen_flag(set_instruction(op, unsigned));
            }
        }
    }

    /// Float temporaries are carved per operation and never reused.
    fn gen_float_arithmetic(&mut self, op: BinaryOp, lhs: &Expression, rhs: &Expression) {
        let left = self.spill_float(lhs);
        let right = self.spill_float(rhs);

        match op {
            BinaryOp::Pow => {
                self.asm.op2("movss", Operand::Frame(left), Reg::Xmm(0));
                self.asm.op2("movss", Operand::Frame(right), Reg::Xmm(1));
                self.call("powf@PLT");
            }
            BinaryOp::Mod => {
                self.asm.op2("movss", Operand::Frame(left), Reg::Xmm(1));
                self.asm.op2("movss", Operand::Frame(right), Reg::Xmm(0));
                self.asm.op2("cvttss2siq", Reg::Xmm(1), Reg::Rax);
                self.asm.op2("cvttss2siq", Reg::Xmm(0), Reg::Rcx);
                self.asm.op0("cqto");
                self.asm.op1("idivq", Reg::Rcx);
                self.asm.op2("cvtsi2ssq", Reg::Rdx, Reg::Xmm(0));
            }
            _ => {
                let instruction = match op {
                    BinaryOp::Add => "addss",
                    BinaryOp::Sub => "subss",
                    BinaryOp::Mul => "mulss",
                    BinaryOp::Div => "divss",
                    _ => unreachable!("{op} is not float arithmetic"),
                };
                self.asm.op2("movss", Operand::Frame(left), Reg::Xmm(1));
                self.asm.op2("movss", Operand::Frame(right), Reg::Xmm(0));
                self.asm.op2(instruction, Reg::Xmm(0), Reg::Xmm(1));
                self.asm.op2("movss", Reg::Xmm(1), Reg::Xmm(0));
            }
        }
    }

    fn spill_float(&mut self, expr: &Expression) -> i32 {
        self.gen_expression(expr);
        let offset = self.frame.carve(4);
        self.asm.op2("movss", Reg::Xmm(0), Operand::Frame(offset));
        offset
    }

    fn gen_float_comparison(&mut self, op: BinaryOp, lhs: &Expression, rhs: &Expression) {
        self.gen_expression(lhs);
        self.asm.op2("subq", Operand::Imm(8), Reg::Rsp);
        self.pushed += 1;
        self.asm.op2("movss", Reg::Xmm(0), Operand::StackTop);

        self.gen_expression(rhs);
        self.asm.op2("movss", Operand::StackTop, Reg::Xmm(1));
        self.asm.op2("addq", Operand::Imm(8), Reg::Rsp);
        self.pushed -= 1;

        self.asm.op2("ucomiss", Reg::Xmm(0), Reg::Xmm(1));
        // ucomiss reports through the unsigned flags.
        self.gen_flag(set_instruction(op, true));
    }

    /// Widens a condition flag into a 0/1 integer in `%rax`.
    fn gen_flag(&mut self, set: &'static str) {
        self.asm.op2("movl", Operand::Imm(0), Reg::Eax);
        self.asm.op1(set, Reg::Al);
        self.asm.op2("movzbq", Reg::Al, Reg::Rax);
    }

    fn gen_conversion(&mut self, from: Type, to: Type) {
        if from == to {
            return;
        }
        match (from, to) {
            (Type::Float32, _) => self.asm.op2("cvttss2siq", Reg::Xmm(0), Reg::Rax),
            (Type::Int64, Type::Float32) => self.asm.op2("cvtsi2ssq", Reg::Rax, Reg::Xmm(0)),
            (Type::Unsigned32, Type::Float32) => {
                self.asm.op2("movl", Reg::Eax, Reg::Eax);
                self.asm.op2("cvtsi2ssq", Reg::Rax, Reg::Xmm(0));
            }
            (Type::Int32 | Type::Bool, Type::Float32) => {
                self.asm.op2("movslq", Reg::Eax, Reg::Rax);
                self.asm.op2("cvtsi2ssq", Reg::Rax, Reg::Xmm(0));
            }
            (Type::Unsigned32, Type::Int64) => self.asm.op2("movl", Reg::Eax, Reg::Eax),
            (Type::Int32 | Type::Bool, Type::Int64) => self.asm.op2("movslq", Reg::Eax, Reg::Rax),
            // Narrowing and same-width reinterpretation use the low bits as is.
            _ => {}
        }
    }

    /// Arguments are evaluated into frame temporaries first so nested calls
    /// cannot clobber registers that are already loaded.
    fn gen_call(&mut self, callee: &Name, args: &[Expression]) {
        let spilled: Vec<_> = args
            .iter()
            .map(|arg| {
                self.gen_expression(arg);
                let offset = self.frame.slot();
                let class = register_class(arg.r#type);
                match class {
                    RegisterClass::Integer => self.asm.op2("movq", Reg::Rax, Operand::Frame(offset)),
                    RegisterClass::Float => self.asm.op2("movss", Reg::Xmm(0), Operand::Frame(offset)),
                }
                (class, offset)
            })
            .collect();

        let mut registers = ArgRegisters::default();
        for (class, offset) in spilled {
            let Some(register) = registers.next(class) else {
                continue;
            };
            let op = match class {
                RegisterClass::Integer => "movq",
                RegisterClass::Float => "movss",
            };
            self.asm.op2(op, Operand::Frame(offset), register);
        }
        for class in registers.exhausted() {
            self.module.report(Diagnostic::TooManyArguments {
                callee: callee.clone(),
                class,
            });
        }

        self.call(callee.as_str());
    }

    /// Keeps `%rsp` 16-byte aligned at the call instruction.
    fn call(&mut self, target: &str) {
        let misaligned = self.pushed % 2 == 1;
        if misaligned {
            self.asm.op2("subq", Operand::Imm(8), Reg::Rsp);
        }
        self.asm.op1("call", Operand::Label(target.to_owned()));
        if misaligned {
            self.asm.op2("addq", Operand::Imm(8), Reg::Rsp);
        }
    }

    fn push(&mut self, reg: Reg) {
        self.asm.op1("pushq", reg);
        self.pushed += 1;
    }

    fn pop(&mut self, reg: Reg) {
        self.asm.op1("popq", reg);
        self.pushed -= 1;
    }
}

fn set_instruction(op: BinaryOp, unsigned: bool) -> &'static str {
    match (op, unsigned) {
        (BinaryOp::Lt, false) => "setl",
        (BinaryOp::Le, false) => "setle",
        (BinaryOp::Gt, false) => "setg",
        (BinaryOp::Ge, false) => "setge",
        (BinaryOp::Lt, true) => "setb",
        (BinaryOp::Le, true) => "setbe",
        (BinaryOp::Gt, true) => "seta",
        (BinaryOp::Ge, true) => "setae",
        (BinaryOp::Eq, _) => "sete",
        (BinaryOp::Ne, _) => "setne",
        _ => unreachable!("{op} is not a comparison"),
    }
}
