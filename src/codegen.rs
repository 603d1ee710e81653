//! Generación de código de tres direcciones.
//!
//! Se asume que el programa ya pasó el análisis semántico sin
//! diagnósticos. No se vuelve a validar nada aquí: un AST inválido
//! produce código bien formado pero sin sentido.

use tracing::debug;

use crate::{
    ast::{BinOp, Command, Condition, Expr, Program},
    ir::{self, Arithmetic, Instruction, Label, Register},
};

impl Program {
    /// Traduce los comandos del programa. Las declaraciones no generan código.
    pub fn lower(&self) -> ir::Program {
        let mut generator = Generator::default();
        for command in &self.commands {
            generator.command(command.val());
        }

        debug!(
            instructions = generator.code.len(),
            registers = generator.registers,
            labels = generator.labels,
            "lowered program"
        );

        ir::Program {
            code: generator.code,
        }
    }
}

/// Contadores e instrucciones de una sola traducción.
#[derive(Default)]
struct Generator {
    code: Vec<Instruction>,
    registers: u32,
    labels: u32,
}

impl Generator {
    fn command(&mut self, command: &Command) {
        match command {
            Command::Assign { target, value } => {
                let value = self.expr(value.val());
                self.emit(Instruction::Store(target.val().clone(), value));
            }

            Command::If {
                condition,
                then,
                otherwise,
            } => {
                let else_label = self.label();
                let end_label = self.label();

                let result = self.condition(condition);
                self.emit(Instruction::JumpIfFalse(result, else_label));

                self.command(then.val());
                self.emit(Instruction::Jump(end_label));
                self.emit(Instruction::SetLabel(else_label));

                if let Some(otherwise) = otherwise {
                    self.command(otherwise.val());
                }

                self.emit(Instruction::SetLabel(end_label));
            }

            Command::While { condition, body } => {
                let start_label = self.label();
                let end_label = self.label();

                self.emit(Instruction::SetLabel(start_label));

                let result = self.condition(condition);
                self.emit(Instruction::JumpIfFalse(result, end_label));

                self.command(body.val());
                self.emit(Instruction::Jump(start_label));
                self.emit(Instruction::SetLabel(end_label));
            }
        }
    }

    /// El resultado de la comparación queda en el registro izquierdo.
    fn condition(&mut self, condition: &Condition) -> Register {
        let left = self.expr(condition.left.val());
        let right = self.expr(condition.right.val());

        self.emit(Instruction::Compare(*condition.op.val(), left, right));
        left
    }

    fn expr(&mut self, expr: &Expr) -> Register {
        match expr {
            Expr::Number(literal) => {
                let dest = self.register();
                self.emit(Instruction::LoadImmediate(dest, literal.clone()));
                dest
            }

            Expr::Read(name) => {
                let dest = self.register();
                self.emit(Instruction::Load(dest, name.clone()));
                dest
            }

            Expr::Binary(left, op, right) => {
                let left = self.expr(left.val());
                let right = self.expr(right.val());
                let dest = self.register();

                let op = match op.val() {
                    BinOp::Add => Arithmetic::Add,
                    BinOp::Sub => Arithmetic::Sub,
                    BinOp::Mul => Arithmetic::Mul,
                    BinOp::Div => Arithmetic::Div,

                    // l - (l / r) * r, con división truncada
                    BinOp::Mod => {
                        let quotient = self.register();
                        let product = self.register();

                        self.emit(Instruction::Arithmetic(Arithmetic::Div, quotient, left, right));
                        self.emit(Instruction::Arithmetic(Arithmetic::Mul, product, quotient, right));
                        self.emit(Instruction::Arithmetic(Arithmetic::Sub, dest, left, product));

                        return dest;
                    }
                };

                self.emit(Instruction::Arithmetic(op, dest, left, right));
                dest
            }
        }
    }

    fn register(&mut self) -> Register {
        self.registers += 1;
        Register(self.registers)
    }

    fn label(&mut self) -> Label {
        self.labels += 1;
        Label(self.labels)
    }

    fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }
}
