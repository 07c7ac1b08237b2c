use std::fmt;

use ethnum::U256;
use z3::ast::BV;

use crate::error::{DetectorError, Result};

/// Mnemonics the detector distinguishes; anything else is carried verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    SStore,
    SLoad,
    Call,
    Other(String),
}

impl Opcode {
    pub fn from_mnemonic(mnemonic: &str) -> Self {
        match mnemonic.to_ascii_uppercase().as_str() {
            "SSTORE" => Opcode::SStore,
            "SLOAD" => Opcode::SLoad,
            "CALL" => Opcode::Call,
            other => Opcode::Other(other.to_string()),
        }
    }

    pub fn mnemonic(&self) -> &str {
        match self {
            Opcode::SStore => "SSTORE",
            Opcode::SLoad => "SLOAD",
            Opcode::Call => "CALL",
            Opcode::Other(name) => name,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// The instruction the engine is about to execute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub address: usize,
    pub opcode: Opcode,
}

impl Instruction {
    pub fn new(address: usize, opcode: Opcode) -> Self {
        Instruction { address, opcode }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Environment<'ctx> {
    /// Key of the executing account in the world state.
    pub active_account: U256,
    pub sender: BV<'ctx>,
    pub origin: BV<'ctx>,
    pub call_value: BV<'ctx>,
    pub active_function_name: String,
}

/// Operand stack and gas accounting of the current frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MachineState<'ctx> {
    pub stack: Vec<BV<'ctx>>,
    pub min_gas_used: u64,
    pub max_gas_used: u64,
}

impl<'ctx> MachineState<'ctx> {
    /// Operand `depth` positions below the top, `0` being the top of stack.
    pub fn peek(&self, depth: usize) -> Result<&BV<'ctx>> {
        self.stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|index| self.stack.get(index))
            .ok_or_else(|| DetectorError::missing(format!("stack[-{}]", depth + 1)))
    }
}
