use std::collections::BTreeMap;
use std::fmt;

use ethnum::U256;
use z3::ast::{Array, BV};
use z3::{Context, Sort};

use super::bitvec::{bv_from_u256, format_address, WORD_BITS};
use super::{Account, Constraints, Environment, Instruction, MachineState, TransactionRecord};
use crate::error::{DetectorError, Result};

/// Accounts, balances and path constraints shared by every frame of a path.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldState<'ctx> {
    pub accounts: BTreeMap<U256, Account<'ctx>>,
    /// Current balances, `address -> wei`.
    pub balances: Array<'ctx>,
    /// Balances as they were when the current transaction started.
    pub starting_balances: Array<'ctx>,
    pub constraints: Constraints<'ctx>,
    pub transaction_sequence: Vec<TransactionRecord<'ctx>>,
}

impl<'ctx> WorldState<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        let sort = Sort::bitvector(ctx, WORD_BITS);
        let balances = Array::new_const(ctx, "balance", &sort, &sort);
        WorldState {
            accounts: BTreeMap::new(),
            starting_balances: balances.clone(),
            balances,
            constraints: Constraints::new(),
            transaction_sequence: Vec::new(),
        }
    }
}

/// A symbolic execution state as handed over by the execution engine at an
/// instruction hook. The detector only ever reads a private clone of it.
#[derive(Clone, Debug)]
pub struct SymbolicState<'ctx> {
    pub ctx: &'ctx Context,
    pub world: WorldState<'ctx>,
    pub environment: Environment<'ctx>,
    pub machine: MachineState<'ctx>,
    pub instruction: Instruction,
}

impl<'ctx> SymbolicState<'ctx> {
    /// State at the start of `transaction`, executing `account`.
    pub fn new(
        ctx: &'ctx Context,
        account: Account<'ctx>,
        transaction: TransactionRecord<'ctx>,
        function_name: &str,
        instruction: Instruction,
    ) -> Self {
        let environment = Environment {
            active_account: account.address,
            sender: transaction.caller.clone(),
            origin: transaction.origin.clone(),
            call_value: transaction.call_value.clone(),
            active_function_name: function_name.to_string(),
        };
        let mut world = WorldState::new(ctx);
        world.accounts.insert(account.address, account);
        world.transaction_sequence.push(transaction);

        SymbolicState {
            ctx,
            world,
            environment,
            machine: MachineState::default(),
            instruction,
        }
    }

    pub fn add_account(&mut self, account: Account<'ctx>) {
        self.world.accounts.insert(account.address, account);
    }

    pub fn add_constraint(&mut self, constraint: z3::ast::Bool<'ctx>) {
        self.world.constraints.append(constraint);
    }

    pub fn push_stack(&mut self, value: BV<'ctx>) {
        self.machine.stack.push(value);
    }

    pub fn set_gas_bounds(&mut self, min_gas_used: u64, max_gas_used: u64) {
        self.machine.min_gas_used = min_gas_used;
        self.machine.max_gas_used = max_gas_used;
    }

    /// Writes a slot of the active account, as an executed SSTORE would.
    pub fn store(&mut self, slot: &BV<'ctx>, value: &BV<'ctx>) -> Result<()> {
        let key = self.environment.active_account;
        let account = self
            .world
            .accounts
            .get_mut(&key)
            .ok_or_else(|| DetectorError::missing(format!("account {}", format_address(key))))?;
        account.storage.store(slot, value);
        Ok(())
    }

    pub fn set_balance(&mut self, address: &BV<'ctx>, value: &BV<'ctx>) {
        self.world.balances = self.world.balances.store(address, value);
    }

    pub fn set_balance_of(&mut self, address: U256, value: &BV<'ctx>) {
        let address = bv_from_u256(self.ctx, address);
        self.set_balance(&address, value);
    }

    /// Starts a new transaction: the current balances become the starting snapshot.
    pub fn begin_transaction(&mut self, transaction: TransactionRecord<'ctx>) {
        self.environment.sender = transaction.caller.clone();
        self.environment.origin = transaction.origin.clone();
        self.environment.call_value = transaction.call_value.clone();
        self.world.starting_balances = self.world.balances.clone();
        self.world.transaction_sequence.push(transaction);
    }
}

// Two states are the same when everything but the shared context matches.
impl<'ctx> PartialEq for SymbolicState<'ctx> {
    fn eq(&self, other: &Self) -> bool {
        self.world == other.world
            && self.environment == other.environment
            && self.machine == other.machine
            && self.instruction == other.instruction
    }
}

impl<'ctx> fmt::Display for SymbolicState<'ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State at 0x{:x} ({}):", self.instruction.address, self.instruction.opcode)?;
        writeln!(f, "  Function: {}", self.environment.active_function_name)?;
        writeln!(f, "  Stack depth: {}", self.machine.stack.len())?;
        writeln!(f, "  Accounts:")?;
        for account in self.world.accounts.values() {
            writeln!(f, "    {}", account)?;
        }
        writeln!(f, "  Path constraints: {}", self.world.constraints.len())?;
        writeln!(f, "  Transactions: {}", self.world.transaction_sequence.len())?;
        Ok(())
    }
}
