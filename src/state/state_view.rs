//! Read-only adapter the detection rules evaluate against.
//!
//! A view borrows an immutable snapshot; nothing reachable from it can mutate
//! the engine's state. Fields the engine failed to populate surface as
//! `DetectorError::MissingStateField`.

use z3::ast::{Bool, BV};
use z3::Context;

use super::bitvec::{format_address, word};
use super::{Account, Constraints, Instruction, SymbolicState, TransactionRecord};
use crate::error::{DetectorError, Result};

#[derive(Clone, Copy, Debug)]
pub struct StateView<'a, 'ctx> {
    state: &'a SymbolicState<'ctx>,
}

/// Operands of an SSTORE about to execute.
#[derive(Clone, Debug)]
pub struct StorageWrite<'ctx> {
    pub slot: BV<'ctx>,
    pub value: BV<'ctx>,
}

impl<'a, 'ctx> StateView<'a, 'ctx> {
    pub fn new(state: &'a SymbolicState<'ctx>) -> Self {
        StateView { state }
    }

    pub fn ctx(&self) -> &'ctx Context {
        self.state.ctx
    }

    pub fn instruction(&self) -> &'a Instruction {
        &self.state.instruction
    }

    pub fn stack_peek(&self, depth: usize) -> Result<&'a BV<'ctx>> {
        self.state.machine.peek(depth)
    }

    /// Slot (top of stack) and value (next) of the pending storage write.
    pub fn storage_write(&self) -> Result<StorageWrite<'ctx>> {
        Ok(StorageWrite {
            slot: self.stack_peek(0)?.clone(),
            value: self.stack_peek(1)?.clone(),
        })
    }

    pub fn sender(&self) -> &'a BV<'ctx> {
        &self.state.environment.sender
    }

    pub fn function_name(&self) -> &'a str {
        &self.state.environment.active_function_name
    }

    pub fn active_account(&self) -> Result<&'a Account<'ctx>> {
        let key = self.state.environment.active_account;
        self.state
            .world
            .accounts
            .get(&key)
            .ok_or_else(|| DetectorError::missing(format!("account {}", format_address(key))))
    }

    pub fn accounts(&self) -> impl Iterator<Item = &'a Account<'ctx>> {
        self.state.world.accounts.values()
    }

    pub fn storage_at(&self, slot: &BV<'ctx>) -> Result<BV<'ctx>> {
        self.active_account()?.storage.load(slot)
    }

    /// The stored owner word (slot 0) of the active account.
    pub fn stored_owner(&self) -> Result<BV<'ctx>> {
        self.storage_at(&word(self.ctx(), 0))
    }

    pub fn current_transaction(&self) -> Result<&'a TransactionRecord<'ctx>> {
        self.state
            .world
            .transaction_sequence
            .last()
            .ok_or_else(|| DetectorError::missing("current_transaction"))
    }

    pub fn transaction_sequence(&self) -> &'a [TransactionRecord<'ctx>] {
        &self.state.world.transaction_sequence
    }

    pub fn balance(&self, address: &BV<'ctx>) -> Result<BV<'ctx>> {
        self.state
            .world
            .balances
            .select(address)
            .as_bv()
            .ok_or_else(|| DetectorError::missing("balances"))
    }

    pub fn starting_balance(&self, address: &BV<'ctx>) -> Result<BV<'ctx>> {
        self.state
            .world
            .starting_balances
            .select(address)
            .as_bv()
            .ok_or_else(|| DetectorError::missing("starting_balances"))
    }

    pub fn constraints(&self) -> &'a Constraints<'ctx> {
        &self.state.world.constraints
    }

    /// The path constraints narrowed by `extra`.
    pub fn constraints_with<I>(&self, extra: I) -> Constraints<'ctx>
    where
        I: IntoIterator<Item = Bool<'ctx>>,
    {
        self.state.world.constraints.narrowed(extra)
    }

    pub fn gas_bounds(&self) -> (u64, u64) {
        (self.state.machine.min_gas_used, self.state.machine.max_gas_used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::account::Bytecode;
    use crate::state::environment::Opcode;
    use ethnum::U256;
    use z3::Config;

    #[test]
    fn test_missing_operand_is_reported() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let account = Account::new(&ctx, U256::from(0x1000u64), "Market", Bytecode::default());
        let tx = TransactionRecord::symbolic(&ctx, "1", account.address, 8_000_000);
        let instruction = Instruction::new(0x2a, Opcode::SStore);
        let mut state = SymbolicState::new(&ctx, account, tx, "buy(uint256)", instruction);
        state.push_stack(word(&ctx, 0));

        let view = StateView::new(&state);
        assert_eq!(view.storage_write().unwrap_err(), DetectorError::missing("stack[-2]"));
    }

    #[test]
    fn test_unknown_active_account_is_reported() {
        let cfg = Config::new();
        let ctx = Context::new(&cfg);
        let account = Account::new(&ctx, U256::from(0x1000u64), "Market", Bytecode::default());
        let tx = TransactionRecord::symbolic(&ctx, "1", account.address, 8_000_000);
        let instruction = Instruction::new(0x2a, Opcode::SStore);
        let mut state = SymbolicState::new(&ctx, account, tx, "buy(uint256)", instruction);
        state.environment.active_account = U256::from(0x2000u64);

        let view = StateView::new(&state);
        assert!(matches!(
            view.stored_owner().unwrap_err(),
            DetectorError::MissingStateField { .. }
        ));
    }
}
