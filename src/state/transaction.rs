use ethnum::U256;
use z3::ast::{Array, BV};
use z3::{Context, Sort};

use super::bitvec::WORD_BITS;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionKind {
    MessageCall,
    ContractCreation,
}

/// One symbolic transaction of the sequence that led to the current state.
/// Caller, origin, value and calldata stay symbolic until a model fixes them.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionRecord<'ctx> {
    pub id: String,
    pub kind: TransactionKind,
    pub callee: U256,
    pub caller: BV<'ctx>,
    pub origin: BV<'ctx>,
    pub call_value: BV<'ctx>,
    /// Byte-addressed calldata, `BV256 -> BV8`.
    pub calldata: Array<'ctx>,
    pub calldata_size: BV<'ctx>,
    pub gas_limit: u64,
}

impl<'ctx> TransactionRecord<'ctx> {
    /// A message call whose caller, origin, value and calldata are fresh symbols
    /// named after the transaction id.
    pub fn symbolic(ctx: &'ctx Context, id: &str, callee: U256, gas_limit: u64) -> Self {
        let index = Sort::bitvector(ctx, WORD_BITS);
        let byte = Sort::bitvector(ctx, 8);
        TransactionRecord {
            id: id.to_string(),
            kind: TransactionKind::MessageCall,
            callee,
            caller: BV::new_const(ctx, format!("sender_{}", id), WORD_BITS),
            origin: BV::new_const(ctx, format!("origin_{}", id), WORD_BITS),
            call_value: BV::new_const(ctx, format!("call_value_{}", id), WORD_BITS),
            calldata: Array::new_const(ctx, format!("{}_calldata", id), &index, &byte),
            calldata_size: BV::new_const(ctx, format!("{}_calldatasize", id), WORD_BITS),
            gas_limit,
        }
    }
}
