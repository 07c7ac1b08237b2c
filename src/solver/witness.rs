//! Projection of a solver model onto a concrete, replayable transaction
//! sequence.

use std::collections::BTreeMap;

use ethnum::U256;
use log::debug;
use serde::Serialize;
use z3::ast::{Ast, BV};
use z3::Model;

use super::{Solution, Z3Solver};
use crate::config::DetectorConfig;
use crate::error::{DetectorError, Result};
use crate::state::bitvec::{bv_from_u256, format_address, u256_from_bv, WORD_BITS};
use crate::state::{
    Actor, Actors, Constraints, Opcode, StateView, TransactionKind, TransactionRecord,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WitnessOptions {
    pub max_calldata_size: u64,
    pub minimise_calldata_size: bool,
    pub minimise_call_value: bool,
}

impl From<&DetectorConfig> for WitnessOptions {
    fn from(config: &DetectorConfig) -> Self {
        WitnessOptions {
            max_calldata_size: config.max_calldata_size,
            minimise_calldata_size: config.minimise_calldata_size,
            minimise_call_value: config.minimise_call_value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSequence {
    pub initial_state: InitialState,
    pub steps: Vec<TransactionStep>,
    /// Concrete operands of the SSTORE the state was hooked on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_write: Option<PendingWrite>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InitialState {
    pub accounts: BTreeMap<String, AccountSnapshot>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub balance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStep {
    pub id: String,
    pub kind: String,
    pub origin: String,
    pub caller: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_actor: Option<String>,
    pub address: String,
    pub value: String,
    pub input: String,
    pub gas_limit: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingWrite {
    pub slot: String,
    pub value: String,
}

impl TransactionSequence {
    pub fn last_step(&self) -> Option<&TransactionStep> {
        self.steps.last()
    }
}

/// Solves `constraints` for the state behind `view` and, when satisfiable,
/// concretises every transaction that led to it.
pub fn solve_witness<'ctx>(
    solver: &Z3Solver<'ctx>,
    actors: &Actors<'ctx>,
    options: &WitnessOptions,
    view: &StateView<'_, 'ctx>,
    constraints: &Constraints<'ctx>,
) -> Result<Solution<TransactionSequence>> {
    let ctx = view.ctx();
    let transactions = view.transaction_sequence();
    let bound = BV::from_u64(ctx, options.max_calldata_size, WORD_BITS);
    let constraints = constraints.narrowed(
        transactions
            .iter()
            .map(|tx| tx.calldata_size.bvule(&bound))
            .collect::<Vec<_>>(),
    );
    // Shortest calldata first, then the smallest value, per transaction.
    let mut objectives: Vec<BV<'ctx>> = Vec::new();
    for tx in transactions {
        if options.minimise_calldata_size {
            objectives.push(tx.calldata_size.clone());
        }
        if options.minimise_call_value {
            objectives.push(tx.call_value.clone());
        }
    }

    let model = match solver.get_model(&constraints, &objectives)? {
        Solution::Found(model) => model,
        Solution::Unsatisfiable => return Ok(Solution::Unsatisfiable),
    };

    let steps = transactions
        .iter()
        .map(|tx| concretise_transaction(&model, actors, options, tx))
        .collect::<Result<Vec<_>>>()?;
    let initial_state = initial_state(&model, actors, view)?;
    let pending_write = pending_write(&model, view)?;
    debug!("Extracted witness with {} transaction(s)", steps.len());

    Ok(Solution::Found(TransactionSequence {
        initial_state,
        steps,
        pending_write,
    }))
}

fn eval_u256<'ctx>(model: &Model<'ctx>, name: &str, bv: &BV<'ctx>) -> Result<U256> {
    let value = model
        .eval(bv, true)
        .ok_or_else(|| DetectorError::malformed(name, "model has no interpretation"))?;
    u256_from_bv(name, &value)
}

fn concretise_transaction<'ctx>(
    model: &Model<'ctx>,
    actors: &Actors<'ctx>,
    options: &WitnessOptions,
    tx: &TransactionRecord<'ctx>,
) -> Result<TransactionStep> {
    let caller = eval_u256(model, &format!("{}.caller", tx.id), &tx.caller)?;
    let origin = eval_u256(model, &format!("{}.origin", tx.id), &tx.origin)?;
    let value = eval_u256(model, &format!("{}.value", tx.id), &tx.call_value)?;
    let size = eval_u256(model, &format!("{}.calldatasize", tx.id), &tx.calldata_size)?;
    let size = size.min(U256::from(options.max_calldata_size)).as_u64();

    let mut input = String::with_capacity(2 + 2 * size as usize);
    input.push_str("0x");
    for offset in 0..size {
        let index = BV::from_u64(tx.calldata.get_ctx(), offset, WORD_BITS);
        let byte = tx
            .calldata
            .select(&index)
            .as_bv()
            .ok_or_else(|| {
                DetectorError::malformed(format!("{}.calldata", tx.id), "not a byte array")
            })?;
        let byte = eval_u256(model, &format!("{}.calldata[{}]", tx.id, offset), &byte)?;
        input.push_str(&format!("{:02x}", byte.as_u8()));
    }

    Ok(TransactionStep {
        id: tx.id.clone(),
        kind: match tx.kind {
            TransactionKind::MessageCall => "MessageCall".to_string(),
            TransactionKind::ContractCreation => "ContractCreation".to_string(),
        },
        origin: format_address(origin),
        caller: format_address(caller),
        caller_actor: actors.identify(caller).map(|actor| actor.label().to_string()),
        address: format_address(tx.callee),
        value: format!("0x{:x}", value),
        input,
        gas_limit: tx.gas_limit,
    })
}

fn initial_state<'ctx>(
    model: &Model<'ctx>,
    actors: &Actors<'ctx>,
    view: &StateView<'_, 'ctx>,
) -> Result<InitialState> {
    let ctx = view.ctx();
    let mut state = InitialState::default();

    for account in view.accounts() {
        let address = bv_from_u256(ctx, account.address);
        let balance = eval_u256(model, &account.contract_name, &view.starting_balance(&address)?)?;
        state.accounts.insert(
            format_address(account.address),
            AccountSnapshot {
                balance: format!("0x{:x}", balance),
                contract_name: Some(account.contract_name.clone()),
                actor: None,
            },
        );
    }
    for actor in [Actor::Creator, Actor::Attacker, Actor::Someguy] {
        let balance = eval_u256(model, actor.label(), &view.starting_balance(actors.get(actor))?)?;
        state
            .accounts
            .entry(format_address(actors.address_of(actor)))
            .or_insert(AccountSnapshot {
                balance: format!("0x{:x}", balance),
                contract_name: None,
                actor: Some(actor.label().to_string()),
            });
    }
    Ok(state)
}

fn pending_write<'ctx>(
    model: &Model<'ctx>,
    view: &StateView<'_, 'ctx>,
) -> Result<Option<PendingWrite>> {
    if view.instruction().opcode != Opcode::SStore {
        return Ok(None);
    }
    let write = view.storage_write()?;
    Ok(Some(PendingWrite {
        slot: format!("0x{:x}", eval_u256(model, "sstore.slot", &write.slot)?),
        value: format!("0x{:x}", eval_u256(model, "sstore.value", &write.value)?),
    }))
}
