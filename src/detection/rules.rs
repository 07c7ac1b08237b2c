//! Vulnerability rules.
//!
//! Every rule turns a state into a candidate constraint set, narrows the path
//! constraints with it and asks the solver for a witness. A satisfiable
//! narrowing becomes an [`Issue`]; an unsatisfiable one yields nothing.

use std::fmt;

use log::{debug, info};
use serde::Serialize;
use z3::ast::{Ast, Bool};

use super::context::DetectionContext;
use super::issue::Issue;
use crate::error::Result;
use crate::solver::Solution;
use crate::state::bitvec::word;
use crate::state::{Actor, ContractVariant, StateView};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleKind {
    OwnershipTakeover,
    SellerAddressVerification,
    BuyerAddressVerification,
    InsufficientBalanceCheck,
    TransactionIdNotUnique,
    PurchasePriceMismatch,
    OwnershipNotTransferred,
}

impl RuleKind {
    pub const ALL: [RuleKind; 7] = [
        RuleKind::OwnershipTakeover,
        RuleKind::SellerAddressVerification,
        RuleKind::BuyerAddressVerification,
        RuleKind::InsufficientBalanceCheck,
        RuleKind::TransactionIdNotUnique,
        RuleKind::PurchasePriceMismatch,
        RuleKind::OwnershipNotTransferred,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            RuleKind::OwnershipTakeover => "ownership-takeover",
            RuleKind::SellerAddressVerification => "seller-address-verification",
            RuleKind::BuyerAddressVerification => "buyer-address-verification",
            RuleKind::InsufficientBalanceCheck => "insufficient-balance-check",
            RuleKind::TransactionIdNotUnique => "transaction-id-not-unique",
            RuleKind::PurchasePriceMismatch => "purchase-price-mismatch",
            RuleKind::OwnershipNotTransferred => "ownership-not-transferred",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RuleKind::OwnershipTakeover => "Ownership Takeover",
            RuleKind::SellerAddressVerification => "Seller Address Vulnerability detected",
            RuleKind::BuyerAddressVerification => "Buyer Address Vulnerability detected",
            RuleKind::InsufficientBalanceCheck => {
                "Insufficient Buyer Wallet Balance Check not implemented"
            }
            RuleKind::TransactionIdNotUnique => "Transaction ID unique Check not implemented",
            RuleKind::PurchasePriceMismatch => {
                "Purchase Price/Transaction ID mismatch Check not implemented"
            }
            RuleKind::OwnershipNotTransferred => "Ownership not transferred Check not implemented",
        }
    }

    pub fn description_head(&self) -> &'static str {
        match self {
            RuleKind::OwnershipTakeover => "Ownership takeover vulnerability detected.",
            other => other.title(),
        }
    }

    pub fn description_tail(&self) -> &'static str {
        match self {
            RuleKind::OwnershipTakeover => {
                "An account other than the current owner can write its own address into the owner slot."
            }
            RuleKind::SellerAddressVerification => {
                "The transfer is accepted without validating the seller's wallet address."
            }
            RuleKind::BuyerAddressVerification => {
                "The transfer is accepted without validating the buyer's wallet address."
            }
            RuleKind::InsufficientBalanceCheck => {
                "A single direct call leaves the caller strictly wealthier without an enforced payment."
            }
            RuleKind::TransactionIdNotUnique => "A transaction identifier can be reused.",
            RuleKind::PurchasePriceMismatch => {
                "Funds credited to the seller are not checked against the purchase price and transaction identifier."
            }
            RuleKind::OwnershipNotTransferred => {
                "Payment completes without the NFT owner changing from seller to buyer."
            }
        }
    }

    /// Benchmark variant this rule is restricted to, if any.
    pub fn variant(&self) -> Option<ContractVariant> {
        match self {
            RuleKind::OwnershipTakeover => None,
            RuleKind::SellerAddressVerification => Some(ContractVariant::SellerAddressUnchecked),
            RuleKind::BuyerAddressVerification => Some(ContractVariant::BuyerAddressUnchecked),
            RuleKind::InsufficientBalanceCheck => Some(ContractVariant::BuyerBalanceUnchecked),
            RuleKind::TransactionIdNotUnique => Some(ContractVariant::TransactionIdReused),
            RuleKind::PurchasePriceMismatch => Some(ContractVariant::PurchasePriceMismatch),
            RuleKind::OwnershipNotTransferred => Some(ContractVariant::OwnershipNotTransferred),
        }
    }

    pub fn reports_gas(&self) -> bool {
        *self == RuleKind::OwnershipTakeover
    }

    /// Constraints that, together with the path, characterise the vulnerability.
    pub fn candidate_constraints<'ctx>(
        &self,
        context: &DetectionContext<'ctx>,
        view: &StateView<'_, 'ctx>,
    ) -> Result<Vec<Bool<'ctx>>> {
        let ctx = view.ctx();
        let actors = context.actors();
        let mut candidate = Vec::new();

        if let Some(wanted) = self.variant() {
            let applies = view.active_account()?.variant.selects(wanted);
            candidate.push(Bool::from_bool(ctx, applies));
        }

        match self {
            RuleKind::OwnershipTakeover => {
                let write = view.storage_write()?;
                let owner = view.stored_owner()?;
                candidate.push(write.slot._eq(&word(ctx, 0)));
                candidate.push(actors.owns_address_segment(Actor::Attacker, &owner).not());
                candidate.push(actors.owns_address_segment(Actor::Attacker, &write.value));
                candidate.push(actors.is(Actor::Attacker, view.sender()));
            }
            RuleKind::InsufficientBalanceCheck => {
                let attacker = actors.attacker();
                let tx = view.current_transaction()?;
                candidate.push(view.balance(attacker)?.bvugt(&view.starting_balance(attacker)?));
                candidate.push(actors.is(Actor::Attacker, view.sender()));
                candidate.push(tx.caller._eq(&tx.origin));
            }
            _ => {}
        }
        Ok(candidate)
    }

    /// Runs the rule against one state.
    pub fn evaluate<'ctx>(
        &self,
        context: &DetectionContext<'ctx>,
        view: &StateView<'_, 'ctx>,
    ) -> Result<Option<Issue>> {
        debug!("Evaluating {} at 0x{:x}", self, view.instruction().address);

        // Selector rules first make sure the path itself is feasible.
        if self.variant().is_some() && !context.check_sat(view.constraints())? {
            debug!("{}: path constraints are unsatisfiable", self);
            return Ok(None);
        }

        let constraints = view.constraints_with(self.candidate_constraints(context, view)?);
        match context.solve_witness(view, &constraints)? {
            Solution::Found(witness) => {
                let issue = Issue::from_witness(*self, view, witness)?;
                info!(
                    "{} in {}::{} at 0x{:x}",
                    self.title(),
                    issue.contract(),
                    issue.function_name(),
                    issue.address()
                );
                Ok(Some(issue))
            }
            Solution::Unsatisfiable => {
                debug!("{}: candidate constraints are unsatisfiable", self);
                Ok(None)
            }
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
