//! The NFT ownership detection module: plugin metadata, the rule priority table
//! and the per-state orchestration.

use std::collections::HashSet;

use ethnum::U256;
use log::{debug, trace};

use super::context::DetectionContext;
use super::issue::Issue;
use super::rules::RuleKind;
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::state::{StateView, SymbolicState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryPoint {
    /// Invoked by the engine at the instructions named in `pre_hooks`.
    Callback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PluginMetadata {
    pub name: &'static str,
    pub author: &'static str,
    pub license: &'static str,
    pub plugin_type: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub default_enabled: bool,
    pub entry_point: EntryPoint,
    pub pre_hooks: &'static [&'static str],
}

pub const PLUGIN_METADATA: PluginMetadata = PluginMetadata {
    name: "nft_ownership_detector",
    author: "Krishna Kushal",
    license: "MIT",
    plugin_type: "Detection Module",
    version: "0.0.1",
    description: "Finds NFT ownership-transfer vulnerabilities: ownership takeover and \
                  missing marketplace checks on sellers, buyers, balances, transaction \
                  identifiers, prices and ownership transfer.",
    default_enabled: true,
    entry_point: EntryPoint::Callback,
    pre_hooks: &["SSTORE"],
};

/// One entry of the priority table. An exclusive rule that fires ends the
/// evaluation of the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleSlot {
    pub rule: RuleKind,
    pub exclusive: bool,
}

pub const DEFAULT_RULES: [RuleSlot; 7] = [
    RuleSlot { rule: RuleKind::OwnershipTakeover, exclusive: true },
    RuleSlot { rule: RuleKind::SellerAddressVerification, exclusive: false },
    RuleSlot { rule: RuleKind::BuyerAddressVerification, exclusive: false },
    RuleSlot { rule: RuleKind::InsufficientBalanceCheck, exclusive: false },
    RuleSlot { rule: RuleKind::TransactionIdNotUnique, exclusive: false },
    RuleSlot { rule: RuleKind::PurchasePriceMismatch, exclusive: false },
    RuleSlot { rule: RuleKind::OwnershipNotTransferred, exclusive: false },
];

#[derive(Clone, Debug)]
pub struct NftOwnershipDetector {
    enabled: bool,
    rules: Vec<RuleSlot>,
    issues: Vec<Issue>,
    // (contract address, instruction address, rule) already reported
    cache: HashSet<(U256, usize, RuleKind)>,
}

impl NftOwnershipDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        NftOwnershipDetector {
            enabled: config.enabled,
            rules: DEFAULT_RULES.to_vec(),
            issues: Vec::new(),
            cache: HashSet::new(),
        }
    }

    pub fn metadata() -> &'static PluginMetadata {
        &PLUGIN_METADATA
    }

    pub fn rules(&self) -> &[RuleSlot] {
        &self.rules
    }

    /// Issues accumulated over every executed state since the last reset.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn reset_module(&mut self) {
        self.issues.clear();
        self.cache.clear();
    }

    /// Engine callback. Analyses `state` if it sits on a hooked instruction and
    /// returns the findings not reported before at the same contract and
    /// address.
    pub fn execute<'ctx>(
        &mut self,
        context: &DetectionContext<'ctx>,
        state: &SymbolicState<'ctx>,
    ) -> Result<Vec<Issue>> {
        if !self.enabled {
            return Ok(Vec::new());
        }
        let opcode = state.instruction.opcode.mnemonic();
        if !PLUGIN_METADATA.pre_hooks.iter().any(|hook| *hook == opcode) {
            trace!(
                "Skipping {} at 0x{:x}: not a hooked instruction",
                opcode, state.instruction.address
            );
            return Ok(Vec::new());
        }

        let contract = state.environment.active_account;
        let mut fresh = Vec::new();
        for issue in self.analyze_state(context, state)? {
            if self.cache.insert((contract, issue.address(), issue.rule())) {
                fresh.push(issue);
            }
        }
        self.issues.extend(fresh.iter().cloned());
        Ok(fresh)
    }

    /// Runs the rule table over a private snapshot of `state`.
    ///
    /// An error from any rule aborts the whole state; issues found by earlier
    /// rules of the same state are discarded with it.
    pub fn analyze_state<'ctx>(
        &self,
        context: &DetectionContext<'ctx>,
        state: &SymbolicState<'ctx>,
    ) -> Result<Vec<Issue>> {
        let snapshot = state.clone();
        let view = StateView::new(&snapshot);
        let mut issues = Vec::new();

        for slot in &self.rules {
            if let Some(issue) = slot.rule.evaluate(context, &view)? {
                issues.push(issue);
                if slot.exclusive {
                    debug!("{} fired, skipping remaining rules", slot.rule);
                    break;
                }
            }
        }
        Ok(issues)
    }
}
