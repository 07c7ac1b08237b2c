use std::fmt;

use serde::Serialize;

use super::rules::RuleKind;
use crate::error::Result;
use crate::solver::TransactionSequence;
use crate::state::StateView;

/// SWC-style identifier shared by every rule of this module.
pub const SWC_ID: &str = "000";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Severity {
    High,
}

/// A reported finding. Built once from a solved witness and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Issue {
    contract: String,
    function_name: String,
    address: usize,
    swc_id: &'static str,
    rule: RuleKind,
    title: &'static str,
    severity: Severity,
    description_head: &'static str,
    description_tail: &'static str,
    bytecode: String,
    transaction_sequence: TransactionSequence,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas_used: Option<(u64, u64)>,
}

impl Issue {
    /// Packages a witness with the metadata of `rule` and the location of the
    /// analysed state.
    pub(crate) fn from_witness(
        rule: RuleKind,
        view: &StateView<'_, '_>,
        transaction_sequence: TransactionSequence,
    ) -> Result<Self> {
        let account = view.active_account()?;
        Ok(Issue {
            contract: account.contract_name.clone(),
            function_name: view.function_name().to_string(),
            address: view.instruction().address,
            swc_id: SWC_ID,
            rule,
            title: rule.title(),
            severity: Severity::High,
            description_head: rule.description_head(),
            description_tail: rule.description_tail(),
            bytecode: account.code.to_hex(),
            transaction_sequence,
            gas_used: if rule.reports_gas() {
                Some(view.gas_bounds())
            } else {
                None
            },
        })
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn address(&self) -> usize {
        self.address
    }

    pub fn swc_id(&self) -> &str {
        self.swc_id
    }

    pub fn rule(&self) -> RuleKind {
        self.rule
    }

    pub fn title(&self) -> &str {
        self.title
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn description_head(&self) -> &str {
        self.description_head
    }

    pub fn description_tail(&self) -> &str {
        self.description_tail
    }

    /// Head and tail joined the way reports print them.
    pub fn description(&self) -> String {
        if self.description_tail.is_empty() {
            self.description_head.to_string()
        } else {
            format!("{}\n{}", self.description_head, self.description_tail)
        }
    }

    pub fn bytecode(&self) -> &str {
        &self.bytecode
    }

    pub fn transaction_sequence(&self) -> &TransactionSequence {
        &self.transaction_sequence
    }

    pub fn gas_used(&self) -> Option<(u64, u64)> {
        self.gas_used
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==== {} ====", self.title)?;
        writeln!(f, "SWC ID: {}", self.swc_id)?;
        writeln!(f, "Severity: {:?}", self.severity)?;
        writeln!(f, "Contract: {}", self.contract)?;
        writeln!(f, "Function name: {}", self.function_name)?;
        writeln!(f, "PC address: {}", self.address)?;
        if let Some((min, max)) = self.gas_used {
            writeln!(f, "Estimated Gas Usage: {} - {}", min, max)?;
        }
        writeln!(f, "{}", self.description())?;
        writeln!(f, "Transaction Sequence:")?;
        for step in &self.transaction_sequence.steps {
            writeln!(
                f,
                "  [{}] {} -> {} value={} input={}",
                step.caller_actor.as_deref().unwrap_or("?"),
                step.caller,
                step.address,
                step.value,
                step.input
            )?;
        }
        Ok(())
    }
}
