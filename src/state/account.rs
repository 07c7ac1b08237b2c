//! Contract accounts as seen by the detector: identity, benchmark variant tag,
//! bytecode and persistent storage.

use std::fmt;

use ethnum::U256;
use z3::ast::{Array, BV};
use z3::{Context, Sort};

use super::bitvec::{format_address, WORD_BITS};
use crate::error::{DetectorError, Result};

/// Label of an intentionally vulnerable benchmark contract.
///
/// Assigned once when the account is loaded. Labelled corpora name their
/// contracts `<Name>_<n>`; an unsuffixed name is [`ContractVariant::Unlabeled`]
/// and matches every selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContractVariant {
    Unlabeled,
    SellerAddressUnchecked,
    BuyerAddressUnchecked,
    BuyerBalanceUnchecked,
    TransactionIdReused,
    PurchasePriceMismatch,
    OwnershipNotTransferred,
    /// A suffix no rule selects.
    Other,
}

impl ContractVariant {
    pub fn from_label(label: &str) -> Self {
        match label {
            "1" => ContractVariant::SellerAddressUnchecked,
            "2" => ContractVariant::BuyerAddressUnchecked,
            "3" => ContractVariant::BuyerBalanceUnchecked,
            "4" => ContractVariant::TransactionIdReused,
            "5" => ContractVariant::PurchasePriceMismatch,
            "6" => ContractVariant::OwnershipNotTransferred,
            _ => ContractVariant::Other,
        }
    }

    /// Tags a contract from the benchmark naming convention: the label is the
    /// second `_`-separated component of the name.
    pub fn from_contract_name(name: &str) -> Self {
        let mut parts = name.split('_');
        parts.next();
        match parts.next() {
            None => ContractVariant::Unlabeled,
            Some(label) => ContractVariant::from_label(label),
        }
    }

    /// Whether a rule selecting `wanted` applies to a contract of this variant.
    pub fn selects(&self, wanted: ContractVariant) -> bool {
        *self == ContractVariant::Unlabeled || *self == wanted
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bytecode(pub Vec<u8>);

impl Bytecode {
    pub fn from_hex(text: &str) -> Option<Self> {
        let digits = text.trim().trim_start_matches("0x");
        if !digits.is_ascii() || digits.len() % 2 != 0 {
            return None;
        }
        (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
            .collect::<Option<Vec<u8>>>()
            .map(Bytecode)
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(2 + self.0.len() * 2);
        out.push_str("0x");
        for byte in &self.0 {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

/// Persistent key-value store of one account, 256-bit slots to 256-bit words.
/// Slots never written read as fresh symbolic words.
#[derive(Clone, Debug, PartialEq)]
pub struct Storage<'ctx> {
    array: Array<'ctx>,
}

impl<'ctx> Storage<'ctx> {
    pub fn symbolic(ctx: &'ctx Context, name: &str) -> Self {
        let sort = Sort::bitvector(ctx, WORD_BITS);
        Storage {
            array: Array::new_const(ctx, format!("storage_{}", name), &sort, &sort),
        }
    }

    pub fn load(&self, slot: &BV<'ctx>) -> Result<BV<'ctx>> {
        self.array
            .select(slot)
            .as_bv()
            .ok_or_else(|| DetectorError::missing(format!("storage[{}]", slot)))
    }

    pub fn store(&mut self, slot: &BV<'ctx>, value: &BV<'ctx>) {
        self.array = self.array.store(slot, value);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Account<'ctx> {
    pub address: U256,
    pub contract_name: String,
    pub variant: ContractVariant,
    pub code: Bytecode,
    pub storage: Storage<'ctx>,
}

impl<'ctx> Account<'ctx> {
    /// Loads an account, tagging its benchmark variant from `contract_name`.
    pub fn new(ctx: &'ctx Context, address: U256, contract_name: &str, code: Bytecode) -> Self {
        Account {
            address,
            contract_name: contract_name.to_string(),
            variant: ContractVariant::from_contract_name(contract_name),
            code,
            storage: Storage::symbolic(ctx, &format_address(address)),
        }
    }
}

impl<'ctx> fmt::Display for Account<'ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {:?})", self.contract_name, format_address(self.address), self.variant)
    }
}
