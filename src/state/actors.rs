use ethnum::U256;
use z3::ast::{Ast, Bool, BV};
use z3::Context;

use super::bitvec::{address_mask, address_segment, bv_from_u256};
use crate::config::ResolvedActors;

/// Roles the symbolic transactions can be sent from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Actor {
    Creator,
    Attacker,
    Someguy,
}

impl Actor {
    pub fn label(&self) -> &'static str {
        match self {
            Actor::Creator => "CREATOR",
            Actor::Attacker => "ATTACKER",
            Actor::Someguy => "SOMEGUY",
        }
    }
}

/// Table of the actor constants shared by every rule evaluation.
#[derive(Clone, Debug)]
pub struct Actors<'ctx> {
    addresses: ResolvedActors,
    creator: BV<'ctx>,
    attacker: BV<'ctx>,
    someguy: BV<'ctx>,
}

impl<'ctx> Actors<'ctx> {
    pub fn new(ctx: &'ctx Context, addresses: ResolvedActors) -> Self {
        Actors {
            addresses,
            creator: bv_from_u256(ctx, addresses.creator),
            attacker: bv_from_u256(ctx, addresses.attacker),
            someguy: bv_from_u256(ctx, addresses.someguy),
        }
    }

    pub fn get(&self, actor: Actor) -> &BV<'ctx> {
        match actor {
            Actor::Creator => &self.creator,
            Actor::Attacker => &self.attacker,
            Actor::Someguy => &self.someguy,
        }
    }

    pub fn attacker(&self) -> &BV<'ctx> {
        &self.attacker
    }

    pub fn address_of(&self, actor: Actor) -> U256 {
        match actor {
            Actor::Creator => self.addresses.creator,
            Actor::Attacker => self.addresses.attacker,
            Actor::Someguy => self.addresses.someguy,
        }
    }

    /// Constraint `value == actor` over the full word.
    pub fn is(&self, actor: Actor, value: &BV<'ctx>) -> Bool<'ctx> {
        value._eq(self.get(actor))
    }

    /// Constraint that the address segment (low 160 bits) of `value` is `actor`.
    pub fn owns_address_segment(&self, actor: Actor, value: &BV<'ctx>) -> Bool<'ctx> {
        address_segment(value)._eq(&address_segment(self.get(actor)))
    }

    /// Reverse lookup used to label concrete witness addresses.
    pub fn identify(&self, address: U256) -> Option<Actor> {
        let address = address & address_mask();
        [Actor::Creator, Actor::Attacker, Actor::Someguy]
            .into_iter()
            .find(|actor| self.address_of(*actor) & address_mask() == address)
    }
}
