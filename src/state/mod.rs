pub mod account;
pub mod actors;
pub mod bitvec;
pub mod constraints;
pub mod environment;
pub mod state_manager;
pub mod state_view;
pub mod transaction;

pub use account::{Account, Bytecode, ContractVariant, Storage};
pub use actors::{Actor, Actors};
pub use constraints::Constraints;
pub use environment::{Environment, Instruction, MachineState, Opcode};
pub use state_manager::{SymbolicState, WorldState};
pub use state_view::{StateView, StorageWrite};
pub use transaction::{TransactionKind, TransactionRecord};
