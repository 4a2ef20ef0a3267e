mod gate;
mod inventory;
mod slot;
mod state;
mod tuning;

pub use gate::{ActionGate, LockKind, LockToken};
pub use inventory::Inventory;
pub use slot::{FIREARM_COUNT, ItemKind, Material, Slot, SlotSet, StructureKind};
pub use state::{AimTrack, CombatState};
pub use tuning::CombatTuning;
