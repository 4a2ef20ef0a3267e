use bitflags::bitflags;
use rkyv::{Archive, Deserialize, Serialize};

pub const FIREARM_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
#[repr(u8)]
pub enum Slot {
    Pickaxe = 0,
    Rifle = 1,
    Shotgun = 2,
}

impl Slot {
    pub fn is_firearm(self) -> bool {
        matches!(self, Slot::Rifle | Slot::Shotgun)
    }

    /// Dense index into the per-firearm clip/reserve arrays.
    pub fn firearm_index(self) -> Option<usize> {
        match self {
            Slot::Rifle => Some(0),
            Slot::Shotgun => Some(1),
            Slot::Pickaxe => None,
        }
    }
}

impl From<u8> for Slot {
    fn from(value: u8) -> Self {
        match value {
            1 => Slot::Rifle,
            2 => Slot::Shotgun,
            _ => Slot::Pickaxe,
        }
    }
}

/// What the hand returns to outside build mode. Bandages are held like a
/// weapon but live outside the slot set, so the wire encoding folds them
/// into the "no weapon" value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
#[repr(u8)]
pub enum ItemKind {
    Pickaxe = 0,
    Rifle = 1,
    Shotgun = 2,
    Bandage = 3,
}

impl ItemKind {
    pub fn slot(self) -> Option<Slot> {
        match self {
            ItemKind::Pickaxe => Some(Slot::Pickaxe),
            ItemKind::Rifle => Some(Slot::Rifle),
            ItemKind::Shotgun => Some(Slot::Shotgun),
            ItemKind::Bandage => None,
        }
    }

    pub fn is_firearm(self) -> bool {
        matches!(self, ItemKind::Rifle | ItemKind::Shotgun)
    }

    pub fn is_weapon(self) -> bool {
        self != ItemKind::Bandage
    }

    pub fn wire_slot(self) -> i8 {
        match self {
            ItemKind::Pickaxe => 0,
            ItemKind::Rifle => 1,
            ItemKind::Shotgun => 2,
            ItemKind::Bandage => -1,
        }
    }

    pub fn from_wire_slot(value: i8) -> Self {
        match value {
            0 => ItemKind::Pickaxe,
            1 => ItemKind::Rifle,
            2 => ItemKind::Shotgun,
            _ => ItemKind::Bandage,
        }
    }
}

impl From<Slot> for ItemKind {
    fn from(slot: Slot) -> Self {
        match slot {
            Slot::Pickaxe => ItemKind::Pickaxe,
            Slot::Rifle => ItemKind::Rifle,
            Slot::Shotgun => ItemKind::Shotgun,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SlotSet: u8 {
        const PICKAXE = 1 << 0;
        const RIFLE = 1 << 1;
        const SHOTGUN = 1 << 2;
    }
}

impl SlotSet {
    pub fn of(slot: Slot) -> Self {
        match slot {
            Slot::Pickaxe => SlotSet::PICKAXE,
            Slot::Rifle => SlotSet::RIFLE,
            Slot::Shotgun => SlotSet::SHOTGUN,
        }
    }

    pub fn owns(&self, slot: Slot) -> bool {
        self.contains(Self::of(slot))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
#[repr(u8)]
pub enum Material {
    #[default]
    Wood = 0,
    Stone = 1,
    Steel = 2,
}

impl Material {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Self {
        match self {
            Material::Wood => Material::Stone,
            Material::Stone => Material::Steel,
            Material::Steel => Material::Wood,
        }
    }
}

impl From<u8> for Material {
    fn from(value: u8) -> Self {
        match value {
            1 => Material::Stone,
            2 => Material::Steel,
            _ => Material::Wood,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize)]
#[rkyv(compare(PartialEq), derive(Debug))]
#[repr(u8)]
pub enum StructureKind {
    Wall = 0,
    Ramp = 1,
    Floor = 2,
}

impl From<u8> for StructureKind {
    fn from(value: u8) -> Self {
        match value {
            1 => StructureKind::Ramp,
            2 => StructureKind::Floor,
            _ => StructureKind::Wall,
        }
    }
}
