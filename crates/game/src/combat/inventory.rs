use super::slot::{FIREARM_COUNT, Material, Slot, SlotSet};
use super::tuning::CombatTuning;

/// Per-player resource ledger. The ledger is the sole owner of clip counts:
/// weapon entities carry no ammo, so a firearm's clip survives unequip and
/// re-equip without any transfer step.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    owned: SlotSet,
    clip: [u16; FIREARM_COUNT],
    reserve: [u16; FIREARM_COUNT],
    materials: [u32; Material::COUNT],
    bandages: u16,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owned(&self) -> SlotSet {
        self.owned
    }

    pub fn owns(&self, slot: Slot) -> bool {
        self.owned.owns(slot)
    }

    pub fn clip(&self, slot: Slot) -> u16 {
        slot.firearm_index().map_or(0, |i| self.clip[i])
    }

    pub fn reserve(&self, slot: Slot) -> u16 {
        slot.firearm_index().map_or(0, |i| self.reserve[i])
    }

    pub fn material(&self, material: Material) -> u32 {
        self.materials[material.index()]
    }

    pub fn bandages(&self) -> u16 {
        self.bandages
    }

    pub fn add_material(&mut self, material: Material, amount: u32) {
        let count = &mut self.materials[material.index()];
        *count = count.saturating_add(amount);
    }

    /// Deducts `amount` if available. No partial spend.
    pub fn spend_material(&mut self, material: Material, amount: u32) -> bool {
        let count = &mut self.materials[material.index()];
        if *count < amount {
            return false;
        }
        *count -= amount;
        true
    }

    /// Reserve ammo is uncapped; non-firearm slots take no ammo.
    pub fn add_ammo(&mut self, slot: Slot, rounds: u16) {
        if let Some(i) = slot.firearm_index() {
            self.reserve[i] = self.reserve[i].saturating_add(rounds);
        }
    }

    pub fn add_bandages(&mut self, count: u16) {
        self.bandages = self.bandages.saturating_add(count);
    }

    pub fn use_bandage(&mut self) -> bool {
        if self.bandages == 0 {
            return false;
        }
        self.bandages -= 1;
        true
    }

    /// Claims a weapon slot. Rejected without mutation if the slot is
    /// already owned; on success the slot's clip starts full, since a
    /// picked-up weapon arrives loaded.
    pub fn register_weapon(&mut self, slot: Slot, tuning: &CombatTuning) -> bool {
        if self.owned.owns(slot) {
            return false;
        }

        self.owned.insert(SlotSet::of(slot));
        if let Some(i) = slot.firearm_index() {
            self.clip[i] = tuning.magazine_size(slot);
        }
        true
    }

    pub fn consume_round(&mut self, slot: Slot) -> bool {
        let Some(i) = slot.firearm_index() else {
            return false;
        };
        if self.clip[i] == 0 {
            return false;
        }
        self.clip[i] -= 1;
        true
    }

    /// Moves `min(reserve, magazine - clip)` rounds into the clip and
    /// returns how many moved.
    pub fn refill_clip(&mut self, slot: Slot, tuning: &CombatTuning) -> u16 {
        let Some(i) = slot.firearm_index() else {
            return 0;
        };

        let missing = tuning.magazine_size(slot).saturating_sub(self.clip[i]);
        let moved = missing.min(self.reserve[i]);
        self.clip[i] += moved;
        self.reserve[i] -= moved;
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_rejects_insufficient_material() {
        let mut inv = Inventory::new();
        inv.add_material(Material::Wood, 9);

        assert!(!inv.spend_material(Material::Wood, 10));
        assert_eq!(inv.material(Material::Wood), 9);

        inv.add_material(Material::Wood, 1);
        assert!(inv.spend_material(Material::Wood, 10));
        assert_eq!(inv.material(Material::Wood), 0);
    }

    #[test]
    fn register_weapon_rejects_owned_slot() {
        let tuning = CombatTuning::default();
        let mut inv = Inventory::new();

        assert!(inv.register_weapon(Slot::Rifle, &tuning));
        assert_eq!(inv.clip(Slot::Rifle), tuning.rifle_magazine);

        inv.consume_round(Slot::Rifle);
        assert!(!inv.register_weapon(Slot::Rifle, &tuning));
        // A rejected pickup must not touch the existing clip.
        assert_eq!(inv.clip(Slot::Rifle), tuning.rifle_magazine - 1);
    }

    #[test]
    fn refill_moves_min_of_reserve_and_missing() {
        let tuning = CombatTuning::default();
        let mut inv = Inventory::new();
        inv.register_weapon(Slot::Shotgun, &tuning);

        for _ in 0..4 {
            assert!(inv.consume_round(Slot::Shotgun));
        }
        assert_eq!(inv.clip(Slot::Shotgun), 1);

        inv.add_ammo(Slot::Shotgun, 3);
        assert_eq!(inv.refill_clip(Slot::Shotgun, &tuning), 3);
        assert_eq!(inv.clip(Slot::Shotgun), 4);
        assert_eq!(inv.reserve(Slot::Shotgun), 0);

        inv.add_ammo(Slot::Shotgun, 20);
        assert_eq!(inv.refill_clip(Slot::Shotgun, &tuning), 1);
        assert_eq!(inv.clip(Slot::Shotgun), tuning.shotgun_magazine);
        assert_eq!(inv.reserve(Slot::Shotgun), 19);
    }

    #[test]
    fn clip_never_exceeds_magazine() {
        let tuning = CombatTuning::default();
        let mut inv = Inventory::new();
        inv.register_weapon(Slot::Rifle, &tuning);
        inv.add_ammo(Slot::Rifle, 500);

        assert_eq!(inv.refill_clip(Slot::Rifle, &tuning), 0);
        assert!(inv.clip(Slot::Rifle) <= tuning.magazine_size(Slot::Rifle));
    }

    #[test]
    fn ammo_pickup_from_empty_reserve() {
        let mut inv = Inventory::new();
        assert_eq!(inv.reserve(Slot::Rifle), 0);

        inv.add_ammo(Slot::Rifle, 20);
        assert_eq!(inv.reserve(Slot::Rifle), 20);
    }

    #[test]
    fn bandage_count_floor_is_zero() {
        let mut inv = Inventory::new();
        assert!(!inv.use_bandage());

        inv.add_bandages(3);
        assert!(inv.use_bandage());
        assert_eq!(inv.bandages(), 2);
    }
}
