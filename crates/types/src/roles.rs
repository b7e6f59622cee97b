//! Role bitmaps and packed assignee counts.
//!
//! A [`RoleBitmap`] is a 128-bit integer split into 32 four-bit slots. The low
//! 16 slots hold regular roles, the high 16 slots hold the matching admin
//! roles at [`ADMIN_OFFSET`]. Only the lowest bit of a slot is a role bit; the
//! full slot is used by [`AssigneeCounts`] to store a holder count of up to
//! [`MAX_ASSIGNEES`].

use crate::errors::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::str::FromStr;

/// Width of one role slot in bits.
pub const SLOT_BITS: u32 = 4;
/// Number of regular role slots.
pub const MAX_ROLES: u32 = 16;
/// Distance between a regular role bit and its admin bit.
pub const ADMIN_OFFSET: u32 = SLOT_BITS * MAX_ROLES;
/// Largest holder count a slot can store.
pub const MAX_ASSIGNEES: u8 = 15;

const SLOT_MASK: u128 = 0xF;
const REGULAR_MASK: u128 = 0x1111_1111_1111_1111;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RoleBitmap(pub u128);

impl RoleBitmap {
    pub const EMPTY: RoleBitmap = RoleBitmap(0);
    pub const ALL_REGULAR: RoleBitmap = RoleBitmap(REGULAR_MASK);
    pub const ALL_ADMIN: RoleBitmap = RoleBitmap(REGULAR_MASK << ADMIN_OFFSET);
    pub const ALL: RoleBitmap = RoleBitmap(REGULAR_MASK | (REGULAR_MASK << ADMIN_OFFSET));

    pub const fn bits(self) -> u128 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Every set bit is the low bit of a slot.
    pub const fn is_valid(self) -> bool {
        self.0 & !Self::ALL.0 == 0
    }

    pub const fn contains(self, other: RoleBitmap) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: RoleBitmap) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn regular(self) -> RoleBitmap {
        RoleBitmap(self.0 & REGULAR_MASK)
    }

    pub const fn admin(self) -> RoleBitmap {
        RoleBitmap(self.0 & Self::ALL_ADMIN.0)
    }

    pub const fn has_admin_bits(self) -> bool {
        self.0 & Self::ALL_ADMIN.0 != 0
    }

    /// Admin bits that authorise setting each bit of `self`.
    ///
    /// Regular bits map to their admin bit; admin bits map to themselves.
    pub const fn required_admin(self) -> RoleBitmap {
        RoleBitmap(((self.0 & REGULAR_MASK) << ADMIN_OFFSET) | (self.0 & Self::ALL_ADMIN.0))
    }

    /// Bit positions of every set bit, lowest first.
    pub fn positions(self) -> impl Iterator<Item = u32> {
        let bits = self.0;
        (0..128u32).filter(move |pos| bits & (1u128 << pos) != 0)
    }

    /// Roles whose regular bit is set.
    pub fn roles(self) -> Vec<Role> {
        Role::ALL
            .iter()
            .copied()
            .filter(|r| self.contains(r.bit()))
            .collect()
    }

    /// Roles whose admin bit is set.
    pub fn admin_roles(self) -> Vec<Role> {
        Role::ALL
            .iter()
            .copied()
            .filter(|r| self.contains(r.admin_bit()))
            .collect()
    }
}

impl BitOr for RoleBitmap {
    type Output = RoleBitmap;

    fn bitor(self, rhs: Self) -> Self::Output {
        RoleBitmap(self.0 | rhs.0)
    }
}

impl BitOrAssign for RoleBitmap {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for RoleBitmap {
    type Output = RoleBitmap;

    fn bitand(self, rhs: Self) -> Self::Output {
        RoleBitmap(self.0 & rhs.0)
    }
}

impl Not for RoleBitmap {
    type Output = RoleBitmap;

    fn not(self) -> Self::Output {
        RoleBitmap(!self.0)
    }
}

impl From<Role> for RoleBitmap {
    fn from(role: Role) -> Self {
        role.bit()
    }
}

impl fmt::Display for RoleBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#034x}", self.0)
    }
}

impl FromStr for RoleBitmap {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let payload = s.strip_prefix("0x").unwrap_or(s);
        u128::from_str_radix(payload, 16)
            .map(RoleBitmap)
            .map_err(|_| CodecError::InvalidHex {
                input: s.to_string(),
            })
    }
}

impl From<RoleBitmap> for String {
    fn from(value: RoleBitmap) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for RoleBitmap {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Named roles. The discriminant is the slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Role {
    /// Register unreserved names under the registry.
    Registrar = 0,
    /// Reserve names, and register names that are currently reserved.
    RegisterReserved = 1,
    Unregister = 2,
    Renew = 3,
    SetSubregistry = 4,
    SetResolver = 5,
    SetTokenObserver = 6,
    /// Held by an owner to move its token to another account.
    CanTransfer = 7,
    Burn = 8,
}

impl Role {
    pub const ALL: [Role; 9] = [
        Role::Registrar,
        Role::RegisterReserved,
        Role::Unregister,
        Role::Renew,
        Role::SetSubregistry,
        Role::SetResolver,
        Role::SetTokenObserver,
        Role::CanTransfer,
        Role::Burn,
    ];

    pub const fn slot(self) -> u32 {
        self as u32
    }

    pub const fn bit(self) -> RoleBitmap {
        RoleBitmap(1u128 << (self.slot() * SLOT_BITS))
    }

    pub const fn admin_bit(self) -> RoleBitmap {
        RoleBitmap(1u128 << (self.slot() * SLOT_BITS + ADMIN_OFFSET))
    }

    /// Regular and admin bit together.
    pub const fn with_admin(self) -> RoleBitmap {
        RoleBitmap(self.bit().0 | self.admin_bit().0)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Role::Registrar => "registrar",
            Role::RegisterReserved => "register_reserved",
            Role::Unregister => "unregister",
            Role::Renew => "renew",
            Role::SetSubregistry => "set_subregistry",
            Role::SetResolver => "set_resolver",
            Role::SetTokenObserver => "set_token_observer",
            Role::CanTransfer => "can_transfer",
            Role::Burn => "burn",
        }
    }

    /// Parse a comma-separated list of role names into a bitmap.
    ///
    /// A name suffixed with `_admin` selects the admin bit.
    pub fn parse_list(list: &str) -> Result<RoleBitmap, CodecError> {
        let mut bitmap = RoleBitmap::EMPTY;
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            bitmap |= match item.strip_suffix("_admin") {
                Some(base) => base.parse::<Role>()?.admin_bit(),
                None => item.parse::<Role>()?.bit(),
            };
        }
        Ok(bitmap)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Role {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.name() == s)
            .ok_or_else(|| CodecError::UnknownRole {
                name: s.to_string(),
            })
    }
}

/// Roles an owner usually receives at registration.
///
/// Unregister and burn are deliberately absent; they must be granted
/// explicitly.
pub const DEFAULT_OWNER_ROLES: RoleBitmap = RoleBitmap(
    Role::Renew.with_admin().0
        | Role::SetSubregistry.with_admin().0
        | Role::SetResolver.with_admin().0
        | Role::SetTokenObserver.with_admin().0
        | Role::CanTransfer.with_admin().0,
);

/// Per-resource holder counts, one four-bit slot per role bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssigneeCounts(pub u128);

impl AssigneeCounts {
    /// Count stored in the slot of the role bit at `position`.
    pub const fn count_at(self, position: u32) -> u8 {
        ((self.0 >> position) & SLOT_MASK) as u8
    }

    /// Counts for each role in `query`, each at its role's slot.
    pub const fn masked(self, query: RoleBitmap) -> u128 {
        let query = query.0 & RoleBitmap::ALL.0;
        self.0 & query.wrapping_mul(SLOT_MASK)
    }

    /// Add one holder to each role in `added`.
    ///
    /// Returns the bit position of the first role that would exceed
    /// [`MAX_ASSIGNEES`] instead.
    pub fn try_add(self, added: RoleBitmap) -> Result<AssigneeCounts, u32> {
        let mut counts = self.0;
        for pos in added.positions() {
            if ((counts >> pos) & SLOT_MASK) as u8 >= MAX_ASSIGNEES {
                return Err(pos);
            }
            counts += 1u128 << pos;
        }
        Ok(AssigneeCounts(counts))
    }

    /// Remove one holder from each role in `removed`. Empty slots stay at zero.
    pub fn remove(self, removed: RoleBitmap) -> AssigneeCounts {
        let mut counts = self.0;
        for pos in removed.positions() {
            if (counts >> pos) & SLOT_MASK != 0 {
                counts -= 1u128 << pos;
            }
        }
        AssigneeCounts(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_hex_round_trips() {
        let roles = Role::Renew.with_admin() | Role::Burn.bit();
        let parsed: RoleBitmap = roles.to_string().parse().unwrap();
        assert_eq!(parsed, roles);
        assert!("0xzz".parse::<RoleBitmap>().is_err());
    }

    #[test]
    fn role_bits_are_slot_aligned() {
        for role in Role::ALL {
            assert_eq!(role.bit().0.trailing_zeros(), role.slot() * SLOT_BITS);
            assert_eq!(
                role.admin_bit().0.trailing_zeros(),
                role.slot() * SLOT_BITS + ADMIN_OFFSET
            );
            assert!(role.with_admin().is_valid());
        }
    }

    #[test]
    fn non_slot_bits_are_invalid() {
        assert!(RoleBitmap::ALL.is_valid());
        assert!(!RoleBitmap(0b10).is_valid());
        assert!(!RoleBitmap(1u128 << 127).is_valid());
        assert!(RoleBitmap(1u128 << 124).is_valid());
    }

    #[test]
    fn required_admin_maps_both_halves() {
        let bitmap = Role::Renew.bit() | Role::SetResolver.admin_bit();
        assert_eq!(
            bitmap.required_admin(),
            Role::Renew.admin_bit() | Role::SetResolver.admin_bit()
        );
    }

    #[test]
    fn regular_and_admin_split() {
        let bitmap = Role::Burn.with_admin() | Role::Renew.bit();
        assert_eq!(bitmap.regular(), Role::Burn.bit() | Role::Renew.bit());
        assert_eq!(bitmap.admin(), Role::Burn.admin_bit());
        assert!(bitmap.has_admin_bits());
        assert_eq!(bitmap.roles(), vec![Role::Renew, Role::Burn]);
        assert_eq!(bitmap.admin_roles(), vec![Role::Burn]);
    }

    #[test]
    fn default_owner_roles_exclude_destructive_roles() {
        assert!(!DEFAULT_OWNER_ROLES.intersects(Role::Unregister.with_admin()));
        assert!(!DEFAULT_OWNER_ROLES.intersects(Role::Burn.with_admin()));
        assert!(DEFAULT_OWNER_ROLES.contains(Role::CanTransfer.bit()));
    }

    #[test]
    fn parse_role_list() {
        let bitmap = Role::parse_list("renew, set_resolver_admin").unwrap();
        assert_eq!(bitmap, Role::Renew.bit() | Role::SetResolver.admin_bit());
        assert!(Role::parse_list("renew,nope").is_err());
        assert_eq!(Role::parse_list("").unwrap(), RoleBitmap::EMPTY);
    }

    #[test]
    fn counts_are_placed_at_role_slots() {
        let counts = AssigneeCounts::default()
            .try_add(Role::Renew.bit() | Role::Burn.admin_bit())
            .unwrap()
            .try_add(Role::Renew.bit())
            .unwrap();
        assert_eq!(counts.count_at(Role::Renew.bit().0.trailing_zeros()), 2);
        assert_eq!(counts.masked(Role::Renew.bit()), 2u128 << (Role::Renew.slot() * 4));
        assert_eq!(
            counts.masked(Role::Burn.admin_bit()),
            1u128 << (Role::Burn.slot() * 4 + ADMIN_OFFSET)
        );
        assert_eq!(counts.masked(RoleBitmap::EMPTY), 0);
        assert_eq!(counts.masked(Role::Registrar.bit()), 0);
    }

    #[test]
    fn counts_saturate_at_ceiling() {
        let mut counts = AssigneeCounts::default();
        for _ in 0..MAX_ASSIGNEES {
            counts = counts.try_add(Role::Renew.bit()).unwrap();
        }
        let pos = Role::Renew.bit().0.trailing_zeros();
        assert_eq!(counts.count_at(pos), 15);
        assert_eq!(counts.try_add(Role::Renew.bit()), Err(pos));
        // neighbouring slot is untouched
        assert_eq!(counts.count_at(pos + SLOT_BITS), 0);
    }

    #[test]
    fn remove_never_borrows_from_neighbour() {
        let counts = AssigneeCounts::default()
            .try_add(Role::SetSubregistry.bit())
            .unwrap();
        let after = counts.remove(Role::Renew.bit() | Role::SetSubregistry.bit());
        assert_eq!(after, AssigneeCounts::default());
    }
}
