//! Domain types shared by the store, the roster logic, and the wire.
//!
//! These replace the loosely-typed blobs a table store would happily hold
//! (stat objects, move arrays, status objects) with explicit schemas. The
//! store keeps exactly these types, so anything that reaches it has already
//! been decoded into a known shape.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntryId, ROSTER_SLOTS, RosterId, SessionId, SlotIndex, UserId};

/// Upper bound of an individual value.
pub const IV_MAX: u16 = 31;

/// Upper bound of an effort value.
pub const EV_MAX: u16 = 255;

// ---------------------------------------------------------------------------
// Types and natures
// ---------------------------------------------------------------------------

/// An elemental type tag. Lower-case on the wire (`"fire"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PokemonType {
    Normal,
    Fire,
    Water,
    Electric,
    Grass,
    Ice,
    Fighting,
    Poison,
    Ground,
    Flying,
    Psychic,
    Bug,
    Rock,
    Ghost,
    Dragon,
    Dark,
    Steel,
    Fairy,
}

impl PokemonType {
    /// The lower-case name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Fire => "fire",
            Self::Water => "water",
            Self::Electric => "electric",
            Self::Grass => "grass",
            Self::Ice => "ice",
            Self::Fighting => "fighting",
            Self::Poison => "poison",
            Self::Ground => "ground",
            Self::Flying => "flying",
            Self::Psychic => "psychic",
            Self::Bug => "bug",
            Self::Rock => "rock",
            Self::Ghost => "ghost",
            Self::Dragon => "dragon",
            Self::Dark => "dark",
            Self::Steel => "steel",
            Self::Fairy => "fairy",
        }
    }
}

impl fmt::Display for PokemonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the 25 natures. Serialized by name (`"Hardy"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Nature {
    #[default]
    Hardy,
    Lonely,
    Brave,
    Adamant,
    Naughty,
    Bold,
    Docile,
    Relaxed,
    Impish,
    Lax,
    Timid,
    Hasty,
    Serious,
    Jolly,
    Naive,
    Modest,
    Mild,
    Quiet,
    Bashful,
    Rash,
    Calm,
    Gentle,
    Sassy,
    Careful,
    Quirky,
}

impl fmt::Display for Nature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Variant names are the display names.
        write!(f, "{self:?}")
    }
}

/// A persistent status condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Normal,
    Poison,
    Burn,
    Freeze,
    Paralysis,
    Sleep,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Names the six stats, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKind {
    Hp,
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
}

impl StatKind {
    /// Every stat in display order.
    pub const ALL: [StatKind; 6] = [
        StatKind::Hp,
        StatKind::Attack,
        StatKind::Defense,
        StatKind::SpecialAttack,
        StatKind::SpecialDefense,
        StatKind::Speed,
    ];

    /// Short label as shown in the stats panel.
    pub fn label(self) -> &'static str {
        match self {
            Self::Hp => "HP",
            Self::Attack => "ATTACK",
            Self::Defense => "DEFENSE",
            Self::SpecialAttack => "Sp. Atk",
            Self::SpecialDefense => "Sp. Def",
            Self::Speed => "SPEED",
        }
    }
}

/// A fixed six-field stat record, used for base stats, IVs, and EVs.
///
/// Values are stored exactly as given. IVs above 31 or EVs above 255 are
/// kept so a caller can see what was written; [`StatBlock::iv_violations`]
/// and [`StatBlock::ev_violations`] report them instead of rejecting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatBlock {
    pub hp: u16,
    pub attack: u16,
    pub defense: u16,
    pub special_attack: u16,
    pub special_defense: u16,
    pub speed: u16,
}

impl StatBlock {
    /// A block with every stat set to `value`.
    pub fn uniform(value: u16) -> Self {
        Self {
            hp: value,
            attack: value,
            defense: value,
            special_attack: value,
            special_defense: value,
            speed: value,
        }
    }

    /// Reads one stat.
    pub fn get(&self, kind: StatKind) -> u16 {
        match kind {
            StatKind::Hp => self.hp,
            StatKind::Attack => self.attack,
            StatKind::Defense => self.defense,
            StatKind::SpecialAttack => self.special_attack,
            StatKind::SpecialDefense => self.special_defense,
            StatKind::Speed => self.speed,
        }
    }

    /// Iterates `(stat, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (StatKind, u16)> + '_ {
        StatKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }

    /// Sum of all six stats.
    pub fn total(&self) -> u32 {
        self.iter().map(|(_, v)| u32::from(v)).sum()
    }

    /// Stats whose value exceeds `max`.
    pub fn above(&self, max: u16) -> Vec<StatKind> {
        self.iter()
            .filter(|(_, v)| *v > max)
            .map(|(kind, _)| kind)
            .collect()
    }

    /// Stats outside the IV range `0..=31`.
    pub fn iv_violations(&self) -> Vec<StatKind> {
        self.above(IV_MAX)
    }

    /// Stats outside the EV range `0..=255`.
    pub fn ev_violations(&self) -> Vec<StatKind> {
        self.above(EV_MAX)
    }
}

// ---------------------------------------------------------------------------
// Moves and sprites
// ---------------------------------------------------------------------------

/// A learned move.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub name: String,
    #[serde(rename = "type")]
    pub move_type: PokemonType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<u8>,
    pub pp: u8,
}

/// Optional sprite URLs for an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Sprites {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back_default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_shiny: Option<String>,
}

// ---------------------------------------------------------------------------
// Species catalog entries
// ---------------------------------------------------------------------------

/// A row of the read-only species catalog that feeds the picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    pub id: u32,
    pub name: String,
    pub types: Vec<PokemonType>,
    pub base_stats: StatBlock,
    pub default_ivs: StatBlock,
    pub default_evs: StatBlock,
    pub nature: Nature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprite_url: Option<String>,
}

impl Species {
    /// Builds the draft a player submits when catching this species.
    pub fn to_draft(&self) -> EntryDraft {
        EntryDraft {
            species_id: self.id,
            species_name: self.name.clone(),
            nickname: None,
            types: self.types.clone(),
            base_stats: self.base_stats,
            ivs: self.default_ivs,
            evs: self.default_evs,
            nature: self.nature,
            moves: Vec::new(),
            status: None,
            level: None,
            sprite: self.sprite_url.clone(),
            sprites: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Roster entries
// ---------------------------------------------------------------------------

/// Everything a player supplies when putting a Pokémon into a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub species_id: u32,
    pub species_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub types: Vec<PokemonType>,
    pub base_stats: StatBlock,
    pub ivs: StatBlock,
    pub evs: StatBlock,
    #[serde(default)]
    pub nature: Nature,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moves: Vec<Move>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sprites: Option<Sprites>,
}

impl EntryDraft {
    /// Level stored when the draft doesn't name one.
    pub const DEFAULT_LEVEL: u8 = 1;

    /// Checks the structural rules a stored entry must satisfy.
    ///
    /// Stat ranges are deliberately not checked here; see [`StatBlock`].
    pub fn validate(&self) -> Result<(), String> {
        if self.species_name.trim().is_empty() {
            return Err("species name must not be empty".into());
        }
        match self.types.len() {
            1 => {}
            2 if self.types[0] != self.types[1] => {}
            2 => return Err("type tags must be distinct".into()),
            n => return Err(format!("expected one or two type tags, got {n}")),
        }
        if let Some(level) = self.level {
            if !(1..=100).contains(&level) {
                return Err(format!("level {level} out of range 1..=100"));
            }
        }
        Ok(())
    }

    /// Fills defaults that the store applies on insert.
    pub fn normalized(mut self) -> Self {
        self.species_name = self.species_name.trim().to_string();
        self.nickname = self
            .nickname
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.level.get_or_insert(Self::DEFAULT_LEVEL);
        self
    }
}

/// A Pokémon stored in a roster slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: EntryId,
    pub roster_id: RosterId,
    pub slot: SlotIndex,
    #[serde(flatten)]
    pub details: EntryDraft,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RosterEntry {
    /// The nickname if one is set, otherwise the species name.
    pub fn display_name(&self) -> &str {
        self.details
            .nickname
            .as_deref()
            .unwrap_or(&self.details.species_name)
    }

    /// The species name the Soul Link rule is keyed on.
    pub fn species_name(&self) -> &str {
        &self.details.species_name
    }
}

/// The content of one roster position.
///
/// An empty slot is an explicit marker, never an omitted element, so
/// positions stay stable and addressable by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "entry", rename_all = "snake_case")]
pub enum Slot {
    #[default]
    Empty,
    Occupied(RosterEntry),
}

impl Slot {
    /// The entry in this slot, if any.
    pub fn entry(&self) -> Option<&RosterEntry> {
        match self {
            Slot::Empty => None,
            Slot::Occupied(entry) => Some(entry),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }
}

// ---------------------------------------------------------------------------
// Rosters, snapshots, sessions
// ---------------------------------------------------------------------------

/// One participant's team inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub id: RosterId,
    pub session_id: SessionId,
    pub player_id: UserId,
    pub trainer_name: String,
    pub slots: [Slot; ROSTER_SLOTS],
}

impl Roster {
    /// A roster with six empty slots.
    pub fn empty(
        id: RosterId,
        session_id: SessionId,
        player_id: UserId,
        trainer_name: String,
    ) -> Self {
        Self {
            id,
            session_id,
            player_id,
            trainer_name,
            slots: std::array::from_fn(|_| Slot::Empty),
        }
    }

    pub fn slot(&self, index: SlotIndex) -> &Slot {
        &self.slots[index.get()]
    }

    /// Occupied slots in index order.
    pub fn entries(&self) -> impl Iterator<Item = &RosterEntry> {
        self.slots.iter().filter_map(Slot::entry)
    }

    pub fn occupied(&self) -> usize {
        self.entries().count()
    }
}

/// Both rosters of a session as read at one store revision.
///
/// `version` increases with every write to the store, so of two snapshots
/// for the same session the one with the larger version is the fresher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub session_id: SessionId,
    pub version: u64,
    pub rosters: Vec<Roster>,
}

impl RosterSnapshot {
    /// The roster owned by `player`, if they take part in this session.
    pub fn roster_for(&self, player: UserId) -> Option<&Roster> {
        self.rosters.iter().find(|r| r.player_id == player)
    }

    /// Every species name occupying a slot in any roster of the session.
    pub fn species_in_use(&self) -> BTreeSet<&str> {
        self.rosters
            .iter()
            .flat_map(Roster::entries)
            .map(RosterEntry::species_name)
            .collect()
    }

    /// Number of occupied slots across both rosters.
    pub fn occupied(&self) -> usize {
        self.rosters.iter().map(Roster::occupied).sum()
    }
}

/// A session as listed in the session directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub player_a: UserId,
    pub player_b: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_a_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_b_handle: Option<String>,
    /// Handle of the participant who is not the viewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_handle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn is_participant(&self, user: UserId) -> bool {
        self.player_a == user || self.player_b == user
    }

    /// The other participant, or `None` if `user` isn't in this session.
    pub fn partner_of(&self, user: UserId) -> Option<UserId> {
        if self.player_a == user {
            Some(self.player_b)
        } else if self.player_b == user {
            Some(self.player_a)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Whether an identity is backed by an account or lives only client-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    #[default]
    Account,
    Guest,
}

/// The signed-in user as seen by every downstream component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub kind: IdentityKind,
}

impl Identity {
    pub fn is_guest(&self) -> bool {
        self.kind == IdentityKind::Guest
    }
}
