//! View models for the board, the picker, and the detail panels.
//!
//! All of these are pure functions of a [`RosterSnapshot`] (plus the
//! catalog); clients render them as they like. [`SnapshotTracker`] is the
//! one stateful piece: it decides whether an incoming snapshot replaces
//! what is on screen.

use serde::Serialize;
use soullink_protocol::{
    EV_MAX, IV_MAX, Nature, Roster, RosterEntry, RosterSnapshot, SessionId, Species, StatKind,
    UserId,
};

// ---------------------------------------------------------------------------
// Picker and inventory
// ---------------------------------------------------------------------------

/// Catalog species nobody in the session holds yet.
pub fn picker<'a>(catalog: &'a [Species], snapshot: &RosterSnapshot) -> Vec<&'a Species> {
    let taken = snapshot.species_in_use();
    catalog
        .iter()
        .filter(|s| !taken.contains(s.name.as_str()))
        .collect()
}

/// One catalog row in a trainer's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryItem<'a> {
    pub species: &'a Species,
    pub owned: bool,
}

impl InventoryItem<'_> {
    pub fn label(&self) -> &'static str {
        if self.owned { "OWNED" } else { "NOT CAUGHT" }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inventory<'a> {
    pub title: String,
    pub items: Vec<InventoryItem<'a>>,
    pub owned: usize,
}

/// Every catalog species, marked by whether `roster` holds it.
pub fn inventory<'a>(catalog: &'a [Species], roster: &Roster, index: usize) -> Inventory<'a> {
    let items: Vec<InventoryItem<'a>> = catalog
        .iter()
        .map(|species| InventoryItem {
            species,
            owned: roster.entries().any(|e| e.species_name() == species.name),
        })
        .collect();
    Inventory {
        title: format!("{}'s INVENTORY", trainer_label(roster, index)),
        owned: items.iter().filter(|i| i.owned).count(),
        items,
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// The trainer name, or `Player N` (1-based) when it's blank.
pub fn trainer_label(roster: &Roster, index: usize) -> String {
    let name = roster.trainer_name.trim();
    if name.is_empty() {
        format!("Player {}", index + 1)
    } else {
        name.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardHeader {
    /// `"Red vs Blue"`.
    pub title: String,
    /// Index into `snapshot.rosters` of the viewer's own roster.
    pub your_team: Option<usize>,
}

pub fn board_header(snapshot: &RosterSnapshot, viewer: Option<UserId>) -> BoardHeader {
    let label = |i: usize| {
        snapshot
            .rosters
            .get(i)
            .map(|r| trainer_label(r, i))
            .unwrap_or_else(|| format!("Player {}", i + 1))
    };
    BoardHeader {
        title: format!("{} vs {}", label(0), label(1)),
        your_team: viewer.and_then(|v| snapshot.rosters.iter().position(|r| r.player_id == v)),
    }
}

/// One slot on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotCard {
    Empty,
    Occupied {
        /// Upper-cased nickname or species name.
        title: String,
        /// Upper-cased type tags.
        types: Vec<String>,
    },
}

pub fn slot_cards(roster: &Roster) -> Vec<SlotCard> {
    roster
        .slots
        .iter()
        .map(|slot| match slot.entry() {
            None => SlotCard::Empty,
            Some(entry) => SlotCard::Occupied {
                title: entry.display_name().to_uppercase(),
                types: entry
                    .details
                    .types
                    .iter()
                    .map(|t| t.as_str().to_uppercase())
                    .collect(),
            },
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Stats panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatRow {
    pub label: &'static str,
    pub base: u16,
    pub iv: u16,
    pub ev: u16,
    /// `iv / 31`, capped at 1.
    pub iv_fill: f32,
    /// `ev / 255`, capped at 1.
    pub ev_fill: f32,
    pub iv_out_of_range: bool,
    pub ev_out_of_range: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsPanel {
    /// `"SPARKY STATS"`.
    pub title: String,
    /// `"Species: Pikachu"`.
    pub species_line: String,
    pub level: u8,
    pub nature: Nature,
    pub rows: Vec<StatRow>,
}

pub fn stats_panel(entry: &RosterEntry) -> StatsPanel {
    let d = &entry.details;
    let rows = StatKind::ALL
        .into_iter()
        .map(|kind| {
            let (iv, ev) = (d.ivs.get(kind), d.evs.get(kind));
            StatRow {
                label: kind.label(),
                base: d.base_stats.get(kind),
                iv,
                ev,
                iv_fill: fill(iv, IV_MAX),
                ev_fill: fill(ev, EV_MAX),
                iv_out_of_range: iv > IV_MAX,
                ev_out_of_range: ev > EV_MAX,
            }
        })
        .collect();
    StatsPanel {
        title: format!("{} STATS", entry.display_name().to_uppercase()),
        species_line: format!("Species: {}", d.species_name),
        level: d.level.unwrap_or(soullink_protocol::EntryDraft::DEFAULT_LEVEL),
        nature: d.nature,
        rows,
    }
}

fn fill(value: u16, max: u16) -> f32 {
    (f32::from(value) / f32::from(max)).min(1.0)
}

// ---------------------------------------------------------------------------
// SnapshotTracker
// ---------------------------------------------------------------------------

/// Holds the snapshot on screen and refuses stale ones.
///
/// Snapshots can arrive out of order (a reply to `GetRosters` racing a
/// push). Within one session only a strictly newer version replaces the
/// current one; a snapshot for another session always does.
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    current: Option<RosterSnapshot>,
}

impl SnapshotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `snapshot` if it is fresher. Returns whether it was applied.
    pub fn apply(&mut self, snapshot: RosterSnapshot) -> bool {
        if let Some(current) = &self.current {
            if current.session_id == snapshot.session_id && snapshot.version <= current.version {
                tracing::trace!(
                    session_id = %snapshot.session_id,
                    stale = snapshot.version,
                    current = current.version,
                    "stale snapshot dropped"
                );
                return false;
            }
        }
        self.current = Some(snapshot);
        true
    }

    pub fn current(&self) -> Option<&RosterSnapshot> {
        self.current.as_ref()
    }

    /// Forgets the snapshot, e.g. when its session closes.
    pub fn clear(&mut self, session_id: SessionId) {
        if self.current.as_ref().is_some_and(|c| c.session_id == session_id) {
            self.current = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soullink_protocol::{EntryId, RosterId, Slot, SlotIndex, StatBlock};

    use crate::catalog;

    fn entry(roster_id: RosterId, slot: u8, species: &str) -> RosterEntry {
        let details = catalog::by_name(species).unwrap().to_draft().normalized();
        let created = "2026-01-01T00:00:00Z".parse().unwrap();
        RosterEntry {
            id: EntryId::new(),
            roster_id,
            slot: SlotIndex::new(slot).unwrap(),
            details,
            created_at: created,
            updated_at: created,
        }
    }

    fn snapshot(version: u64) -> RosterSnapshot {
        let session_id = SessionId::new();
        let mut red = Roster::empty(RosterId::new(), session_id, UserId::new(), "Red".into());
        let blue = Roster::empty(RosterId::new(), session_id, UserId::new(), String::new());
        red.slots[0] = Slot::Occupied(entry(red.id, 0, "Pikachu"));
        red.slots[3] = Slot::Occupied(entry(red.id, 3, "Eevee"));
        RosterSnapshot {
            session_id,
            version,
            rosters: vec![red, blue],
        }
    }

    #[test]
    fn test_picker_excludes_species_in_use() {
        let snap = snapshot(1);
        let names: Vec<&str> = picker(catalog::all(), &snap)
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names.len(), 16);
        assert!(!names.contains(&"Pikachu"));
        assert!(!names.contains(&"Eevee"));
    }

    #[test]
    fn test_inventory_marks_owned_for_one_roster() {
        let snap = snapshot(1);
        let red = inventory(catalog::all(), &snap.rosters[0], 0);
        assert_eq!(red.title, "Red's INVENTORY");
        assert_eq!(red.owned, 2);
        let pikachu = red.items.iter().find(|i| i.species.name == "Pikachu").unwrap();
        assert_eq!(pikachu.label(), "OWNED");

        let blue = inventory(catalog::all(), &snap.rosters[1], 1);
        assert_eq!(blue.title, "Player 2's INVENTORY");
        assert_eq!(blue.owned, 0);
        assert!(blue.items.iter().all(|i| i.label() == "NOT CAUGHT"));
    }

    #[test]
    fn test_board_header_falls_back_and_marks_viewer() {
        let snap = snapshot(1);
        let viewer = snap.rosters[1].player_id;
        let header = board_header(&snap, Some(viewer));
        assert_eq!(header.title, "Red vs Player 2");
        assert_eq!(header.your_team, Some(1));
        assert_eq!(board_header(&snap, None).your_team, None);
    }

    #[test]
    fn test_slot_cards_use_nickname_then_species() {
        let mut snap = snapshot(1);
        if let Slot::Occupied(e) = &mut snap.rosters[0].slots[0] {
            e.details.nickname = Some("Sparky".into());
        }
        let cards = slot_cards(&snap.rosters[0]);
        assert_eq!(
            cards[0],
            SlotCard::Occupied {
                title: "SPARKY".into(),
                types: vec!["ELECTRIC".into()],
            }
        );
        assert!(matches!(&cards[3], SlotCard::Occupied { title, .. } if title == "EEVEE"));
        assert_eq!(cards[1], SlotCard::Empty);
    }

    #[test]
    fn test_stats_panel_rows_and_range_flags() {
        let mut e = entry(RosterId::new(), 2, "Charizard");
        e.details.ivs = StatBlock { speed: 40, ..StatBlock::uniform(31) };
        e.details.evs = StatBlock { hp: 300, attack: 0, ..StatBlock::uniform(51) };
        let panel = stats_panel(&e);

        assert_eq!(panel.title, "CHARIZARD STATS");
        assert_eq!(panel.species_line, "Species: Charizard");
        assert_eq!(panel.level, 1);
        let labels: Vec<&str> = panel.rows.iter().map(|r| r.label).collect();
        assert_eq!(labels, ["HP", "ATTACK", "DEFENSE", "Sp. Atk", "Sp. Def", "SPEED"]);

        let hp = &panel.rows[0];
        assert_eq!(hp.base, 78);
        assert!(hp.ev_out_of_range);
        assert_eq!(hp.ev_fill, 1.0);
        assert_eq!(panel.rows[1].ev_fill, 0.0);
        assert_eq!(panel.rows[2].ev_fill, 0.2);
        let speed = &panel.rows[5];
        assert!(speed.iv_out_of_range && !speed.ev_out_of_range);
        assert_eq!(speed.iv_fill, 1.0);
    }

    #[test]
    fn test_tracker_rejects_stale_and_equal_versions() {
        let mut tracker = SnapshotTracker::new();
        let newer = snapshot(7);
        let mut older = newer.clone();
        older.version = 5;

        assert!(tracker.apply(newer.clone()));
        assert!(!tracker.apply(older));
        assert!(!tracker.apply(newer.clone()));
        assert_eq!(tracker.current().map(|s| s.version), Some(7));

        let mut next = newer;
        next.version = 9;
        assert!(tracker.apply(next));
    }

    #[test]
    fn test_tracker_accepts_other_session_and_clears() {
        let mut tracker = SnapshotTracker::new();
        assert!(tracker.apply(snapshot(50)));
        let other = snapshot(3);
        let other_id = other.session_id;
        assert!(tracker.apply(other));

        tracker.clear(SessionId::new());
        assert!(tracker.current().is_some());
        tracker.clear(other_id);
        assert!(tracker.current().is_none());
    }
}
