//! The bundled species catalog that feeds the picker.
//!
//! Read-only. Every species starts with perfect IVs (31), zero EVs, and a
//! Hardy nature; players edit those after catching.

use std::sync::OnceLock;

use soullink_protocol::{IV_MAX, Nature, PokemonType, Species, StatBlock};

use PokemonType::*;

/// Where catalog sprites are served from, keyed by species id.
pub const SPRITE_BASE_URL: &str =
    "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon";

/// `(id, name, types, [hp, atk, def, sp.atk, sp.def, speed])`
type Row = (u32, &'static str, &'static [PokemonType], [u16; 6]);

const ROWS: [Row; 18] = [
    (1, "Bulbasaur", &[Grass, Poison], [45, 49, 49, 65, 65, 45]),
    (4, "Charmander", &[Fire], [39, 52, 43, 60, 50, 65]),
    (7, "Squirtle", &[Water], [44, 48, 65, 50, 64, 43]),
    (25, "Pikachu", &[Electric], [35, 55, 40, 50, 50, 90]),
    (133, "Eevee", &[Normal], [55, 55, 50, 45, 65, 55]),
    (6, "Charizard", &[Fire, Flying], [78, 84, 78, 109, 85, 100]),
    (16, "Pidgey", &[Normal, Flying], [40, 45, 40, 35, 35, 56]),
    (19, "Rattata", &[Normal], [30, 56, 35, 25, 35, 72]),
    (152, "Chikorita", &[Grass], [45, 49, 65, 49, 65, 45]),
    (155, "Cyndaquil", &[Fire], [39, 52, 43, 60, 50, 65]),
    (158, "Totodile", &[Water], [50, 65, 64, 44, 48, 43]),
    (179, "Mareep", &[Electric], [55, 40, 40, 65, 45, 35]),
    (183, "Marill", &[Water, Fairy], [70, 20, 50, 20, 50, 40]),
    (147, "Dratini", &[Dragon], [41, 64, 45, 50, 50, 50]),
    (161, "Sentret", &[Normal], [35, 46, 34, 35, 45, 20]),
    (163, "Hoothoot", &[Normal, Flying], [60, 30, 30, 36, 56, 50]),
    (23, "Ekans", &[Poison], [35, 60, 44, 40, 54, 55]),
    (27, "Sandshrew", &[Ground], [50, 75, 85, 20, 30, 40]),
];

fn build(&(id, name, types, [hp, attack, defense, special_attack, special_defense, speed]): &Row) -> Species {
    Species {
        id,
        name: name.to_string(),
        types: types.to_vec(),
        base_stats: StatBlock {
            hp,
            attack,
            defense,
            special_attack,
            special_defense,
            speed,
        },
        default_ivs: StatBlock::uniform(IV_MAX),
        default_evs: StatBlock::default(),
        nature: Nature::Hardy,
        sprite_url: Some(format!("{SPRITE_BASE_URL}/{id}.png")),
    }
}

/// Every catalog species, in picker order.
pub fn all() -> &'static [Species] {
    static CATALOG: OnceLock<Vec<Species>> = OnceLock::new();
    CATALOG.get_or_init(|| ROWS.iter().map(build).collect())
}

pub fn by_id(id: u32) -> Option<&'static Species> {
    all().iter().find(|s| s.id == id)
}

/// Case-insensitive, whitespace-trimmed name lookup.
pub fn by_name(name: &str) -> Option<&'static Species> {
    let name = name.trim();
    all().iter().find(|s| s.name.eq_ignore_ascii_case(name))
}
