//! Guest-mode persistence: save, load, and migration to an account.

use soullink_auth::{
    GUEST_COOKIE, GUEST_TEAMS_COOKIE, GuestCookieConfig, GuestStore, GuestTeam, MemoryCookieJar,
    TeamPair, user_teams_cookie,
};
use soullink_auth::CookieJar;
use soullink_protocol::{
    EntryDraft, Identity, IdentityKind, Nature, PokemonType, StatBlock, Status, UserId,
};

fn caught(name: &str, types: Vec<PokemonType>) -> EntryDraft {
    EntryDraft {
        species_id: 1,
        species_name: name.into(),
        nickname: Some(format!("{name} Jr.")),
        types,
        base_stats: StatBlock::uniform(45),
        ivs: StatBlock::uniform(31),
        // Out-of-range EVs survive the round trip unchanged.
        evs: StatBlock::uniform(300),
        nature: Nature::Modest,
        moves: Vec::new(),
        status: Some(Status::Sleep),
        level: Some(12),
        sprite: None,
        sprites: None,
    }
}

fn pair() -> TeamPair {
    let mut first = GuestTeam {
        trainer: "Red".into(),
        ..GuestTeam::default()
    };
    first.pokemon[0] = Some(caught("Bulbasaur", vec![PokemonType::Grass, PokemonType::Poison]));
    let mut second = GuestTeam {
        trainer: "Blue".into(),
        ..GuestTeam::default()
    };
    second.pokemon[5] = Some(caught("Charmander", vec![PokemonType::Fire]));
    TeamPair {
        teams: [first, second],
    }
}

fn account(id: UserId) -> Identity {
    Identity {
        id,
        handle: "red".into(),
        email: Some("red@kanto.org".into()),
        kind: IdentityKind::Account,
    }
}

fn guest_store() -> GuestStore<MemoryCookieJar> {
    GuestStore::new(MemoryCookieJar::new(), GuestCookieConfig::default())
}

#[test]
fn test_guest_save_then_load_returns_equal_pair() {
    let mut store = guest_store();
    let guest = store.guest_identity("Guest").unwrap();

    store.save_teams(&pair(), Some(&guest)).unwrap();

    assert_eq!(store.load_teams(Some(&guest)).unwrap(), Some(pair()));
    assert_eq!(store.load_teams(None).unwrap(), Some(pair()));
}

#[test]
fn test_guest_cookie_scoped_to_nuz_path() {
    let mut store = guest_store();
    store.save_teams(&pair(), None).unwrap();

    let cookie = store.jar().get(GUEST_TEAMS_COOKIE).unwrap();
    assert_eq!(cookie.path, "/nuz");
    assert!(cookie.max_age_secs() > 29 * 24 * 3600);
}

#[test]
fn test_load_for_account_does_not_see_guest_data() {
    let mut store = guest_store();
    store.save_teams(&pair(), None).unwrap();

    let user = account(UserId::new());
    assert_eq!(store.load_teams(Some(&user)).unwrap(), None);
}

#[test]
fn test_migrate_moves_guest_data_and_clears_guest_store() {
    let mut store = guest_store();
    store.guest_identity("Guest").unwrap();
    store.save_teams(&pair(), None).unwrap();

    let user = account(UserId::new());
    let moved = store.migrate_guest_to_user(user.id).unwrap();

    assert_eq!(moved, Some(pair()));
    assert_eq!(store.load_teams(Some(&user)).unwrap(), Some(pair()));
    assert_eq!(store.load_teams(None).unwrap(), None);
    assert!(store.jar().get(GUEST_COOKIE).is_none());
    assert!(store.jar().get(&user_teams_cookie(user.id)).is_some());
}

#[test]
fn test_migrate_without_guest_data_is_none() {
    let mut store = guest_store();
    assert_eq!(store.migrate_guest_to_user(UserId::new()).unwrap(), None);
}

#[test]
fn test_migrate_keeps_existing_account_teams() {
    let mut store = guest_store();
    let user = account(UserId::new());
    store.save_teams(&TeamPair::default(), Some(&user)).unwrap();
    store.save_teams(&pair(), None).unwrap();

    let kept = store.migrate_guest_to_user(user.id).unwrap();

    assert_eq!(kept, Some(TeamPair::default()));
    assert_eq!(store.load_teams(Some(&user)).unwrap(), Some(TeamPair::default()));
    assert_eq!(store.load_teams(None).unwrap(), Some(pair()));
}
