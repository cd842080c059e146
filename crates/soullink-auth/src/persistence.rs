//! Guest-mode persistence of a roster pair.
//!
//! Guests keep their two teams in a cookie. Once the same browser signs in,
//! [`GuestStore::migrate_guest_to_user`] moves the guest copy under the
//! account's key so nothing is lost, unless the account already has teams
//! of its own.
//!
//! Cookie layout:
//!
//! | name                      | holds                          |
//! |---------------------------|--------------------------------|
//! | `soullink_guest`          | the guest [`Identity`] marker  |
//! | `soullink_teams_guest`    | guest [`TeamPair`]             |
//! | `soullink_teams_{user}`   | [`TeamPair`] saved by `{user}` |
//!
//! Every value is JSON, base64url-encoded without padding so it is a valid
//! cookie value.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use soullink_protocol::{EntryDraft, Identity, IdentityKind, ROSTER_SLOTS, UserId};

use crate::cookie::{Cookie, CookieJar, GuestCookieConfig};
use crate::AuthError;

/// Cookie holding the guest identity marker.
pub const GUEST_COOKIE: &str = "soullink_guest";

/// Cookie holding the guest's roster pair.
pub const GUEST_TEAMS_COOKIE: &str = "soullink_teams_guest";

/// Cookie name for a signed-in user's roster pair.
pub fn user_teams_cookie(user: UserId) -> String {
    format!("soullink_teams_{user}")
}

/// One team as the guest board keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestTeam {
    pub trainer: String,
    /// Always [`ROSTER_SLOTS`] long; `None` is an empty slot.
    pub pokemon: Vec<Option<EntryDraft>>,
}

impl Default for GuestTeam {
    fn default() -> Self {
        Self {
            trainer: String::new(),
            pokemon: vec![None; ROSTER_SLOTS],
        }
    }
}

/// The two teams of a guest board.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeamPair {
    pub teams: [GuestTeam; 2],
}

/// Reads and writes guest-mode data through a [`CookieJar`].
pub struct GuestStore<J: CookieJar> {
    jar: J,
    config: GuestCookieConfig,
}

impl<J: CookieJar> GuestStore<J> {
    pub fn new(jar: J, config: GuestCookieConfig) -> Self {
        Self { jar, config }
    }

    pub fn jar(&self) -> &J {
        &self.jar
    }

    pub fn into_jar(self) -> J {
        self.jar
    }

    /// The stored guest identity, or a fresh one (stored before returning).
    ///
    /// Guests aren't registered anywhere, so `handle` isn't checked for
    /// collisions.
    pub fn guest_identity(&mut self, handle: &str) -> Result<Identity, AuthError> {
        if let Some(identity) = self.read::<Identity>(GUEST_COOKIE)? {
            return Ok(identity);
        }
        let identity = Identity {
            id: UserId::new(),
            handle: handle.trim().to_string(),
            email: None,
            kind: IdentityKind::Guest,
        };
        self.write(GUEST_COOKIE, &identity)?;
        Ok(identity)
    }

    /// Saves `teams` under the key for `identity`: the account key when
    /// signed in, the guest key otherwise.
    pub fn save_teams(
        &mut self,
        teams: &TeamPair,
        identity: Option<&Identity>,
    ) -> Result<(), AuthError> {
        let name = teams_cookie_for(identity);
        self.write(&name, teams)?;
        tracing::debug!(cookie = %name, "teams saved");
        Ok(())
    }

    /// Loads the pair saved for `identity`, if any.
    pub fn load_teams(&self, identity: Option<&Identity>) -> Result<Option<TeamPair>, AuthError> {
        self.read_teams(&teams_cookie_for(identity))
    }

    /// Moves guest teams to `user`'s key and clears the guest copy.
    ///
    /// An account that already has saved teams keeps them: they are
    /// returned and the guest copy is left where it is. Otherwise returns
    /// the moved pair, or `None` when there was nothing to move.
    pub fn migrate_guest_to_user(&mut self, user: UserId) -> Result<Option<TeamPair>, AuthError> {
        let user_cookie = user_teams_cookie(user);
        if let Some(existing) = self.read_teams(&user_cookie)? {
            tracing::debug!(user_id = %user, "account already has teams, guest copy kept");
            return Ok(Some(existing));
        }
        let Some(teams) = self.read_teams(GUEST_TEAMS_COOKIE)? else {
            return Ok(None);
        };
        self.write(&user_cookie, &teams)?;
        self.jar.remove(GUEST_TEAMS_COOKIE);
        self.jar.remove(GUEST_COOKIE);
        tracing::info!(user_id = %user, "guest teams migrated to account");
        Ok(Some(teams))
    }

    /// Reads a pair, rejecting teams that don't have exactly
    /// [`ROSTER_SLOTS`] slots.
    fn read_teams(&self, name: &str) -> Result<Option<TeamPair>, AuthError> {
        let Some(pair) = self.read::<TeamPair>(name)? else {
            return Ok(None);
        };
        if let Some(team) = pair.teams.iter().find(|t| t.pokemon.len() != ROSTER_SLOTS) {
            return Err(AuthError::CorruptCookie {
                name: name.to_string(),
                reason: format!(
                    "team `{}` has {} slots, expected {ROSTER_SLOTS}",
                    team.trainer,
                    team.pokemon.len()
                ),
            });
        }
        Ok(Some(pair))
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, AuthError> {
        let Some(cookie) = self.jar.get(name) else {
            return Ok(None);
        };
        let corrupt = |reason: String| AuthError::CorruptCookie {
            name: name.to_string(),
            reason,
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(cookie.value.as_bytes())
            .map_err(|e| corrupt(e.to_string()))?;
        let value = serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        Ok(Some(value))
    }

    fn write<T: Serialize>(&mut self, name: &str, value: &T) -> Result<(), AuthError> {
        let json = serde_json::to_vec(value).map_err(|e| AuthError::CorruptCookie {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        self.jar.set(Cookie::new(name, encoded, &self.config));
        Ok(())
    }
}

fn teams_cookie_for(identity: Option<&Identity>) -> String {
    match identity {
        Some(identity) if !identity.is_guest() => user_teams_cookie(identity.id),
        _ => GUEST_TEAMS_COOKIE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::MemoryCookieJar;

    fn store() -> GuestStore<MemoryCookieJar> {
        GuestStore::new(MemoryCookieJar::new(), GuestCookieConfig::default())
    }

    #[test]
    fn test_guest_identity_is_stable_across_calls() {
        let mut store = store();
        let first = store.guest_identity("Red").unwrap();
        let second = store.guest_identity("Someone else").unwrap();
        assert!(first.is_guest());
        assert_eq!(first, second);
    }

    #[test]
    fn test_cookie_value_is_base64url_json() {
        let mut store = store();
        store.save_teams(&TeamPair::default(), None).unwrap();

        let raw = &store.jar().get(GUEST_TEAMS_COOKIE).unwrap().value;
        assert!(!raw.contains('=') && !raw.contains('+') && !raw.contains('/'));
        let json = URL_SAFE_NO_PAD.decode(raw).unwrap();
        assert!(serde_json::from_slice::<serde_json::Value>(&json).is_ok());
    }

    #[test]
    fn test_corrupt_cookie_reports_name() {
        let mut jar = MemoryCookieJar::new();
        jar.set(Cookie::new(GUEST_TEAMS_COOKIE, "%%%", &GuestCookieConfig::default()));
        let store = GuestStore::new(jar, GuestCookieConfig::default());

        match store.load_teams(None) {
            Err(AuthError::CorruptCookie { name, .. }) => assert_eq!(name, GUEST_TEAMS_COOKIE),
            other => panic!("expected corrupt cookie, got {other:?}"),
        }
    }

    #[test]
    fn test_load_teams_rejects_wrong_slot_count() {
        for slots in [3, ROSTER_SLOTS + 1] {
            let mut store = store();
            let mut pair = TeamPair::default();
            pair.teams[1].pokemon = vec![None; slots];
            store.write(GUEST_TEAMS_COOKIE, &pair).unwrap();

            match store.load_teams(None) {
                Err(AuthError::CorruptCookie { name, reason }) => {
                    assert_eq!(name, GUEST_TEAMS_COOKIE);
                    assert!(reason.contains(&slots.to_string()), "{reason}");
                }
                other => panic!("expected corrupt cookie for {slots} slots, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_default_team_has_six_empty_slots() {
        let team = GuestTeam::default();
        assert_eq!(team.pokemon.len(), ROSTER_SLOTS);
        assert!(team.pokemon.iter().all(Option::is_none));
    }
}
