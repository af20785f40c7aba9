//! Profile queries.
//!
//! Both creation paths write the row and its cached friend code in one
//! transaction, so no reader ever sees a profile with an empty `cfc`.

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::db::{DatabaseError, StateDatabase};
use super::models::Profile;

/// Attributes supplied when a profile is created. All are opaque to the
/// coordinator except `gsbrcd`, which selects the friend code game code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileAttrs {
    pub console_id: Option<i64>,
    pub password: String,
    pub email: String,
    pub gsbrcd: String,
    pub uniquenick: String,
    pub pid: String,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub loc: String,
    pub zipcode: String,
    pub firstname: String,
    pub lastname: String,
    pub birth: String,
    pub aim: String,
    pub csnum: String,
    pub bssid: String,
    pub devname: String,
    pub stat: String,
    pub partnerid: Option<i64>,
}

/// Partial update; `None` leaves the column untouched. Nullable columns take
/// `Some(None)` to clear them.
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilePatch {
    #[serde(deserialize_with = "present")]
    pub console_id: Option<Option<i64>>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub gsbrcd: Option<String>,
    pub uniquenick: Option<String>,
    pub pid: Option<String>,
    #[serde(deserialize_with = "present")]
    pub lon: Option<Option<f64>>,
    #[serde(deserialize_with = "present")]
    pub lat: Option<Option<f64>>,
    pub loc: Option<String>,
    pub zipcode: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub birth: Option<String>,
    pub aim: Option<String>,
    pub csnum: Option<String>,
    pub bssid: Option<String>,
    pub devname: Option<String>,
    pub stat: Option<String>,
    #[serde(deserialize_with = "present")]
    pub partnerid: Option<Option<i64>>,
    pub enabled: Option<bool>,
}

/// A field that is present in the input is `Some`, even when it is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl ProfilePatch {
    /// Append `SET` assignments for every populated field. Returns how many
    /// were pushed.
    fn push_assignments(&self, builder: &mut QueryBuilder<'_, Sqlite>) -> usize {
        let patch = self;
        let mut set = builder.separated(", ");
        let mut count = 0;

        macro_rules! assign {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(value) = &patch.$field {
                        set.push(concat!(stringify!($field), " = "));
                        set.push_bind_unseparated(value.clone());
                        count += 1;
                    }
                )*
            };
        }

        assign!(
            console_id, password, email, gsbrcd, uniquenick, pid, lon, lat, loc, zipcode,
            firstname, lastname, birth, aim, csnum, bssid, devname, stat, partnerid, enabled,
        );

        count
    }
}

/// Insert a profile row. With `ignore_existing`, any uniqueness collision is
/// a no-op and `None` is returned; otherwise it surfaces as
/// `DatabaseError::Conflict`.
async fn insert_profile_row(
    conn: &mut SqliteConnection,
    user_id: &str,
    game_id: &str,
    attrs: &ProfileAttrs,
    now: i64,
    ignore_existing: bool,
) -> Result<Option<i64>, DatabaseError> {
    let sql = if ignore_existing {
        "INSERT INTO profiles (user_id, game_id, console_id, password, email, gsbrcd, uniquenick, pid, \
         lon, lat, loc, zipcode, firstname, lastname, birth, aim, csnum, bssid, devname, stat, \
         partnerid, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT DO NOTHING"
    } else {
        "INSERT INTO profiles (user_id, game_id, console_id, password, email, gsbrcd, uniquenick, pid, \
         lon, lat, loc, zipcode, firstname, lastname, birth, aim, csnum, bssid, devname, stat, \
         partnerid, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    };

    let result = sqlx::query(sql)
        .bind(user_id)
        .bind(game_id)
        .bind(attrs.console_id)
        .bind(&attrs.password)
        .bind(&attrs.email)
        .bind(&attrs.gsbrcd)
        .bind(&attrs.uniquenick)
        .bind(&attrs.pid)
        .bind(attrs.lon)
        .bind(attrs.lat)
        .bind(&attrs.loc)
        .bind(&attrs.zipcode)
        .bind(&attrs.firstname)
        .bind(&attrs.lastname)
        .bind(&attrs.birth)
        .bind(&attrs.aim)
        .bind(&attrs.csnum)
        .bind(&attrs.bssid)
        .bind(&attrs.devname)
        .bind(&attrs.stat)
        .bind(attrs.partnerid)
        .bind(now)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    Ok(Some(result.last_insert_rowid()))
}

async fn write_friend_code(
    conn: &mut SqliteConnection,
    profile_id: i64,
    friend_code: Option<String>,
) -> Result<(), DatabaseError> {
    let Some(cfc) = friend_code else {
        return Err(DatabaseError::Query(format!(
            "Friend code could not be derived for profile {profile_id}"
        )));
    };

    sqlx::query("UPDATE profiles SET cfc = ? WHERE profile_id = ?")
        .bind(cfc)
        .bind(profile_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn fetch_by_key(
    conn: &mut SqliteConnection,
    user_id: &str,
    game_id: &str,
) -> Result<Profile, DatabaseError> {
    sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ? AND game_id = ?")
        .bind(user_id)
        .bind(game_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("Profile {user_id}/{game_id}")))
}

impl StateDatabase {
    // =========================================================================
    // Profile queries
    // =========================================================================

    /// Return the profile for `(user_id, game_id)`, creating it if absent.
    ///
    /// `friend_code` receives the new profile id and returns the display
    /// code to cache; it only runs for the caller that actually inserted.
    /// The boolean is `true` for that caller.
    pub async fn get_or_create_profile(
        &self,
        user_id: &str,
        game_id: &str,
        attrs: &ProfileAttrs,
        now: i64,
        friend_code: impl FnOnce(i64) -> Option<String> + Send,
    ) -> Result<(Profile, bool), DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let inserted = insert_profile_row(&mut tx, user_id, game_id, attrs, now, true).await?;
        if let Some(profile_id) = inserted {
            write_friend_code(&mut tx, profile_id, friend_code(profile_id)).await?;
        }
        // Nothing inserted and no row for the key: the nickname is taken.
        let profile = fetch_by_key(&mut tx, user_id, game_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound(_) => DatabaseError::Conflict(format!(
                    "Profile {user_id}/{game_id}: uniquenick {} is taken",
                    attrs.uniquenick
                )),
                other => other,
            })?;

        tx.commit().await?;

        Ok((profile, inserted.is_some()))
    }

    /// Create a profile; an existing `(user_id, game_id)` pair fails with
    /// `DatabaseError::Conflict`.
    pub async fn create_profile(
        &self,
        user_id: &str,
        game_id: &str,
        attrs: &ProfileAttrs,
        now: i64,
        friend_code: impl FnOnce(i64) -> Option<String> + Send,
    ) -> Result<Profile, DatabaseError> {
        let mut tx = self.pool().begin().await?;

        let profile_id = insert_profile_row(&mut tx, user_id, game_id, attrs, now, false)
            .await?
            .ok_or_else(|| DatabaseError::Conflict(format!("Profile {user_id}/{game_id}")))?;
        write_friend_code(&mut tx, profile_id, friend_code(profile_id)).await?;
        let profile = fetch_by_key(&mut tx, user_id, game_id).await?;

        tx.commit().await?;

        Ok(profile)
    }

    /// Get a profile by ID.
    pub async fn get_profile(&self, profile_id: i64) -> Result<Profile, DatabaseError> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE profile_id = ?")
            .bind(profile_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Profile {profile_id}")))
    }

    /// Get a profile by unique nickname. The empty nickname names nobody.
    pub async fn get_profile_by_uniquenick(
        &self,
        uniquenick: &str,
    ) -> Result<Profile, DatabaseError> {
        if uniquenick.is_empty() {
            return Err(DatabaseError::NotFound("Profile with empty uniquenick".into()));
        }
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE uniquenick = ?")
            .bind(uniquenick)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Profile with uniquenick {uniquenick}")))
    }

    /// Get a profile by its cached friend code (display form).
    pub async fn get_profile_by_friend_code(&self, cfc: &str) -> Result<Profile, DatabaseError> {
        sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE cfc = ? ORDER BY profile_id LIMIT 1")
            .bind(cfc)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Profile with friend code {cfc}")))
    }

    /// List profiles for a game.
    pub async fn list_profiles_by_game(&self, game_id: &str) -> Result<Vec<Profile>, DatabaseError> {
        let profiles = sqlx::query_as::<_, Profile>(
            "SELECT * FROM profiles WHERE game_id = ? ORDER BY profile_id",
        )
        .bind(game_id)
        .fetch_all(self.pool())
        .await?;

        Ok(profiles)
    }

    /// Apply a partial update. Returns `false` if the profile does not exist.
    pub async fn update_profile(
        &self,
        profile_id: i64,
        patch: &ProfilePatch,
    ) -> Result<bool, DatabaseError> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE profiles SET ");
        if patch.push_assignments(&mut builder) == 0 {
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT profile_id FROM profiles WHERE profile_id = ?")
                    .bind(profile_id)
                    .fetch_optional(self.pool())
                    .await?;
            return Ok(exists.is_some());
        }
        builder.push(" WHERE profile_id = ").push_bind(profile_id);

        let result = builder.build().execute(self.pool()).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count all profiles.
    pub async fn count_profiles(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles")
            .fetch_one(self.pool())
            .await?;
        Ok(row.0)
    }

    /// Games with the most profiles, descending.
    pub async fn top_games(&self, limit: u32) -> Result<Vec<(String, i64)>, DatabaseError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT game_id, COUNT(*) AS n FROM profiles GROUP BY game_id ORDER BY n DESC, game_id LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
