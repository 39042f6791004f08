use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use forum_types::models::TargetKind;

use crate::Database;
use crate::models::{CommentRow, PostRow, SessionRow, ToggleOutcome, UserRow};

/// Table and target-column names for a reaction kind. Posts and comments
/// get separate tables; everything above this boundary is kind-agnostic.
fn reaction_table(kind: TargetKind) -> (&'static str, &'static str) {
    match kind {
        TargetKind::Post => ("post_reactions", "post_id"),
        TargetKind::Comment => ("comment_reactions", "comment_id"),
    }
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, username, email, password_hash, now, now],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Sessions --

    pub fn insert_session(
        &self,
        token: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![token, user_id, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, token: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
                    [token],
                    |row| {
                        Ok(SessionRow {
                            token: row.get(0)?,
                            user_id: row.get(1)?,
                            expires_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Removes a session row. No error if the token is already gone.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
            Ok(())
        })
    }

    /// Removes every session belonging to a user. Used on login so only
    /// the freshly issued session stays live.
    pub fn delete_sessions_for_user(&self, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE user_id = ?1", [user_id])?;
            Ok(())
        })
    }

    // -- Posts --

    pub fn insert_post(
        &self,
        id: &str,
        author_id: &str,
        title: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, author_id, title, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, author_id, title, body, now],
            )?;
            Ok(())
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.author_id, u.username, p.title, p.body, p.created_at
                 FROM posts p
                 LEFT JOIN users u ON p.author_id = u.id
                 WHERE p.id = ?1",
            )?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(PostRow {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        author_username: row
                            .get::<_, Option<String>>(2)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        title: row.get(3)?,
                        body: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_posts(&self, limit: u32) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.author_id, u.username, p.title, p.body, p.created_at
                 FROM posts p
                 LEFT JOIN users u ON p.author_id = u.id
                 ORDER BY p.created_at DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(PostRow {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        author_username: row
                            .get::<_, Option<String>>(2)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        title: row.get(3)?,
                        body: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Comments --

    pub fn insert_comment(
        &self,
        id: &str,
        post_id: &str,
        author_id: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, author_id, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, post_id, author_id, body, now],
            )?;
            Ok(())
        })
    }

    pub fn get_comment(&self, id: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.author_id, u.username, c.body, c.created_at
                 FROM comments c
                 LEFT JOIN users u ON c.author_id = u.id
                 WHERE c.id = ?1",
            )?;
            let row = stmt
                .query_row([id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        body: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_comments_for_post(&self, post_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.post_id, c.author_id, u.username, c.body, c.created_at
                 FROM comments c
                 LEFT JOIN users u ON c.author_id = u.id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at ASC",
            )?;
            let rows = stmt
                .query_map([post_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row
                            .get::<_, Option<String>>(3)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        body: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Reactions --

    /// Toggle a reaction in one transaction:
    /// no prior row -> insert; same polarity -> delete; opposite -> replace.
    /// The transaction plus the UNIQUE(user, target) constraint keep the
    /// one-reaction-per-user-per-target invariant under concurrent toggles.
    pub fn toggle_reaction(
        &self,
        kind: TargetKind,
        id: &str,
        user_id: &str,
        target_id: &str,
        liked: bool,
        now: DateTime<Utc>,
    ) -> Result<ToggleOutcome> {
        let (table, target_col) = reaction_table(kind);
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let existing: Option<(String, bool)> = tx
                .query_row(
                    &format!(
                        "SELECT id, liked FROM {table} WHERE user_id = ?1 AND {target_col} = ?2"
                    ),
                    rusqlite::params![user_id, target_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let outcome = match existing {
                None => {
                    tx.execute(
                        &format!(
                            "INSERT INTO {table} (id, user_id, {target_col}, liked, created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5)"
                        ),
                        rusqlite::params![id, user_id, target_id, liked, now],
                    )?;
                    ToggleOutcome::Added
                }
                Some((existing_id, was_liked)) if was_liked == liked => {
                    // Same direction again cancels the vote
                    tx.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [&existing_id])?;
                    ToggleOutcome::Removed
                }
                Some((existing_id, _)) => {
                    tx.execute(&format!("DELETE FROM {table} WHERE id = ?1"), [&existing_id])?;
                    tx.execute(
                        &format!(
                            "INSERT INTO {table} (id, user_id, {target_col}, liked, created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5)"
                        ),
                        rusqlite::params![id, user_id, target_id, liked, now],
                    )?;
                    ToggleOutcome::Flipped
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// All reaction polarities stored for one target. The caller partitions
    /// them into like/dislike tallies.
    pub fn get_reaction_polarities(&self, kind: TargetKind, target_id: &str) -> Result<Vec<bool>> {
        let (table, target_col) = reaction_table(kind);
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT liked FROM {table} WHERE {target_col} = ?1"))?;
            let rows = stmt
                .query_map([target_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<bool>, _>>()?;
            Ok(rows)
        })
    }

    /// The stored reaction of one user on one target, if any.
    pub fn get_user_reaction(
        &self,
        kind: TargetKind,
        user_id: &str,
        target_id: &str,
    ) -> Result<Option<bool>> {
        let (table, target_col) = reaction_table(kind);
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT liked FROM {table} WHERE user_id = ?1 AND {target_col} = ?2"
                    ),
                    rusqlite::params![user_id, target_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(row)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, username, email, password, created_at, updated_at
         FROM users WHERE {column} = ?1"
    ))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn add_user(db: &Database, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(
            &id,
            name,
            &format!("{name}@example.com"),
            "not-a-real-hash",
            Utc::now(),
        )
        .unwrap();
        id
    }

    fn add_post(db: &Database, author: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_post(&id, author, "title", "body", Utc::now())
            .unwrap();
        id
    }

    fn toggle(db: &Database, user: &str, post: &str, liked: bool) -> ToggleOutcome {
        db.toggle_reaction(
            TargetKind::Post,
            &Uuid::new_v4().to_string(),
            user,
            post,
            liked,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn toggle_inserts_then_cancels() {
        let db = test_db();
        let user = add_user(&db, "ann");
        let post = add_post(&db, &user);

        assert_eq!(toggle(&db, &user, &post, true), ToggleOutcome::Added);
        assert_eq!(
            db.get_user_reaction(TargetKind::Post, &user, &post).unwrap(),
            Some(true)
        );

        assert_eq!(toggle(&db, &user, &post, true), ToggleOutcome::Removed);
        assert_eq!(
            db.get_user_reaction(TargetKind::Post, &user, &post).unwrap(),
            None
        );
    }

    #[test]
    fn toggle_flips_polarity() {
        let db = test_db();
        let user = add_user(&db, "bob");
        let post = add_post(&db, &user);

        assert_eq!(toggle(&db, &user, &post, true), ToggleOutcome::Added);
        assert_eq!(toggle(&db, &user, &post, false), ToggleOutcome::Flipped);
        assert_eq!(
            db.get_user_reaction(TargetKind::Post, &user, &post).unwrap(),
            Some(false)
        );
    }

    #[test]
    fn duplicate_reaction_rejected_by_constraint() {
        let db = test_db();
        let user = add_user(&db, "cal");
        let post = add_post(&db, &user);

        let insert = |id: &str| {
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO post_reactions (id, user_id, post_id, liked, created_at)
                     VALUES (?1, ?2, ?3, 1, ?4)",
                    rusqlite::params![id, user, post, Utc::now()],
                )?;
                Ok(())
            })
        };

        insert(&Uuid::new_v4().to_string()).unwrap();
        assert!(insert(&Uuid::new_v4().to_string()).is_err());
    }

    #[test]
    fn post_and_comment_reactions_are_separate_tables() {
        let db = test_db();
        let user = add_user(&db, "dee");
        let post = add_post(&db, &user);
        let comment = Uuid::new_v4().to_string();
        db.insert_comment(&comment, &post, &user, "hi", Utc::now())
            .unwrap();

        toggle(&db, &user, &post, true);
        db.toggle_reaction(
            TargetKind::Comment,
            &Uuid::new_v4().to_string(),
            &user,
            &comment,
            false,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(
            db.get_reaction_polarities(TargetKind::Post, &post).unwrap(),
            vec![true]
        );
        assert_eq!(
            db.get_reaction_polarities(TargetKind::Comment, &comment)
                .unwrap(),
            vec![false]
        );
    }

    #[test]
    fn session_lifecycle() {
        let db = test_db();
        let user = add_user(&db, "eve");
        let token = Uuid::new_v4().to_string();
        let expires = Utc::now() + Duration::hours(1);

        db.insert_session(&token, &user, expires).unwrap();
        let row = db.get_session(&token).unwrap().unwrap();
        assert_eq!(row.user_id, user);
        assert_eq!(row.expires_at.timestamp(), expires.timestamp());

        db.delete_session(&token).unwrap();
        assert!(db.get_session(&token).unwrap().is_none());

        // Deleting again is a no-op
        db.delete_session(&token).unwrap();
    }

    #[test]
    fn delete_sessions_for_user_clears_all() {
        let db = test_db();
        let user = add_user(&db, "fay");
        let other = add_user(&db, "gil");
        let expires = Utc::now() + Duration::hours(1);

        db.insert_session(&Uuid::new_v4().to_string(), &user, expires)
            .unwrap();
        db.insert_session(&Uuid::new_v4().to_string(), &user, expires)
            .unwrap();
        let kept = Uuid::new_v4().to_string();
        db.insert_session(&kept, &other, expires).unwrap();

        db.delete_sessions_for_user(&user).unwrap();

        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sessions WHERE user_id = ?1",
                    [&user],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 0);
        assert!(db.get_session(&kept).unwrap().is_some());
    }
}
