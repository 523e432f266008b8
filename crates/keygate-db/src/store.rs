//! SurrealDB implementation of [`CredentialStore`].
//!
//! Record ids are UUID strings addressed through `type::thing`.
//! Uniqueness of `(app_id, email)` is enforced by the schema's unique
//! index, so concurrent `create_user` calls for the same pair resolve
//! to one success and one `Conflict`.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use surrealdb::sql::Datetime;
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use keygate_core::models::{NewUser, Session, User, UserView};
use keygate_core::{CredentialStore, KeygateResult};

use crate::error::StoreError;

#[derive(Debug, Deserialize)]
struct UserRow {
    app_id: String,
    email: String,
    hashed_pass: String,
    lang: String,
    confirmation_key: Option<String>,
    confirmed_at: Option<Datetime>,
    reset_key: Option<String>,
    reset_key_at: Option<Datetime>,
    created_at: Datetime,
}

/// Row struct for queries that project the record id via `meta::id`.
#[derive(Debug, Deserialize)]
struct UserRowWithId {
    record_id: String,
    app_id: String,
    email: String,
    hashed_pass: String,
    lang: String,
    confirmation_key: Option<String>,
    confirmed_at: Option<Datetime>,
    reset_key: Option<String>,
    reset_key_at: Option<Datetime>,
    created_at: Datetime,
}

#[derive(Debug, Deserialize)]
struct UserViewRow {
    record_id: String,
    app_id: String,
    email: String,
    lang: String,
    confirmed_at: Option<Datetime>,
    created_at: Datetime,
}

#[derive(Debug, Deserialize)]
struct SessionRow {
    user_id: String,
    created_at: Datetime,
}

fn parse_uuid(value: &str, what: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| StoreError::Corrupt(format!("invalid {what} UUID: {e}")))
}

impl UserRow {
    fn into_user(self, id: Uuid) -> User {
        User {
            id,
            app_id: self.app_id,
            email: self.email,
            hashed_pass: self.hashed_pass,
            lang: self.lang,
            created_at: self.created_at.into(),
            confirmation_key: self.confirmation_key,
            confirmed_at: self.confirmed_at.map(Into::into),
            reset_key: self.reset_key,
            reset_key_at: self.reset_key_at.map(Into::into),
        }
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, StoreError> {
        let id = parse_uuid(&self.record_id, "user")?;
        Ok(User {
            id,
            app_id: self.app_id,
            email: self.email,
            hashed_pass: self.hashed_pass,
            lang: self.lang,
            created_at: self.created_at.into(),
            confirmation_key: self.confirmation_key,
            confirmed_at: self.confirmed_at.map(Into::into),
            reset_key: self.reset_key,
            reset_key_at: self.reset_key_at.map(Into::into),
        })
    }
}

impl UserViewRow {
    fn try_into_view(self) -> Result<UserView, StoreError> {
        let id = parse_uuid(&self.record_id, "user")?;
        Ok(UserView {
            id,
            app_id: self.app_id,
            email: self.email,
            lang: self.lang,
            created_at: self.created_at.into(),
            confirmed_at: self.confirmed_at.map(Into::into),
        })
    }
}

impl SessionRow {
    fn try_into_session(self, id: Uuid) -> Result<Session, StoreError> {
        let user_id = parse_uuid(&self.user_id, "session user")?;
        Ok(Session {
            id,
            user_id,
            created_at: self.created_at.into(),
        })
    }
}

/// SurrealDB credential store.
#[derive(Clone)]
pub struct SurrealCredentialStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCredentialStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> CredentialStore for SurrealCredentialStore<C> {
    async fn create_user(&self, input: NewUser) -> KeygateResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let created_at = Utc::now();
        let confirmed_at = input.confirmed.then_some(Datetime::from(created_at));

        let result = self
            .db
            .query(
                "CREATE type::thing('user', $id) SET \
                 app_id = $app_id, \
                 email = $email, \
                 hashed_pass = $hashed_pass, \
                 lang = $lang, \
                 confirmation_key = $confirmation_key, \
                 confirmed_at = $confirmed_at, \
                 reset_key = NONE, \
                 reset_key_at = NONE, \
                 created_at = $created_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("app_id", input.app_id))
            .bind(("email", input.email))
            .bind(("hashed_pass", input.hashed_pass))
            .bind(("lang", input.lang))
            .bind(("confirmation_key", input.confirmation_key))
            .bind(("confirmed_at", confirmed_at))
            .bind(("created_at", Datetime::from(created_at)))
            .await
            .map_err(StoreError::from)?;

        let mut result = result
            .check()
            .map_err(|e| StoreError::conflict_or(e, "user"))?;

        let rows: Vec<UserRow> = result.take(0).map_err(StoreError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id))
    }

    async fn get_user_by_email(&self, app_id: &str, email: &str) -> KeygateResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE app_id = $app_id AND email = $email",
            )
            .bind(("app_id", app_id.to_string()))
            .bind(("email", email.to_string()))
            .await
            .map_err(StoreError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(StoreError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            entity: "user".into(),
            id: format!("email={email}"),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn get_user_by_id(&self, id: Uuid) -> KeygateResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::thing('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(StoreError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(StoreError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id))
    }

    async fn set_confirmed_at(&self, id: Uuid, confirmed_at: DateTime<Utc>) -> KeygateResult<()> {
        // Confirmation consumes the key in the same row update.
        self.update_user(
            id,
            "confirmed_at = $confirmed_at, confirmation_key = NONE",
            |q| q.bind(("confirmed_at", Datetime::from(confirmed_at))),
        )
        .await
    }

    async fn set_reset_key(
        &self,
        id: Uuid,
        reset_key: &str,
        requested_at: DateTime<Utc>,
    ) -> KeygateResult<()> {
        self.update_user(id, "reset_key = $reset_key, reset_key_at = $reset_key_at", |q| {
            q.bind(("reset_key", reset_key.to_string()))
                .bind(("reset_key_at", Datetime::from(requested_at)))
        })
        .await
    }

    async fn clear_reset_key(&self, id: Uuid) -> KeygateResult<()> {
        self.update_user(id, "reset_key = NONE, reset_key_at = NONE", |q| q)
            .await
    }

    async fn set_hashed_pass(&self, id: Uuid, hashed_pass: &str) -> KeygateResult<()> {
        // A password write consumes any outstanding reset key; the
        // single row update is what keeps two concurrent resets from
        // both appearing to succeed.
        self.update_user(
            id,
            "hashed_pass = $hashed_pass, reset_key = NONE, reset_key_at = NONE",
            |q| q.bind(("hashed_pass", hashed_pass.to_string())),
        )
        .await
    }

    async fn set_email(&self, id: Uuid, email: &str) -> KeygateResult<()> {
        self.update_user(id, "email = $email", |q| {
            q.bind(("email", email.to_string()))
        })
        .await
    }

    async fn remove_users(&self, ids: &[Uuid]) -> KeygateResult<()> {
        let id_strs: Vec<String> = ids.iter().map(Uuid::to_string).collect();

        // Sessions and users go in one transaction so a failure in the
        // middle cannot leave orphaned sessions.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE session WHERE user_id IN $ids; \
                 DELETE user WHERE meta::id(id) IN $ids; \
                 COMMIT TRANSACTION;",
            )
            .bind(("ids", id_strs))
            .await
            .map_err(StoreError::from)?
            .check()
            .map_err(StoreError::from)?;

        Ok(())
    }

    async fn list_users(&self, app_id: Option<&str>) -> KeygateResult<Vec<UserView>> {
        let query = match app_id {
            Some(_) => {
                "SELECT meta::id(id) AS record_id, app_id, email, lang, \
                 confirmed_at, created_at FROM user \
                 WHERE app_id = $app_id ORDER BY created_at"
            }
            None => {
                "SELECT meta::id(id) AS record_id, app_id, email, lang, \
                 confirmed_at, created_at FROM user ORDER BY created_at"
            }
        };

        let mut builder = self.db.query(query);
        if let Some(app_id) = app_id {
            builder = builder.bind(("app_id", app_id.to_string()));
        }

        let mut result = builder.await.map_err(StoreError::from)?;
        let rows: Vec<UserViewRow> = result.take(0).map_err(StoreError::from)?;

        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            views.push(row.try_into_view()?);
        }
        Ok(views)
    }

    async fn create_session(&self, user_id: Uuid) -> KeygateResult<Session> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let created_at = Utc::now();

        let result = self
            .db
            .query(
                "CREATE type::thing('session', $id) SET \
                 user_id = $user_id, created_at = $created_at",
            )
            .bind(("id", id_str.clone()))
            .bind(("user_id", user_id.to_string()))
            .bind(("created_at", Datetime::from(created_at)))
            .await
            .map_err(StoreError::from)?;

        let mut result = result.check().map_err(StoreError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(StoreError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            entity: "session".into(),
            id: id_str,
        })?;

        Ok(row.try_into_session(id)?)
    }

    async fn get_session(&self, id: Uuid) -> KeygateResult<Session> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::thing('session', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(StoreError::from)?;

        let rows: Vec<SessionRow> = result.take(0).map_err(StoreError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| StoreError::NotFound {
            entity: "session".into(),
            id: id_str,
        })?;

        Ok(row.try_into_session(id)?)
    }

    async fn remove_session(&self, id: Uuid) -> KeygateResult<()> {
        // Deleting an absent record is a no-op, which is exactly the
        // idempotence signout needs.
        self.db
            .query("DELETE type::thing('session', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(StoreError::from)?
            .check()
            .map_err(StoreError::from)?;

        Ok(())
    }

    async fn remove_sessions_for_user(&self, user_id: Uuid) -> KeygateResult<()> {
        self.db
            .query("DELETE session WHERE user_id = $user_id")
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(StoreError::from)?
            .check()
            .map_err(StoreError::from)?;

        Ok(())
    }

    async fn purge_unconfirmed_before(&self, cutoff: DateTime<Utc>) -> KeygateResult<u64> {
        let mut result = self
            .db
            .query(
                "DELETE user WHERE confirmed_at IS NONE \
                 AND created_at < $cutoff RETURN BEFORE",
            )
            .bind(("cutoff", Datetime::from(cutoff)))
            .await
            .map_err(StoreError::from)?;

        let purged: Vec<UserRow> = result.take(0).map_err(StoreError::from)?;
        Ok(purged.len() as u64)
    }

    async fn purge_idle_sessions_before(&self, cutoff: DateTime<Utc>) -> KeygateResult<u64> {
        let mut result = self
            .db
            .query("DELETE session WHERE created_at < $cutoff RETURN BEFORE")
            .bind(("cutoff", Datetime::from(cutoff)))
            .await
            .map_err(StoreError::from)?;

        let purged: Vec<SessionRow> = result.take(0).map_err(StoreError::from)?;
        Ok(purged.len() as u64)
    }
}

impl<C: Connection> SurrealCredentialStore<C> {
    /// Single-row user update; an empty result means the user is gone.
    async fn update_user<F>(&self, id: Uuid, set_clause: &str, bind: F) -> KeygateResult<()>
    where
        F: for<'a> FnOnce(
            surrealdb::method::Query<'a, C>,
        ) -> surrealdb::method::Query<'a, C>,
    {
        let id_str = id.to_string();
        let query = format!("UPDATE type::thing('user', $id) SET {set_clause}");

        let builder = self.db.query(query).bind(("id", id_str.clone()));
        let result = bind(builder).await.map_err(StoreError::from)?;

        let mut result = result
            .check()
            .map_err(|e| StoreError::conflict_or(e, "user"))?;

        let rows: Vec<UserRow> = result.take(0).map_err(StoreError::from)?;
        if rows.is_empty() {
            return Err(StoreError::NotFound {
                entity: "user".into(),
                id: id_str,
            }
            .into());
        }

        Ok(())
    }
}
