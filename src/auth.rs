//! User registry: registration, login, and password reset.
//!
//! Provides the actor identity the note service requires. Passwords and
//! security answers are stored as Argon2id PHC strings; plain credential
//! material never leaves this module.

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use time::OffsetDateTime;

use crate::errors::ServiceError;
use crate::models::{User, UserId};
use crate::Database;

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 8;

/// Input for registering a new account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub security_question: &'a str,
    pub security_answer: &'a str,
}

/// Account registry over the shared database.
///
/// Borrows the database rather than owning it so it can coexist with a
/// `NoteService` on the same connection.
pub struct UserRegistry<'a> {
    db: &'a Database,
}

impl<'a> UserRegistry<'a> {
    /// Creates a registry over the given database.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Registers a new account.
    ///
    /// Validates username shape (3-50 characters of letters, digits,
    /// underscore, dot, or dash) and password length before touching the
    /// store. A duplicate username is a conflict.
    pub fn register(&self, new_user: NewUser<'_>) -> Result<User, ServiceError> {
        let username = new_user.username.trim();
        let question = new_user.security_question.trim();
        let answer = new_user.security_answer.trim();

        if username.is_empty()
            || new_user.password.is_empty()
            || question.is_empty()
            || answer.is_empty()
        {
            return Err(ServiceError::validation("All fields are required."));
        }
        if !valid_username(username) {
            return Err(ServiceError::validation(
                "Username must be 3-50 characters and contain only letters, numbers, underscore, dot, or dash.",
            ));
        }
        if new_user.password.len() < MIN_PASSWORD_LEN {
            return Err(ServiceError::validation(
                "Password must be at least 8 characters.",
            ));
        }

        let password_hash = hash_secret(new_user.password)?;
        let answer_hash = hash_secret(answer)?;
        let now = OffsetDateTime::now_utc();

        let conn = self.db.connection();
        let result = conn.execute(
            "INSERT INTO users (username, password_hash, security_question, security_answer_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                username,
                password_hash,
                question,
                answer_hash,
                now.unix_timestamp()
            ],
        );

        match result {
            Ok(_) => Ok(User::new(
                UserId::new(conn.last_insert_rowid()),
                username,
                now,
            )),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(ServiceError::Conflict("Username already exists.".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verifies a username/password pair.
    ///
    /// Unknown usernames and wrong passwords fail identically so callers
    /// cannot probe which accounts exist.
    pub fn login(&self, username: &str, password: &str) -> Result<User, ServiceError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ServiceError::validation("Username and password required."));
        }

        let conn = self.db.connection();
        let row = conn
            .query_row(
                "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    ServiceError::validation("Invalid credentials.")
                }
                other => other.into(),
            })?;

        let (id, stored_username, password_hash, created_at) = row;
        if !verify_secret(&password_hash, password)? {
            return Err(ServiceError::validation("Invalid credentials."));
        }

        Ok(User::new(
            UserId::new(id),
            stored_username,
            timestamp(created_at)?,
        ))
    }

    /// Resets a password after verifying the account's security answer.
    pub fn reset_password(
        &self,
        username: &str,
        security_answer: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let username = username.trim();
        let answer = security_answer.trim();
        if username.is_empty() || answer.is_empty() || new_password.is_empty() {
            return Err(ServiceError::validation("All fields are required."));
        }
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(ServiceError::validation(
                "New password must be at least 8 characters.",
            ));
        }

        let conn = self.db.connection();
        let row = conn
            .query_row(
                "SELECT id, security_answer_hash FROM users WHERE username = ?1",
                [username],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => ServiceError::NotFound("user"),
                other => other.into(),
            })?;

        let (id, answer_hash) = row;
        if !verify_secret(&answer_hash, answer)? {
            return Err(ServiceError::validation("Security answer is incorrect."));
        }

        let new_hash = hash_secret(new_password)?;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            rusqlite::params![new_hash, id],
        )?;

        Ok(())
    }

    /// Looks up a registered user by name.
    ///
    /// The CLI resolves its acting identity through this; operations that
    /// change credentials go through `login`/`reset_password` instead.
    pub fn find_user(&self, username: &str) -> Result<User, ServiceError> {
        let conn = self.db.connection();
        conn.query_row(
            "SELECT id, username, created_at FROM users WHERE username = ?1",
            [username.trim()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => ServiceError::NotFound("user"),
            other => other.into(),
        })
        .and_then(|(id, username, created_at)| {
            Ok(User::new(UserId::new(id), username, timestamp(created_at)?))
        })
    }

    /// Returns the stored security question for an account.
    pub fn security_question(&self, username: &str) -> Result<String, ServiceError> {
        let conn = self.db.connection();
        conn.query_row(
            "SELECT security_question FROM users WHERE username = ?1",
            [username.trim()],
            |row| row.get(0),
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => ServiceError::NotFound("user"),
            other => other.into(),
        })
    }
}

/// Username guardrails: 3-50 characters of `[A-Za-z0-9_.-]`.
fn valid_username(username: &str) -> bool {
    (3..=50).contains(&username.chars().count())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Hashes a secret to an Argon2id PHC string with a fresh salt.
fn hash_secret(secret: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Hash(e.to_string()))
}

/// Verifies a secret against a stored PHC string.
fn verify_secret(stored: &str, secret: &str) -> Result<bool, ServiceError> {
    let parsed = PasswordHash::new(stored).map_err(|e| ServiceError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}

fn timestamp(unix: i64) -> Result<OffsetDateTime, ServiceError> {
    OffsetDateTime::from_unix_timestamp(unix).map_err(|e| {
        ServiceError::Storage(rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Integer,
            Box::new(e),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_db() -> Database {
        Database::in_memory().expect("failed to create in-memory database")
    }

    fn alice<'a>() -> NewUser<'a> {
        NewUser {
            username: "alice",
            password: "correct horse",
            security_question: "First pet?",
            security_answer: "Rex",
        }
    }

    #[test]
    fn register_then_login_roundtrip() {
        let db = registry_db();
        let registry = UserRegistry::new(&db);

        let registered = registry.register(alice()).expect("register failed");
        assert_eq!(registered.username(), "alice");

        let logged_in = registry
            .login("alice", "correct horse")
            .expect("login failed");
        assert_eq!(logged_in.id(), registered.id());
    }

    #[test]
    fn login_rejects_wrong_password_and_unknown_user_identically() {
        let db = registry_db();
        let registry = UserRegistry::new(&db);
        registry.register(alice()).expect("register failed");

        let wrong = registry.login("alice", "wrong password").unwrap_err();
        let unknown = registry.login("nobody", "wrong password").unwrap_err();

        assert_eq!(wrong.to_string(), "Invalid credentials.");
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let db = registry_db();
        let registry = UserRegistry::new(&db);
        registry.register(alice()).expect("register failed");

        let err = registry.register(alice()).unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn register_validates_username_shape() {
        let db = registry_db();
        let registry = UserRegistry::new(&db);

        for bad in ["ab", "has space", "semi;colon", "way-too-long-\
            aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"]
        {
            let err = registry
                .register(NewUser {
                    username: bad,
                    ..alice()
                })
                .unwrap_err();
            assert!(
                matches!(err, ServiceError::Validation(_)),
                "username {bad:?} should be rejected"
            );
        }

        // Dots, dashes, underscores are fine
        registry
            .register(NewUser {
                username: "a.b-c_d",
                ..alice()
            })
            .expect("valid username rejected");
    }

    #[test]
    fn register_rejects_short_password() {
        let db = registry_db();
        let registry = UserRegistry::new(&db);

        let err = registry
            .register(NewUser {
                password: "short",
                ..alice()
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn reset_password_requires_correct_answer() {
        let db = registry_db();
        let registry = UserRegistry::new(&db);
        registry.register(alice()).expect("register failed");

        let err = registry
            .reset_password("alice", "Fido", "new password 1")
            .unwrap_err();
        assert_eq!(err.to_string(), "Security answer is incorrect.");

        registry
            .reset_password("alice", "Rex", "new password 1")
            .expect("reset failed");

        // Old password no longer works, new one does
        assert!(registry.login("alice", "correct horse").is_err());
        registry
            .login("alice", "new password 1")
            .expect("login with new password failed");
    }

    #[test]
    fn reset_password_for_unknown_user_is_not_found() {
        let db = registry_db();
        let registry = UserRegistry::new(&db);

        let err = registry
            .reset_password("nobody", "Rex", "new password 1")
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("user")));
    }

    #[test]
    fn find_user_and_security_question() {
        let db = registry_db();
        let registry = UserRegistry::new(&db);
        registry.register(alice()).expect("register failed");

        let user = registry.find_user("alice").expect("find_user failed");
        assert_eq!(user.username(), "alice");

        let question = registry
            .security_question("alice")
            .expect("security_question failed");
        assert_eq!(question, "First pet?");

        assert!(matches!(
            registry.find_user("nobody").unwrap_err(),
            ServiceError::NotFound("user")
        ));
    }
}
