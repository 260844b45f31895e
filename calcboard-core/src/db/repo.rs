//! Database repository layer
//!
//! Provides query and insert operations for users, bearer tokens and
//! calculations. Calculations are reached through the [`CalculationStore`]
//! implementation so every access is owner-scoped.

use crate::error::{Error, Result};
use crate::store::{CalculationQuery, CalculationStore, SortOrder};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

/// Fixed-width RFC 3339 (nanoseconds, `Z` suffix) so text order is time order.
pub(crate) fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn column_index(row: &Row, name: &str) -> rusqlite::Result<usize> {
    row.as_ref().column_index(name)
}

fn parse_ts(row: &Row, name: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(name)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column_index(row, name).unwrap_or(0), e))
}

fn parse_ts_opt(row: &Row, name: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(name)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(column_index(row, name).unwrap_or(0), e))
    })
    .transpose()
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable foreign keys and WAL mode for better concurrency
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        tracing::debug!(path = %path.display(), "Database opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.lock()
    }

    /// Poisoned guards are recovered; SQLite rolls back incomplete statements.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ============================================
    // User operations
    // ============================================

    /// Insert a new user with its password digest
    pub fn insert_user(&self, user: &User, password: &PasswordHash) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO users (id, username, email, first_name, last_name,
                               password_salt, password_hash, is_active, is_verified,
                               created_at, updated_at, last_login)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                user.id,
                user.username,
                user.email,
                user.first_name,
                user.last_name,
                password.salt,
                password.digest,
                user.is_active,
                user.is_verified,
                ts_to_sql(&user.created_at),
                ts_to_sql(&user.updated_at),
                user.last_login.as_ref().map(ts_to_sql),
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Error::Conflict("username or email already exists".to_string())
            }
            other => other.into(),
        })?;
        Ok(())
    }

    /// Get a user by ID
    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.lock();
        conn.query_row("SELECT * FROM users WHERE id = ?", [id], Self::row_to_user)
            .optional()
            .map_err(Error::from)
    }

    /// Get a user by username
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM users WHERE username = ?",
            [username],
            Self::row_to_user,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Look up a user and password digest by username or email
    pub fn find_credentials(&self, identifier: &str) -> Result<Option<(User, PasswordHash)>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM users WHERE username = ?1 OR lower(email) = lower(?1) LIMIT 1",
            [identifier],
            |row| {
                let user = Self::row_to_user(row)?;
                let password = PasswordHash {
                    salt: row.get("password_salt")?,
                    digest: row.get("password_hash")?,
                };
                Ok((user, password))
            },
        )
        .optional()
        .map_err(Error::from)
    }

    /// Whether a username is already registered
    pub fn username_taken(&self, username: &str) -> Result<bool> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?",
            [username],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whether an email is already registered (case-insensitive)
    pub fn email_taken(&self, email: &str) -> Result<bool> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE lower(email) = lower(?)",
            [email],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record a successful login
    pub fn record_login(&self, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.lock();
        let ts = ts_to_sql(&at);
        conn.execute(
            "UPDATE users SET last_login = ?1, updated_at = ?1 WHERE id = ?2",
            params![ts, user_id],
        )?;
        Ok(())
    }

    /// Activate or deactivate an account
    pub fn set_user_active(&self, user_id: &str, active: bool) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, ts_to_sql(&Utc::now()), user_id],
        )?;
        Ok(changed > 0)
    }

    fn row_to_user(row: &Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            first_name: row.get("first_name")?,
            last_name: row.get("last_name")?,
            is_active: row.get("is_active")?,
            is_verified: row.get("is_verified")?,
            created_at: parse_ts(row, "created_at")?,
            updated_at: parse_ts(row, "updated_at")?,
            last_login: parse_ts_opt(row, "last_login")?,
        })
    }

    // ============================================
    // Token operations
    // ============================================

    /// Store a hashed bearer token
    pub fn insert_token(&self, token: &AuthToken) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO auth_tokens (token_hash, user_id, kind, created_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                token.token_hash,
                token.user_id,
                token.kind.as_str(),
                ts_to_sql(&token.created_at),
                ts_to_sql(&token.expires_at),
            ],
        )?;
        Ok(())
    }

    /// Get a token by its hash
    pub fn get_token(&self, token_hash: &str) -> Result<Option<AuthToken>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM auth_tokens WHERE token_hash = ?",
            [token_hash],
            Self::row_to_token,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Revoke a token. Returns `false` if it did not exist.
    pub fn delete_token(&self, token_hash: &str) -> Result<bool> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM auth_tokens WHERE token_hash = ?",
            [token_hash],
        )?;
        Ok(deleted > 0)
    }

    /// Delete every token that expired at or before `now`
    pub fn purge_expired_tokens(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM auth_tokens WHERE expires_at <= ?",
            [ts_to_sql(&now)],
        )?;
        if deleted > 0 {
            tracing::debug!(deleted, "Purged expired tokens");
        }
        Ok(deleted)
    }

    fn row_to_token(row: &Row) -> rusqlite::Result<AuthToken> {
        let kind_str: String = row.get("kind")?;
        let kind = kind_str.parse::<TokenKind>().map_err(|e| {
            conversion_error(
                column_index(row, "kind").unwrap_or(0),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;

        Ok(AuthToken {
            token_hash: row.get("token_hash")?,
            user_id: row.get("user_id")?,
            kind,
            created_at: parse_ts(row, "created_at")?,
            expires_at: parse_ts(row, "expires_at")?,
        })
    }

    // ============================================
    // Calculation rows
    // ============================================

    fn row_to_calculation(row: &Row) -> rusqlite::Result<Calculation> {
        let type_str: String = row.get("type")?;
        let operation = type_str.parse::<OperationType>().map_err(|e| {
            conversion_error(
                column_index(row, "type").unwrap_or(0),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
            )
        })?;

        let inputs_str: String = row.get("inputs")?;
        let inputs: Vec<f64> = serde_json::from_str(&inputs_str)
            .map_err(|e| conversion_error(column_index(row, "inputs").unwrap_or(0), e))?;

        Ok(Calculation {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            operation,
            inputs,
            result: row.get("result")?,
            created_at: parse_ts(row, "created_at")?,
            updated_at: parse_ts(row, "updated_at")?,
        })
    }

    /// Shared WHERE clause for owner listings and counts.
    fn owner_filter(
        owner: &str,
        query: &CalculationQuery,
    ) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut sql = String::from(" WHERE user_id = ?");
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner.to_string())];

        if let Some(tag) = query.operation_tag() {
            sql.push_str(" AND type = ?");
            params.push(Box::new(tag));
        }

        if let Some(since) = &query.since {
            sql.push_str(" AND created_at >= ?");
            params.push(Box::new(ts_to_sql(since)));
        }

        if let Some(until) = &query.until {
            sql.push_str(" AND created_at <= ?");
            params.push(Box::new(ts_to_sql(until)));
        }

        (sql, params)
    }
}

impl CalculationStore for Database {
    fn create(&self, calc: &Calculation) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO calculations (id, user_id, type, inputs, result, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                calc.id,
                calc.user_id,
                calc.operation.as_str(),
                serde_json::to_string(&calc.inputs)?,
                calc.result,
                ts_to_sql(&calc.created_at),
                ts_to_sql(&calc.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str, owner: &str) -> Result<Option<Calculation>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM calculations WHERE id = ?1 AND user_id = ?2",
            [id, owner],
            Self::row_to_calculation,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_by_owner(&self, owner: &str, query: &CalculationQuery) -> Result<Vec<Calculation>> {
        let conn = self.lock();

        let (filter, params) = Self::owner_filter(owner, query);
        let mut sql = format!("SELECT * FROM calculations{}", filter);

        sql.push_str(match query.order {
            SortOrder::NewestFirst => " ORDER BY created_at DESC, id DESC",
            SortOrder::OldestFirst => " ORDER BY created_at ASC, id ASC",
        });

        match (query.limit, query.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let calculations = stmt
            .query_map(params_refs.as_slice(), Self::row_to_calculation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(calculations)
    }

    fn count_by_owner(&self, owner: &str, query: &CalculationQuery) -> Result<i64> {
        let conn = self.lock();

        let (filter, params) = Self::owner_filter(owner, query);
        let sql = format!("SELECT COUNT(*) FROM calculations{}", filter);
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&sql, params_refs.as_slice(), |r| r.get(0))?;
        Ok(count)
    }

    fn update(&self, calc: &Calculation) -> Result<bool> {
        let conn = self.lock();
        let changed = conn.execute(
            r#"
            UPDATE calculations
            SET type = ?1, inputs = ?2, result = ?3, updated_at = ?4
            WHERE id = ?5 AND user_id = ?6
            "#,
            params![
                calc.operation.as_str(),
                serde_json::to_string(&calc.inputs)?,
                calc.result,
                ts_to_sql(&calc.updated_at),
                calc.id,
                calc.user_id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete(&self, id: &str, owner: &str) -> Result<bool> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM calculations WHERE id = ?1 AND user_id = ?2",
            [id, owner],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn create_test_user(db: &Database, username: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            is_active: true,
            is_verified: false,
            created_at: now,
            updated_at: now,
            last_login: None,
        };
        let password = PasswordHash {
            salt: "salt".to_string(),
            digest: "digest".to_string(),
        };
        db.insert_user(&user, &password).unwrap();
        user
    }

    fn create_test_calculation(
        db: &Database,
        owner: &User,
        operation: OperationType,
        inputs: Vec<f64>,
        created_at: DateTime<Utc>,
    ) -> Calculation {
        let calc = Calculation::new_at(&owner.id, operation, inputs, created_at).unwrap();
        db.create(&calc).unwrap();
        calc
    }

    #[test]
    fn test_user_round_trip() {
        let db = test_db();
        let user = create_test_user(&db, "alice");

        let fetched = db.get_user(&user.id).unwrap().unwrap();
        assert_eq!(fetched, user);

        let by_name = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, user.id);

        assert!(db.get_user("missing").unwrap().is_none());
    }

    #[test]
    fn test_find_credentials_by_username_or_email() {
        let db = test_db();
        let user = create_test_user(&db, "bob");

        let (found, password) = db.find_credentials("bob").unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(password.digest, "digest");

        let (found, _) = db.find_credentials("BOB@example.com").unwrap().unwrap();
        assert_eq!(found.id, user.id);

        assert!(db.find_credentials("carol").unwrap().is_none());
    }

    #[test]
    fn test_uniqueness_checks() {
        let db = test_db();
        let user = create_test_user(&db, "dave");

        assert!(db.username_taken("dave").unwrap());
        assert!(!db.username_taken("erin").unwrap());
        assert!(db.email_taken("Dave@Example.com").unwrap());

        // The schema enforces uniqueness even if callers skip the checks.
        let duplicate = User {
            id: uuid::Uuid::new_v4().to_string(),
            ..user
        };
        let password = PasswordHash {
            salt: "s".to_string(),
            digest: "d".to_string(),
        };
        assert!(matches!(
            db.insert_user(&duplicate, &password),
            Err(Error::Conflict(_))
        ));

        // A fresh username with a taken email.
        let same_email = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: "dave2".to_string(),
            ..duplicate.clone()
        };
        assert!(matches!(
            db.insert_user(&same_email, &password),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_record_login() {
        let db = test_db();
        let user = create_test_user(&db, "frank");
        let at = Utc::now();

        db.record_login(&user.id, at).unwrap();

        let fetched = db.get_user(&user.id).unwrap().unwrap();
        assert_eq!(fetched.last_login, Some(at));
    }

    #[test]
    fn test_token_lifecycle() {
        let db = test_db();
        let user = create_test_user(&db, "grace");
        let now = Utc::now();

        let live = AuthToken {
            token_hash: "live".to_string(),
            user_id: user.id.clone(),
            kind: TokenKind::Access,
            created_at: now,
            expires_at: now + Duration::minutes(30),
        };
        let stale = AuthToken {
            token_hash: "stale".to_string(),
            user_id: user.id.clone(),
            kind: TokenKind::Refresh,
            created_at: now - Duration::days(8),
            expires_at: now - Duration::days(1),
        };
        db.insert_token(&live).unwrap();
        db.insert_token(&stale).unwrap();

        let fetched = db.get_token("live").unwrap().unwrap();
        assert_eq!(fetched.kind, TokenKind::Access);
        assert_eq!(fetched.user_id, user.id);

        assert_eq!(db.purge_expired_tokens(now).unwrap(), 1);
        assert!(db.get_token("stale").unwrap().is_none());

        assert!(db.delete_token("live").unwrap());
        assert!(!db.delete_token("live").unwrap());
    }

    #[test]
    fn test_calculation_round_trip() {
        let db = test_db();
        let user = create_test_user(&db, "heidi");
        let calc = create_test_calculation(
            &db,
            &user,
            OperationType::Division,
            vec![100.0, 2.0, 5.0],
            Utc::now(),
        );

        let fetched = db.get(&calc.id, &user.id).unwrap().unwrap();
        assert_eq!(fetched, calc);
        assert_eq!(fetched.result, 10.0);
    }

    #[test]
    fn test_get_is_owner_scoped() {
        let db = test_db();
        let alice = create_test_user(&db, "alice");
        let mallory = create_test_user(&db, "mallory");
        let calc = create_test_calculation(
            &db,
            &alice,
            OperationType::Addition,
            vec![1.0, 2.0],
            Utc::now(),
        );

        assert!(db.get(&calc.id, &mallory.id).unwrap().is_none());
        assert!(!db.delete(&calc.id, &mallory.id).unwrap());

        let mut hijacked = calc.clone();
        hijacked.user_id = mallory.id.clone();
        hijacked.result = 999.0;
        assert!(!db.update(&hijacked).unwrap());

        let untouched = db.get(&calc.id, &alice.id).unwrap().unwrap();
        assert_eq!(untouched.result, 3.0);
    }

    #[test]
    fn test_list_newest_first_with_filters() {
        let db = test_db();
        let user = create_test_user(&db, "ivan");
        let other = create_test_user(&db, "judy");
        let now = Utc::now();

        let oldest = create_test_calculation(
            &db,
            &user,
            OperationType::Addition,
            vec![1.0, 1.0],
            now - Duration::days(3),
        );
        let middle = create_test_calculation(
            &db,
            &user,
            OperationType::Multiplication,
            vec![2.0, 2.0],
            now - Duration::days(2),
        );
        let newest = create_test_calculation(
            &db,
            &user,
            OperationType::Addition,
            vec![3.0, 3.0],
            now - Duration::days(1),
        );
        create_test_calculation(&db, &other, OperationType::Addition, vec![9.0, 9.0], now);

        let all = db.list_by_owner(&user.id, &CalculationQuery::all()).unwrap();
        let ids: Vec<_> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![newest.id.as_str(), middle.id.as_str(), oldest.id.as_str()]);

        let oldest_first = db
            .list_by_owner(&user.id, &CalculationQuery::all().order(SortOrder::OldestFirst))
            .unwrap();
        assert_eq!(oldest_first[0].id, oldest.id);

        let additions = CalculationQuery::all().with_operation("ADDITION");
        assert_eq!(db.list_by_owner(&user.id, &additions).unwrap().len(), 2);
        assert_eq!(db.count_by_owner(&user.id, &additions).unwrap(), 2);

        let unknown = CalculationQuery::all().with_operation("modulo");
        assert!(db.list_by_owner(&user.id, &unknown).unwrap().is_empty());

        let window = CalculationQuery::all().between(now - Duration::hours(60), now);
        let recent = db.list_by_owner(&user.id, &window).unwrap();
        assert_eq!(recent.len(), 2);

        let paged = db
            .list_by_owner(&user.id, &CalculationQuery::all().page(1, 1))
            .unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, middle.id);
        assert_eq!(
            db.count_by_owner(&user.id, &CalculationQuery::all().page(1, 1))
                .unwrap(),
            3
        );
    }

    #[test]
    fn test_update_and_delete() {
        let db = test_db();
        let user = create_test_user(&db, "karl");
        let mut calc = create_test_calculation(
            &db,
            &user,
            OperationType::Addition,
            vec![1.0, 2.0],
            Utc::now() - Duration::minutes(1),
        );

        let update = CalculationUpdate {
            operation: Some("subtraction".to_string()),
            inputs: Some(vec![10.0, 4.0]),
        };
        calc.apply(&update, Utc::now()).unwrap();
        assert!(db.update(&calc).unwrap());

        let fetched = db.get(&calc.id, &user.id).unwrap().unwrap();
        assert_eq!(fetched.operation, OperationType::Subtraction);
        assert_eq!(fetched.result, 6.0);
        assert_eq!(fetched.updated_at, calc.updated_at);

        assert!(db.delete(&calc.id, &user.id).unwrap());
        assert!(db.get(&calc.id, &user.id).unwrap().is_none());
    }

    #[test]
    fn test_calculation_requires_existing_user() {
        let db = test_db();
        let calc =
            Calculation::new("no-such-user", OperationType::Addition, vec![1.0, 2.0]).unwrap();
        assert!(db.create(&calc).is_err());
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = Utc::now();
        let late = early + Duration::microseconds(1);
        assert_eq!(ts_to_sql(&early).len(), ts_to_sql(&late).len());
        assert!(ts_to_sql(&early) < ts_to_sql(&late));
    }
}
