//! Embedded schema migrations
//!
//! Each `Migration` carries the SQL for both drivers. Applied versions are
//! recorded in `_migrations`, so `run_migrations` is safe to call on every
//! start.

use anyhow::{Context, Result};
use sqlx::Row;

use super::{Backend, DynDatabasePool};

/// A schema migration with SQL for SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i32,
    pub name: &'static str,
    pub up_sqlite: &'static str,
    pub up_mysql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                full_name VARCHAR(255),
                role VARCHAR(20) NOT NULL DEFAULT 'user',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                full_name VARCHAR(255),
                role VARCHAR(20) NOT NULL DEFAULT 'user',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX idx_users_role ON users(role);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_categories",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(100) NOT NULL UNIQUE,
                name VARCHAR(100) NOT NULL UNIQUE,
                description TEXT,
                icon VARCHAR(100),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS categories (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                slug VARCHAR(100) NOT NULL UNIQUE,
                name VARCHAR(100) NOT NULL UNIQUE,
                description TEXT,
                icon VARCHAR(100),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
    },
    Migration {
        version: 4,
        name: "create_packages",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(255) NOT NULL UNIQUE,
                destination VARCHAR(255) NOT NULL,
                short_description TEXT,
                long_description TEXT,
                price_base REAL NOT NULL DEFAULT 0,
                currency VARCHAR(3) NOT NULL DEFAULT 'MXN',
                duration_nights INTEGER NOT NULL DEFAULT 0,
                min_guests INTEGER NOT NULL DEFAULT 1,
                max_guests INTEGER NOT NULL DEFAULT 1,
                cover_url TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                booking_mode VARCHAR(20) NOT NULL DEFAULT 'inquiry',
                created_by INTEGER,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_packages_status ON packages(status);
            CREATE INDEX IF NOT EXISTS idx_packages_created_at ON packages(created_at);
            CREATE TABLE IF NOT EXISTS package_images (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_id INTEGER NOT NULL,
                image_url TEXT NOT NULL,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_package_images_package ON package_images(package_id);
            CREATE TABLE IF NOT EXISTS package_tags (
                package_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                PRIMARY KEY (package_id, category_id),
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_package_tags_category ON package_tags(category_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS packages (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(255) NOT NULL,
                slug VARCHAR(255) NOT NULL UNIQUE,
                destination VARCHAR(255) NOT NULL,
                short_description TEXT,
                long_description TEXT,
                price_base DOUBLE NOT NULL DEFAULT 0,
                currency VARCHAR(3) NOT NULL DEFAULT 'MXN',
                duration_nights INT NOT NULL DEFAULT 0,
                min_guests INT NOT NULL DEFAULT 1,
                max_guests INT NOT NULL DEFAULT 1,
                cover_url TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                booking_mode VARCHAR(20) NOT NULL DEFAULT 'inquiry',
                created_by BIGINT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (created_by) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_packages_status ON packages(status);
            CREATE INDEX idx_packages_created_at ON packages(created_at);
            CREATE TABLE IF NOT EXISTS package_images (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                package_id BIGINT NOT NULL,
                image_url TEXT NOT NULL,
                sort_order INT NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_package_images_package ON package_images(package_id);
            CREATE TABLE IF NOT EXISTS package_tags (
                package_id BIGINT NOT NULL,
                category_id BIGINT NOT NULL,
                PRIMARY KEY (package_id, category_id),
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE CASCADE,
                FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_package_tags_category ON package_tags(category_id);
        "#,
    },
    Migration {
        version: 5,
        name: "create_leads",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS inquiries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_id INTEGER,
                full_name VARCHAR(255) NOT NULL,
                email VARCHAR(255) NOT NULL,
                phone VARCHAR(50),
                dates VARCHAR(255),
                guests INTEGER,
                budget REAL,
                notes TEXT,
                source VARCHAR(20) NOT NULL DEFAULT 'website',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_inquiries_created_at ON inquiries(created_at);
            CREATE TABLE IF NOT EXISTS quotes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_id INTEGER,
                inquiry_id INTEGER,
                price_total REAL NOT NULL,
                currency VARCHAR(3) NOT NULL DEFAULT 'MXN',
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                details TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE SET NULL,
                FOREIGN KEY (inquiry_id) REFERENCES inquiries(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_quotes_status ON quotes(status);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS inquiries (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                package_id BIGINT,
                full_name VARCHAR(255) NOT NULL,
                email VARCHAR(255) NOT NULL,
                phone VARCHAR(50),
                dates VARCHAR(255),
                guests INT,
                budget DOUBLE,
                notes TEXT,
                source VARCHAR(20) NOT NULL DEFAULT 'website',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_inquiries_created_at ON inquiries(created_at);
            CREATE TABLE IF NOT EXISTS quotes (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                package_id BIGINT,
                inquiry_id BIGINT,
                price_total DOUBLE NOT NULL,
                currency VARCHAR(3) NOT NULL DEFAULT 'MXN',
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                details TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE SET NULL,
                FOREIGN KEY (inquiry_id) REFERENCES inquiries(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_quotes_status ON quotes(status);
        "#,
    },
    Migration {
        version: 6,
        name: "create_bookings_payments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_id INTEGER,
                user_id INTEGER,
                checkin DATE NOT NULL,
                checkout DATE NOT NULL,
                guests INTEGER NOT NULL,
                amount REAL NOT NULL,
                currency VARCHAR(3) NOT NULL DEFAULT 'MXN',
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                metadata TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE SET NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_bookings_user_id ON bookings(user_id);
            CREATE INDEX IF NOT EXISTS idx_bookings_status ON bookings(status);
            CREATE TABLE IF NOT EXISTS payments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                booking_id INTEGER,
                stripe_payment_intent_id VARCHAR(255),
                stripe_session_id VARCHAR(255) UNIQUE,
                amount REAL NOT NULL,
                currency VARCHAR(3) NOT NULL DEFAULT 'MXN',
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                raw TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (booking_id) REFERENCES bookings(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_payments_booking_id ON payments(booking_id);
            CREATE INDEX IF NOT EXISTS idx_payments_intent ON payments(stripe_payment_intent_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS bookings (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                package_id BIGINT,
                user_id BIGINT,
                checkin DATE NOT NULL,
                checkout DATE NOT NULL,
                guests INT NOT NULL,
                amount DOUBLE NOT NULL,
                currency VARCHAR(3) NOT NULL DEFAULT 'MXN',
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                metadata TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (package_id) REFERENCES packages(id) ON DELETE SET NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE INDEX idx_bookings_user_id ON bookings(user_id);
            CREATE INDEX idx_bookings_status ON bookings(status);
            CREATE TABLE IF NOT EXISTS payments (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                booking_id BIGINT,
                stripe_payment_intent_id VARCHAR(255),
                stripe_session_id VARCHAR(255) UNIQUE,
                amount DOUBLE NOT NULL,
                currency VARCHAR(3) NOT NULL DEFAULT 'MXN',
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                raw MEDIUMTEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (booking_id) REFERENCES bookings(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_payments_booking_id ON payments(booking_id);
            CREATE INDEX idx_payments_intent ON payments(stripe_payment_intent_id);
        "#,
    },
    Migration {
        version: 7,
        name: "create_chat",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
                id VARCHAR(100) PRIMARY KEY,
                user_id INTEGER,
                channel VARCHAR(50),
                metadata TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE TABLE IF NOT EXISTS chat_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id VARCHAR(100) NOT NULL,
                sender VARCHAR(20) NOT NULL,
                message TEXT NOT NULL,
                metadata TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id, created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
                id VARCHAR(100) PRIMARY KEY,
                user_id BIGINT,
                channel VARCHAR(50),
                metadata TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
            );
            CREATE TABLE IF NOT EXISTS chat_messages (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                session_id VARCHAR(100) NOT NULL,
                sender VARCHAR(20) NOT NULL,
                message TEXT NOT NULL,
                metadata TEXT,
                created_at TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6),
                FOREIGN KEY (session_id) REFERENCES chat_sessions(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_chat_messages_session ON chat_messages(session_id, created_at);
        "#,
    },
];

/// Apply all pending migrations, returning how many ran
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = applied_versions(pool).await?;
    let mut count = 0;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Whether every embedded migration has been applied
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Number of embedded migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = applied_versions(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count())
}

pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.backend() {
        Backend::Sqlite(_) => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        Backend::Mysql(_) => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn applied_versions(pool: &DynDatabasePool) -> Result<Vec<i32>> {
    const SQL: &str = "SELECT version FROM _migrations ORDER BY version";

    let versions = match pool.backend() {
        Backend::Sqlite(p) => sqlx::query(SQL)
            .fetch_all(p)
            .await?
            .iter()
            .map(|row| row.get::<i64, _>("version") as i32)
            .collect(),
        Backend::Mysql(p) => sqlx::query(SQL)
            .fetch_all(p)
            .await?
            .iter()
            .map(|row| row.get::<i32, _>("version"))
            .collect(),
    };

    Ok(versions)
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    const RECORD: &str = "INSERT INTO _migrations (version, name) VALUES (?, ?)";

    match pool.backend() {
        Backend::Sqlite(p) => {
            for statement in split_sql_statements(migration.up_sqlite) {
                sqlx::query(statement)
                    .execute(p)
                    .await
                    .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
            }
            sqlx::query(RECORD)
                .bind(migration.version)
                .bind(migration.name)
                .execute(p)
                .await?;
        }
        Backend::Mysql(p) => {
            for statement in split_sql_statements(migration.up_mysql) {
                sqlx::query(statement)
                    .execute(p)
                    .await
                    .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
            }
            sqlx::query(RECORD)
                .bind(migration.version)
                .bind(migration.name)
                .execute(p)
                .await?;
        }
    }

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split a migration script on `;`, dropping blank and comment-only pieces
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}
