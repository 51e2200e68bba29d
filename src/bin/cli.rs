use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use officesync::audit::{verify_chain, AuditRecorder, LogAction, LogCategory, LogTarget, NewLogEntry};
use officesync::authz::STANDARD_ROLE;
use officesync::db;
use officesync::utils::is_hex_color;

#[derive(Parser, Debug)]
#[command(author, version, about = "OfficeSync operator tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Create or extend a role and optionally move a user into it
    Grant {
        /// Role name; created if it does not exist yet
        #[arg(long)]
        role: String,
        /// Permission to add (repeatable)
        #[arg(long = "permission", short = 'p')]
        permissions: Vec<String>,
        /// Add the whole permission catalog
        #[arg(long)]
        all: bool,
        /// Username to assign to the role
        #[arg(long)]
        user: Option<String>,
        /// Color for a newly created role, as #RRGGBB
        #[arg(long, default_value = "#0d6efd", value_parser = parse_role_color)]
        color: String,
    },
    /// Publish an announcement to every user
    Announce {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
    },
    /// Issue an unconfirmed payslip to a user
    PaySalary {
        /// Username receiving the payslip
        #[arg(long)]
        user: String,
        /// Pay period as YYYY-MM
        #[arg(long, value_parser = parse_period)]
        period: String,
        /// Gross amount in cents
        #[arg(long)]
        gross: i64,
        /// Net amount in cents
        #[arg(long)]
        net: i64,
    },
    /// Recompute the audit log hash chain
    VerifyLogs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator
                .undo(&pool, 1)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::Grant {
            role,
            permissions,
            all,
            user,
            color,
        } => {
            let pool = db::init().await?;
            grant(&pool, &role, &permissions, all, user.as_deref(), &color).await?;
        }
        Commands::Announce { title, body } => {
            let pool = db::init().await?;
            let id = announce(&pool, &title, &body).await?;
            println!("Published announcement {}", id);
        }
        Commands::PaySalary {
            user,
            period,
            gross,
            net,
        } => {
            let pool = db::init().await?;
            let id = pay_salary(&pool, &user, &period, gross, net).await?;
            println!("Issued payslip {} for {} ({})", id, user, period);
        }
        Commands::VerifyLogs => {
            let pool = db::init().await?;
            let report = verify_chain(&pool).await?;
            match report.broken_at {
                None => println!("Audit log intact ({} entries)", report.entries),
                Some(seq) => anyhow::bail!("audit log broken at entry {} of {}", seq, report.entries),
            }
        }
    }

    Ok(())
}

async fn grant(
    pool: &SqlitePool,
    role: &str,
    permissions: &[String],
    all: bool,
    user: Option<&str>,
    color: &str,
) -> anyhow::Result<()> {
    let recorder = AuditRecorder::new(pool.clone());
    let now = Utc::now().to_rfc3339();

    let existing: Option<String> = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(role)
        .fetch_optional(pool)
        .await?;

    let role_id = match existing {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            sqlx::query("INSERT INTO roles (id, name, color, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
                .bind(&id)
                .bind(role)
                .bind(color)
                .bind(&now)
                .bind(&now)
                .execute(pool)
                .await?;
            recorder
                .append(NewLogEntry::system(
                    LogAction::Create,
                    LogCategory::Administration,
                    format!("system created the role {}.", role),
                ))
                .await?;
            println!("Created role {}", role);
            id
        }
    };

    let wanted: Vec<(String, String)> = if all {
        sqlx::query_as("SELECT id, name FROM permissions").fetch_all(pool).await?
    } else {
        let mut found = Vec::with_capacity(permissions.len());
        for name in permissions {
            let id: Option<String> = sqlx::query_scalar("SELECT id FROM permissions WHERE name = ?")
                .bind(name)
                .fetch_optional(pool)
                .await?;
            let id = id.with_context(|| format!("unknown permission {}", name))?;
            found.push((id, name.clone()));
        }
        found
    };

    let mut added = 0u64;
    for (permission_id, _) in &wanted {
        added += sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(&role_id)
            .bind(permission_id)
            .execute(pool)
            .await?
            .rows_affected();
    }
    if added > 0 {
        recorder
            .append(NewLogEntry::system(
                LogAction::Update,
                LogCategory::Administration,
                format!("system changed the permissions of '{}'.", role),
            ))
            .await?;
    }
    println!("Granted {} new permission(s) to {}", added, role);

    if let Some(username) = user {
        let moved = sqlx::query(
            "UPDATE profiles SET role_id = ? WHERE user_id = (SELECT id FROM users WHERE username = ?) AND role_id != ?",
        )
        .bind(&role_id)
        .bind(username)
        .bind(&role_id)
        .execute(pool)
        .await?
        .rows_affected();

        if moved == 0 {
            let known: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM users WHERE username = ?")
                .bind(username)
                .fetch_one(pool)
                .await?;
            anyhow::ensure!(known > 0, "unknown user {}", username);
        } else {
            recorder
                .append(NewLogEntry::system(
                    LogAction::Update,
                    LogCategory::Administration,
                    format!("system moved @{} to '{}'.", username, role),
                ))
                .await?;
        }
        println!("@{} now has role {}", username, role);
    }

    if role == STANDARD_ROLE && !wanted.is_empty() {
        println!("note: every user without another role now holds these permissions");
    }

    Ok(())
}

async fn announce(pool: &SqlitePool, title: &str, body: &str) -> anyhow::Result<Uuid> {
    anyhow::ensure!(!title.trim().is_empty(), "title must not be empty");

    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO announcements (id, title, body, author_id, created_at) VALUES (?, ?, ?, NULL, ?)")
        .bind(id.to_string())
        .bind(title.trim())
        .bind(body)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;

    AuditRecorder::new(pool.clone())
        .append(NewLogEntry::system(
            LogAction::Create,
            LogCategory::Communication,
            format!("system published the announcement '{}'.", title.trim()),
        ))
        .await?;

    Ok(id)
}

async fn pay_salary(pool: &SqlitePool, username: &str, period: &str, gross: i64, net: i64) -> anyhow::Result<Uuid> {
    anyhow::ensure!(net >= 0 && gross >= net, "amounts must satisfy 0 <= net <= gross");

    let user_id: String = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("unknown user '{}'", username))?;

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO salaries (id, user_id, period, gross_cents, net_cents, confirmed, created_at) VALUES (?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(id.to_string())
    .bind(&user_id)
    .bind(period)
    .bind(gross)
    .bind(net)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    AuditRecorder::new(pool.clone())
        .append(
            NewLogEntry::system(
                LogAction::Create,
                LogCategory::Management,
                format!("system issued the {} payslip for {}.", period, username),
            )
            .about(&LogTarget::Salary(id)),
        )
        .await?;

    Ok(id)
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let has_table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if has_table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let version = migration.version;
        let status = if applied_versions.contains(&version) { "applied" } else { "pending" };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, version, name);
    }

    Ok(())
}

fn parse_period(raw: &str) -> Result<String, String> {
    let period = raw.trim();
    let valid = period.len() == 7 && chrono::NaiveDate::parse_from_str(&format!("{}-01", period), "%Y-%m-%d").is_ok();
    if valid {
        Ok(period.to_string())
    } else {
        Err(format!("`{}` is not a YYYY-MM period", raw))
    }
}

/// Stored lowercase, the way the role form stores it.
fn parse_role_color(raw: &str) -> Result<String, String> {
    let color = raw.trim().to_lowercase();
    if is_hex_color(&color) {
        Ok(color)
    } else {
        Err(format!("`{}` is not a #RRGGBB color", raw))
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Try local ./migrations first (when running from repo root), then the
    // crate-local folder.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_color_is_validated_and_lowercased() {
        assert_eq!(parse_role_color("#0D6EFD").unwrap(), "#0d6efd");
        assert!(parse_role_color("blue").is_err());
        assert!(parse_role_color("#12345").is_err());
    }

    #[test]
    fn salary_period_is_year_and_month() {
        assert_eq!(parse_period("2025-01").unwrap(), "2025-01");
        assert!(parse_period("2025-13").is_err());
        assert!(parse_period("January").is_err());
        assert!(parse_period("2025-1").is_err());
    }

    #[test]
    fn grant_rejects_a_bad_color() {
        let parsed = Cli::try_parse_from(["officesync-cli", "grant", "--role", "Ops", "--color", "#GGGGGG"]);
        assert!(parsed.is_err());

        let parsed = Cli::try_parse_from(["officesync-cli", "grant", "--role", "Ops", "--color", "#ABCDEF"]).unwrap();
        match parsed.command {
            Commands::Grant { color, .. } => assert_eq!(color, "#abcdef"),
            _ => panic!("expected grant"),
        }
    }
}
