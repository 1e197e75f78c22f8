//! Per-database instance lock.
//!
//! Two servers writing the same sqlite file would race each other's
//! sequence reservations, so each instance holds an exclusive lock derived
//! from its `database_url`. Instances pointed at different databases get
//! different lock files and coexist; a second instance on the same database
//! fails fast at start-up.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// A lock guard that releases the lock when dropped
pub struct LockGuard {
    _file: File,
}

/// Lock file name for one database: a readable slug of the database path
/// plus a hash of the full path, so distinct paths never share a lock even
/// when their slugs collide.
fn lock_name(database_url: &str) -> String {
    let path = database_url.trim_start_matches("sqlite://");
    let path = path.split('?').next().unwrap_or(path);

    let slug: String = path
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(50)
        .collect();

    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);

    format!("{}-{:016x}.lock", slug, hasher.finish())
}

fn lock_path(database_url: &str) -> Result<PathBuf> {
    let runtime_dir = dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not determine runtime directory"))?;

    let dir = runtime_dir.join("rel8-sync");
    fs::create_dir_all(&dir)?;

    Ok(dir.join(lock_name(database_url)))
}

/// Acquire the exclusive lock for this database, failing if another
/// instance already holds it
pub fn acquire_lock(database_url: &str) -> Result<LockGuard> {
    let path = lock_path(database_url)?;
    let file = File::create(&path).context("Failed to create lock file")?;

    file.try_lock_exclusive().map_err(|_| {
        anyhow::anyhow!(
            "Another rel8-sync instance is already using this database.\n\
            If you believe this is an error, remove: {}",
            path.display()
        )
    })?;

    Ok(LockGuard { _file: file })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_name_strips_scheme_and_params() {
        let name = lock_name("sqlite://data/rel8-sync.db?mode=rwc");
        assert!(name.starts_with("data-rel8-sync-db-"), "{}", name);
        assert!(name.ends_with(".lock"));
        // Query params do not change the lock identity
        assert_eq!(name, lock_name("sqlite://data/rel8-sync.db"));
    }

    #[test]
    fn test_distinct_databases_get_distinct_locks() {
        assert_ne!(lock_name("sqlite://a.db"), lock_name("sqlite://b.db"));
        // Same slug after sanitizing, still distinguished by the hash
        assert_ne!(lock_name("sqlite://a/x.db"), lock_name("sqlite://a-x.db"));
    }

    #[test]
    fn test_second_instance_on_same_database_fails() {
        let held = acquire_lock("sqlite://same-instance-test.db").expect("first lock");
        let second = acquire_lock("sqlite://same-instance-test.db");
        assert!(second.is_err(), "same database must not be shared");
        drop(held);
    }

    #[test]
    fn test_different_databases_coexist() {
        let a = acquire_lock("sqlite://coexist-a.db").expect("lock a");
        let b = acquire_lock("sqlite://coexist-b.db");
        assert!(b.is_ok(), "disjoint databases must not contend");
        drop(a);
    }
}
