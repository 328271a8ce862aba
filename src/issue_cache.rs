//! Issue list snapshots persisted in the platform cache directory.
//!
//! Each snapshot file is named after a SHA-256 fingerprint of the connection
//! parameters, so the API key is never written to disk in clear.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use redmine_api::RawIssue;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const SNAPSHOT_PREFIX: &str = "issues-";
const SNAPSHOT_SUFFIX: &str = ".json";

/// Identifies the server and account an issue list was fetched with.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionKey {
    pub base_url: String,
    pub api_key: String,
    pub include_closed: bool,
}

impl ConnectionKey {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, include_closed: bool) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            include_closed,
        }
    }

    /// Lowercase hex SHA-256 over every field of the key.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.base_url.as_bytes());
        hasher.update([0]);
        hasher.update(self.api_key.as_bytes());
        hasher.update([u8::from(self.include_closed)]);
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot<I> {
    base_url: String,
    include_closed: bool,
    /// Unix seconds.
    fetched_at: i64,
    issues: I,
}

/// File-backed store for fetched issue lists. Snapshots older than
/// `max_age` miss; a zero `max_age` disables the cache entirely.
#[derive(Clone, Debug)]
pub struct IssueCache {
    dir: PathBuf,
    max_age: Duration,
}

impl IssueCache {
    /// Creates a cache in the platform-specific cache directory.
    pub fn new(max_age: Duration) -> Result<Self, String> {
        let dirs = directories::ProjectDirs::from("org", "redmine-report", "redmine-report")
            .ok_or_else(|| "could not determine cache directory".to_string())?;
        Ok(Self::with_dir(dirs.cache_dir(), max_age))
    }

    pub fn with_dir(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    fn snapshot_path(&self, key: &ConnectionKey) -> PathBuf {
        self.dir
            .join(format!("{SNAPSHOT_PREFIX}{}{SNAPSHOT_SUFFIX}", key.fingerprint()))
    }

    /// Writes the snapshot for `key`, replacing any earlier one.
    pub fn store(&self, key: &ConnectionKey, issues: &[RawIssue]) -> Result<(), io::Error> {
        if self.max_age.is_zero() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        let snapshot = Snapshot {
            base_url: key.base_url.clone(),
            include_closed: key.include_closed,
            fetched_at: Utc::now().timestamp(),
            issues,
        };
        let content = serde_json::to_vec(&snapshot)?;
        fs::write(self.snapshot_path(key), content)
    }

    /// Returns the snapshot fetched with `key` while it is still fresh.
    pub fn get(&self, key: &ConnectionKey) -> Option<Vec<RawIssue>> {
        if self.max_age.is_zero() {
            return None;
        }
        let path = self.snapshot_path(key);
        let content = fs::read(&path).ok()?;
        let snapshot: Snapshot<Vec<RawIssue>> = match serde_json::from_slice(&content) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("ignoring unreadable issue cache {}: {err}", path.display());
                return None;
            }
        };
        if snapshot.base_url != key.base_url || snapshot.include_closed != key.include_closed {
            return None;
        }
        let age = Utc::now().timestamp().saturating_sub(snapshot.fetched_at);
        let fresh = u64::try_from(age).is_ok_and(|age| age <= self.max_age.as_secs());
        fresh.then_some(snapshot.issues)
    }

    /// Deletes every stored snapshot, whatever key it was fetched with.
    pub fn invalidate(&self) -> Result<(), io::Error> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };
        for entry in entries {
            let path = entry?.path();
            let is_snapshot = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(SNAPSHOT_SUFFIX));
            if is_snapshot {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConnectionKey, IssueCache, Snapshot};
    use chrono::Utc;
    use redmine_api::RawIssue;
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    const TTL: Duration = Duration::from_secs(600);

    fn unique_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        env::temp_dir().join(format!("redmine-report-cache-tests-{name}-{nanos}"))
    }

    fn issue(id: i64) -> RawIssue {
        RawIssue {
            id: Some(id),
            subject: Some(format!("Issue {id}")),
            ..RawIssue::default()
        }
    }

    #[test]
    fn second_instance_is_served_from_disk() {
        let dir = unique_dir("second");
        let key = ConnectionKey::new("https://redmine.example.com/", "secret", false);
        IssueCache::with_dir(&dir, TTL)
            .store(&key, &[issue(1), issue(2)])
            .expect("store should succeed");

        let later = IssueCache::with_dir(&dir, TTL);
        assert_eq!(later.get(&key), Some(vec![issue(1), issue(2)]));
        assert_eq!(
            later.get(&ConnectionKey::new("https://redmine.example.com", "secret", false)),
            Some(vec![issue(1), issue(2)])
        );

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn get_hits_only_for_matching_key() {
        let dir = unique_dir("keys");
        let cache = IssueCache::with_dir(&dir, TTL);
        let key = ConnectionKey::new("https://redmine.example.com", "secret", false);
        cache.store(&key, &[issue(1)]).unwrap();

        assert!(cache.get(&ConnectionKey::new("https://other.example.com", "secret", false)).is_none());
        assert!(cache.get(&ConnectionKey::new("https://redmine.example.com", "other", false)).is_none());
        assert!(cache.get(&ConnectionKey::new("https://redmine.example.com", "secret", true)).is_none());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn snapshot_file_never_contains_the_api_key() {
        let dir = unique_dir("secret");
        let cache = IssueCache::with_dir(&dir, TTL);
        let key = ConnectionKey::new("https://redmine.example.com", "very-secret-api-key", false);
        cache.store(&key, &[issue(1)]).unwrap();

        let files: Vec<_> = fs::read_dir(&dir).unwrap().map(|entry| entry.unwrap().path()).collect();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(name, format!("issues-{}.json", key.fingerprint()));
        let content = fs::read_to_string(&files[0]).unwrap();
        assert!(!content.contains("very-secret-api-key"));
        assert!(!name.contains("very-secret-api-key"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn stale_snapshot_misses() {
        let dir = unique_dir("stale");
        let key = ConnectionKey::new("https://redmine.example.com", "secret", false);
        let cache = IssueCache::with_dir(&dir, TTL);
        cache.store(&key, &[issue(1)]).unwrap();
        let stale = Snapshot {
            base_url: key.base_url.clone(),
            include_closed: false,
            fetched_at: Utc::now().timestamp() - 3600,
            issues: vec![issue(1)],
        };
        fs::write(cache.snapshot_path(&key), serde_json::to_vec(&stale).unwrap()).unwrap();

        assert!(cache.get(&key).is_none());
        assert_eq!(IssueCache::with_dir(&dir, Duration::from_secs(7200)).get(&key), Some(vec![issue(1)]));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn zero_max_age_disables_the_cache() {
        let dir = unique_dir("disabled");
        let cache = IssueCache::with_dir(&dir, Duration::ZERO);
        let key = ConnectionKey::new("https://redmine.example.com", "secret", false);
        cache.store(&key, &[issue(1)]).unwrap();

        assert!(cache.get(&key).is_none());
        assert!(!dir.exists());
    }

    #[test]
    fn invalidate_removes_every_snapshot() {
        let dir = unique_dir("invalidate");
        let cache = IssueCache::with_dir(&dir, TTL);
        let first = ConnectionKey::new("https://a.example.com", "k", false);
        let second = ConnectionKey::new("https://b.example.com", "k", true);
        cache.store(&first, &[issue(1)]).unwrap();
        cache.store(&second, &[issue(9)]).unwrap();
        fs::write(dir.join("unrelated.txt"), "keep").unwrap();

        IssueCache::with_dir(&dir, TTL).invalidate().unwrap();

        assert!(cache.get(&first).is_none());
        assert!(cache.get(&second).is_none());
        assert!(dir.join("unrelated.txt").exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn invalidate_without_cache_dir_is_ok() {
        let cache = IssueCache::with_dir(unique_dir("absent"), TTL);
        assert!(cache.invalidate().is_ok());
    }
}
