//! Repository permission lookups for command authors.
//!
//! Handlers use [`get_user_permission`] to gate commands on the author's
//! access to the repository, e.g. only letting writers run `@app deploy`.
//! Answers are kept in a bounded LRU cache, so a busy comment thread does
//! not cost one API call per command.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex, PoisonError};

use lru::LruCache;
use thiserror::Error;
use tracing::{debug, warn};

use crate::github::GitHubApi;
use crate::types::RepoId;

/// Entries kept by [`PermissionCache::default`].
pub const DEFAULT_CAPACITY: usize = 128;

/// A user's access level on a repository, from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    None,
    Read,
    Triage,
    Write,
    Maintain,
    Admin,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::None => "none",
            Permission::Read => "read",
            Permission::Triage => "triage",
            Permission::Write => "write",
            Permission::Maintain => "maintain",
            Permission::Admin => "admin",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown permission level: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    /// Case-insensitive, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Permission::None),
            "read" => Ok(Permission::Read),
            "triage" => Ok(Permission::Triage),
            "write" => Ok(Permission::Write),
            "maintain" => Ok(Permission::Maintain),
            "admin" => Ok(Permission::Admin),
            _ => Err(UnknownPermission(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    owner: String,
    repo: String,
    login: String,
}

/// Remembers looked-up permissions per (owner, repo, user).
///
/// The lock is only held while reading or writing an entry, never across an
/// API call, so two tasks asking about the same user at once may both fetch.
pub struct PermissionCache {
    entries: Mutex<LruCache<CacheKey, Permission>>,
}

impl PermissionCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        PermissionCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Returns `login`'s permission on `repo`, asking the API on a cache miss.
    ///
    /// Collaborators get the level GitHub reports. A user GitHub does not
    /// know as a collaborator (HTTP 404) can still read a public repository,
    /// so that case falls back to the repository's visibility. Any other
    /// failure yields [`Permission::None`]. Every answer is cached,
    /// including failures.
    pub async fn user_permission<A>(&self, api: &A, repo: &RepoId, login: &str) -> Permission
    where
        A: GitHubApi,
    {
        let key = CacheKey {
            owner: repo.owner.clone(),
            repo: repo.repo.clone(),
            login: login.to_string(),
        };

        let cached = self.entries().get(&key).copied();
        if let Some(permission) = cached {
            return permission;
        }

        let permission = fetch_permission(api, repo, login).await;
        debug!(%repo, login, %permission, "Fetched user permission");
        self.entries().put(key, permission);
        permission
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, Permission>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        PermissionCache::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}

impl fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

static SHARED_CACHE: LazyLock<PermissionCache> = LazyLock::new(PermissionCache::default);

/// Looks up `login`'s permission on `repo` through the process-wide cache.
///
/// See [`PermissionCache::user_permission`] for how the answer is derived.
pub async fn get_user_permission<A>(api: &A, repo: &RepoId, login: &str) -> Permission
where
    A: GitHubApi,
{
    SHARED_CACHE.user_permission(api, repo, login).await
}

async fn fetch_permission<A>(api: &A, repo: &RepoId, login: &str) -> Permission
where
    A: GitHubApi,
{
    let route = format!(
        "/repos/{}/{}/collaborators/{}/permission",
        repo.owner, repo.repo, login
    );
    match api.get(&route).await {
        Ok(body) => {
            let level = body
                .get("permission")
                .and_then(|p| p.as_str())
                .unwrap_or("none");
            level.parse().unwrap_or_else(|e: UnknownPermission| {
                warn!(%repo, login, error = %e, "Treating unknown permission as none");
                Permission::None
            })
        }
        Err(e) if e.status_code == Some(404) => public_read(api, repo).await,
        Err(e) => {
            warn!(%repo, login, error = %e, "Permission lookup failed");
            Permission::None
        }
    }
}

/// Read access for everyone on public repositories. A repository whose
/// visibility cannot be determined is treated as private.
async fn public_read<A>(api: &A, repo: &RepoId) -> Permission
where
    A: GitHubApi,
{
    let route = format!("/repos/{}/{}", repo.owner, repo.repo);
    match api.get(&route).await {
        Ok(body) if body.get("private").and_then(|p| p.as_bool()) == Some(false) => {
            Permission::Read
        }
        Ok(_) => Permission::None,
        Err(e) => {
            warn!(%repo, error = %e, "Repository lookup failed");
            Permission::None
        }
    }
}
