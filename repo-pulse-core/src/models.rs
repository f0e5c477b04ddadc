//! Repository and commit-author data model.
//!
//! Translated from `original_source/2/src/models.py`'s `Repository` /
//! `RepositoryAuthorCommitsNum` dataclasses: same fields, same
//! `from_api`/`add_commits` behavior, same "Unknown" language default.

use serde::Deserialize;

/// Commits by a single author against one repository, for the current day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryAuthorCommits {
    pub author: String,
    pub commits: u64,
}

impl RepositoryAuthorCommits {
    pub fn new(author: impl Into<String>, commits: u64) -> Self {
        RepositoryAuthorCommits {
            author: author.into(),
            commits,
        }
    }
}

/// A single item of the GitHub search-repositories response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiRepository {
    pub name: String,
    pub owner: ApiOwner,
    pub stargazers_count: u64,
    pub watchers_count: u64,
    pub forks_count: u64,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiOwner {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchRepositoriesResponse {
    #[serde(default)]
    pub items: Vec<ApiRepository>,
}

/// A single item of the GitHub list-commits response; only the author
/// name is consumed (`commit.author.name`), matching the upstream's
/// narrow projection.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiCommit {
    #[serde(default = "unknown_sha")]
    pub sha: String,
    pub commit: ApiCommitDetail,
}

fn unknown_sha() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCommitDetail {
    pub author: Option<ApiCommitAuthor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiCommitAuthor {
    pub name: Option<String>,
}

/// A repository snapshot: search-result metadata plus today's per-author
/// commit counts and the repository's rank position within the search
/// page it was parsed from.
///
/// Identity is `(owner, name)`. Constructed via [`Repository::from_api`],
/// enriched once via [`Repository::add_commits`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub name: String,
    pub owner: String,
    /// Index within the search-result page this repository was parsed
    /// from (not a global rank — see the §9 open question in SPEC_FULL.md,
    /// preserved verbatim from the upstream implementation).
    pub position: u32,
    pub stars: u64,
    pub watchers: u64,
    pub forks: u64,
    pub language: String,
    pub authors_commits_today: Vec<RepositoryAuthorCommits>,
}

impl Repository {
    pub(crate) fn from_api(api: ApiRepository, position: u32) -> Self {
        Repository {
            name: api.name,
            owner: api.owner.login,
            position,
            stars: api.stargazers_count,
            watchers: api.watchers_count,
            forks: api.forks_count,
            language: api.language.unwrap_or_else(|| "Unknown".to_string()),
            authors_commits_today: Vec::new(),
        }
    }

    /// Merge a batch of per-author commit counts into this repository's
    /// running total, summing counts for authors already present.
    /// Associative, commutative over author sums, and a no-op when `commits`
    /// is empty.
    pub fn add_commits(&mut self, commits: Vec<RepositoryAuthorCommits>) {
        if self.authors_commits_today.is_empty() {
            self.authors_commits_today = commits;
            return;
        }
        for commit in commits {
            if let Some(existing) = self
                .authors_commits_today
                .iter_mut()
                .find(|x| x.author == commit.author)
            {
                existing.commits += commit.commits;
            } else {
                self.authors_commits_today.push(commit);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> Repository {
        Repository {
            name: "repo".to_string(),
            owner: "owner".to_string(),
            position: 0,
            stars: 10,
            watchers: 5,
            forks: 1,
            language: "Rust".to_string(),
            authors_commits_today: Vec::new(),
        }
    }

    #[test]
    fn add_commits_on_empty_is_no_op_for_empty_input() {
        let mut r = repo();
        r.add_commits(Vec::new());
        assert!(r.authors_commits_today.is_empty());
    }

    #[test]
    fn add_commits_sets_list_when_empty() {
        let mut r = repo();
        r.add_commits(vec![RepositoryAuthorCommits::new("alice", 3)]);
        assert_eq!(r.authors_commits_today, vec![RepositoryAuthorCommits::new("alice", 3)]);
    }

    #[test]
    fn add_commits_merges_by_summing_existing_authors() {
        let mut r = repo();
        r.add_commits(vec![
            RepositoryAuthorCommits::new("alice", 3),
            RepositoryAuthorCommits::new("bob", 2),
        ]);
        r.add_commits(vec![RepositoryAuthorCommits::new("alice", 4)]);

        let alice = r
            .authors_commits_today
            .iter()
            .find(|x| x.author == "alice")
            .unwrap();
        assert_eq!(alice.commits, 7);
        assert_eq!(r.authors_commits_today.len(), 2);
    }

    #[test]
    fn add_commits_appends_new_authors() {
        let mut r = repo();
        r.add_commits(vec![RepositoryAuthorCommits::new("alice", 3)]);
        r.add_commits(vec![RepositoryAuthorCommits::new("bob", 5)]);
        assert_eq!(r.authors_commits_today.len(), 2);
    }

    #[test]
    fn add_commits_is_commutative_over_author_sums() {
        let mut a = repo();
        a.add_commits(vec![
            RepositoryAuthorCommits::new("alice", 3),
            RepositoryAuthorCommits::new("bob", 2),
        ]);
        a.add_commits(vec![RepositoryAuthorCommits::new("alice", 1)]);

        let mut b = repo();
        b.add_commits(vec![RepositoryAuthorCommits::new("alice", 1)]);
        b.add_commits(vec![
            RepositoryAuthorCommits::new("alice", 3),
            RepositoryAuthorCommits::new("bob", 2),
        ]);

        let sum = |r: &Repository, author: &str| {
            r.authors_commits_today
                .iter()
                .find(|x| x.author == author)
                .map(|x| x.commits)
                .unwrap_or(0)
        };
        assert_eq!(sum(&a, "alice"), sum(&b, "alice"));
        assert_eq!(sum(&a, "bob"), sum(&b, "bob"));
    }

    #[test]
    fn language_defaults_to_unknown() {
        let api = ApiRepository {
            name: "x".to_string(),
            owner: ApiOwner {
                login: "o".to_string(),
            },
            stargazers_count: 1,
            watchers_count: 0,
            forks_count: 0,
            language: None,
        };
        let r = Repository::from_api(api, 2);
        assert_eq!(r.language, "Unknown");
        assert_eq!(r.position, 2);
    }
}
