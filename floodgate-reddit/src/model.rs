//! Wire shapes for the handful of listing endpoints the daemon touches.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ListingData<T> {
    #[serde(default)]
    pub children: Vec<Thing<T>>,
}

#[derive(Debug, Deserialize)]
pub struct Thing<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct SubmissionData {
    pub id: String,
    /// Absent when the account has since been deleted.
    #[serde(default)]
    pub author: Option<String>,
    /// Reddit reports creation time as a float of unix seconds.
    pub created_utc: f64,
}

#[derive(Debug, Deserialize)]
pub struct MessageData {
    /// Fullname of the message (`t4_…`), used to reply and mark read.
    pub name: String,
    #[serde(default)]
    pub author: Option<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct WikiPageData {
    pub content_md: String,
}

/// The moderator roster; unlike other listings its children are bare
/// entries, not kind/data-wrapped things.
#[derive(Debug, Deserialize)]
pub struct UserList {
    pub data: UserListData,
}

#[derive(Debug, Deserialize)]
pub struct UserListData {
    #[serde(default)]
    pub children: Vec<Moderator>,
}

/// One entry of the subreddit moderator roster.
#[derive(Debug, Clone, Deserialize)]
pub struct Moderator {
    pub name: String,
    #[serde(default)]
    pub mod_permissions: Vec<String>,
}

impl Moderator {
    /// Whether this moderator may act on posts (the `all` grant implies it).
    pub fn can_manage_posts(&self) -> bool {
        self.mod_permissions
            .iter()
            .any(|perm| perm == "all" || perm == "posts")
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::Moderator;

    #[test]
    fn posts_permission_is_implied_by_all() {
        let full = Moderator {
            name: "modbot".to_owned(),
            mod_permissions: vec!["all".to_owned()],
        };
        let scoped = Moderator {
            name: "helper".to_owned(),
            mod_permissions: vec!["mail".to_owned(), "posts".to_owned()],
        };
        let limited = Moderator {
            name: "greeter".to_owned(),
            mod_permissions: vec!["wiki".to_owned()],
        };

        assert!(full.can_manage_posts());
        assert!(scoped.can_manage_posts());
        assert!(!limited.can_manage_posts());
    }
}
