use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;

use crate::reddit::{self, VoteState};

pub trait CommentService: Send + Sync {
    fn load_comments(&self, permalink: &str) -> Result<reddit::Listing<reddit::Comment>>;
}

pub trait VoteService: Send + Sync {
    fn vote(&self, thing_id: &str, state: VoteState) -> Result<()>;
}

pub struct RedditCommentService {
    client: Arc<reddit::Client>,
}

impl RedditCommentService {
    pub fn new(client: Arc<reddit::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for RedditCommentService {
    fn load_comments(&self, permalink: &str) -> Result<reddit::Listing<reddit::Comment>> {
        self.client
            .comments(permalink)
            .context("fetch comments")
    }
}

pub struct RedditVoteService {
    client: Arc<reddit::Client>,
}

impl RedditVoteService {
    pub fn new(client: Arc<reddit::Client>) -> Self {
        Self { client }
    }
}

impl VoteService for RedditVoteService {
    fn vote(&self, thing_id: &str, state: VoteState) -> Result<()> {
        self.client
            .vote(thing_id, state)
            .with_context(|| format!("vote {} on {}", state.as_str(), thing_id))
    }
}

/// Serves canned listings keyed by permalink; unknown permalinks fail.
#[derive(Default)]
pub struct MockCommentService {
    listings: Mutex<HashMap<String, reddit::Listing<reddit::Comment>>>,
}

impl MockCommentService {
    pub fn with_listing(permalink: &str, listing: reddit::Listing<reddit::Comment>) -> Self {
        let service = Self::default();
        service.insert(permalink, listing);
        service
    }

    pub fn insert(&self, permalink: &str, listing: reddit::Listing<reddit::Comment>) {
        self.listings.lock().insert(permalink.to_string(), listing);
    }
}

impl CommentService for MockCommentService {
    fn load_comments(&self, permalink: &str) -> Result<reddit::Listing<reddit::Comment>> {
        self.listings
            .lock()
            .get(permalink)
            .cloned()
            .ok_or_else(|| anyhow!("mock: no comments for {permalink}"))
    }
}

/// Records every vote; fails when told to.
#[derive(Default)]
pub struct MockVoteService {
    calls: Mutex<Vec<(String, VoteState)>>,
    fail: Mutex<bool>,
}

impl MockVoteService {
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn calls(&self) -> Vec<(String, VoteState)> {
        self.calls.lock().clone()
    }
}

impl VoteService for MockVoteService {
    fn vote(&self, thing_id: &str, state: VoteState) -> Result<()> {
        self.calls.lock().push((thing_id.to_string(), state));
        if *self.fail.lock() {
            Err(anyhow!("mock: vote rejected"))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reddit_vote_needs_csrf_cookie() {
        let jar = Arc::new(reddit::CookieJar::new(Some("session=abc".to_string())));
        let client = reddit::Client::new(jar, reddit::ClientConfig::default()).unwrap();
        let service = RedditVoteService::new(Arc::new(client));
        let err = service.vote("t1_abc", VoteState::Up).unwrap_err();
        assert!(format!("{err:#}").contains("csrf token cookie missing"));
        assert!(err.to_string().contains("vote UP on t1_abc"));
    }

    #[test]
    fn mock_vote_records_calls() {
        let service = MockVoteService::default();
        service.vote("t1_a", VoteState::Down).unwrap();
        service.set_failing(true);
        assert!(service.vote("t3_b", VoteState::None).is_err());
        assert_eq!(
            service.calls(),
            vec![
                ("t1_a".to_string(), VoteState::Down),
                ("t3_b".to_string(), VoteState::None),
            ]
        );
    }

    #[test]
    fn mock_comments_unknown_permalink_fails() {
        let service = MockCommentService::with_listing("/r/a/", reddit::Listing::default());
        assert!(service.load_comments("/r/a/").is_ok());
        assert!(service.load_comments("/r/b/").is_err());
    }
}
