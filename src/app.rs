use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use log::debug;

use crate::config::{self, Config};
use crate::data::{self, CommentService, VoteService};
use crate::feed::{FeedIntegration, ViewContent};
use crate::markup;
use crate::page::{ActionRow, Page, PostId};
use crate::reddit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewFormat {
    Html,
    Outline,
}

pub struct Services {
    pub comments: Arc<dyn CommentService>,
    pub votes: Arc<dyn VoteService>,
}

pub fn load_config() -> Result<Config> {
    config::load(config::LoadOptions::default()).context("load config")
}

pub fn connect(cfg: &Config) -> Result<Services> {
    let cookie = Some(cfg.reddit.cookie.clone());
    let jar: Arc<dyn reddit::CookieSource> = Arc::new(reddit::CookieJar::new(cookie));
    let client = reddit::Client::new(
        jar,
        reddit::ClientConfig {
            user_agent: cfg.reddit.user_agent.clone(),
            origin: Some(cfg.reddit.origin.clone()),
            graphql_path: Some(cfg.reddit.graphql_path.clone()),
            timeout: cfg.reddit.timeout,
            http_client: None,
        },
    )
    .context("create reddit client")?;
    let client = Arc::new(client);
    Ok(Services {
        comments: Arc::new(data::RedditCommentService::new(client.clone())),
        votes: Arc::new(data::RedditVoteService::new(client)),
    })
}

/// Opens the inline viewer for one permalink on a single-post page and returns
/// what it mounts.
pub fn preview(
    cfg: &Config,
    services: &Services,
    permalink: &str,
    format: PreviewFormat,
) -> Result<String> {
    let mut page = Page::new();
    let post = PostId::new(permalink);
    page.add_post(post.clone(), Some(permalink));
    page.attach_action_row(&post, ActionRow::with_share_slot());

    let mut feed = FeedIntegration::new(
        services.comments.clone(),
        services.votes.clone(),
        cfg.comments.clone(),
    );
    feed.start(&mut page);
    feed.activate(&mut page, &post)?;

    let wait = cfg.reddit.timeout + Duration::from_secs(1);
    if !feed.wait_async(&mut page, wait) {
        bail!("timed out loading {permalink}");
    }
    debug!("preview of {permalink} mounted");

    match feed.content(&post) {
        Some(ViewContent::Comments(section)) => Ok(match format {
            PreviewFormat::Html => markup::section_html(section, page.theme()),
            PreviewFormat::Outline => markup::outline(section),
        }),
        Some(ViewContent::Error) => Err(anyhow!("failed to load comments for {permalink}")),
        Some(ViewContent::Loading) | None => Err(anyhow!("no comments mounted for {permalink}")),
    }
}

pub fn parse_vote_state(raw: &str) -> Result<reddit::VoteState> {
    match raw.to_ascii_lowercase().as_str() {
        "up" => Ok(reddit::VoteState::Up),
        "down" => Ok(reddit::VoteState::Down),
        "none" | "clear" => Ok(reddit::VoteState::None),
        other => bail!("unknown vote direction {other:?} (expected up, down or none)"),
    }
}

pub fn vote(services: &Services, thing_id: &str, state: reddit::VoteState) -> Result<()> {
    if thing_id.trim().is_empty() {
        bail!("thing id is required");
    }
    services.votes.vote(thing_id, state)
}
