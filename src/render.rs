//! Comment tree renderer.
//!
//! Turns an immutable tree of [`CommentNode`]s into a bounded view tree of
//! [`CommentCard`]s. Depth is passed down as a parameter; the input is never touched.
//! Top-level truncation is the caller's job, the renderer only bounds replies.

use chrono::{DateTime, Utc};

use crate::config::CommentsConfig;
use crate::format::{avatar_color, avatar_initial, time_ago};
use crate::reddit;
use crate::vote::VoteWidget;

pub const DELETED_AUTHOR: &str = "[deleted]";
const MAX_DEPTH_CLASS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub id: String,
    pub author: Option<String>,
    pub body: String,
    pub score: i64,
    pub created_utc: f64,
    pub is_submitter: bool,
    pub children: Vec<CommentNode>,
}

impl From<&reddit::Comment> for CommentNode {
    fn from(comment: &reddit::Comment) -> Self {
        let children = comment
            .replies
            .as_ref()
            .map(|listing| listing.comments().map(CommentNode::from).collect())
            .unwrap_or_default();
        CommentNode {
            id: comment.name.clone(),
            author: comment.author.clone(),
            body: comment.body.clone(),
            score: comment.score,
            created_utc: comment.created_utc,
            is_submitter: comment.is_submitter,
            children,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub max_reply_depth: usize,
    pub max_replies_per_level: usize,
    pub start_collapsed: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions::from(&CommentsConfig::default())
    }
}

impl From<&CommentsConfig> for RenderOptions {
    fn from(cfg: &CommentsConfig) -> Self {
        Self {
            max_reply_depth: cfg.max_reply_depth,
            max_replies_per_level: cfg.max_replies_per_level,
            start_collapsed: cfg.start_collapsed,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CommentsSection {
    Empty,
    Comments {
        comments: Vec<CommentCard>,
        permalink: String,
    },
}

impl CommentsSection {
    pub fn comments(&self) -> &[CommentCard] {
        match self {
            CommentsSection::Empty => &[],
            CommentsSection::Comments { comments, .. } => comments,
        }
    }

    pub fn find(&self, thing_id: &str) -> Option<&CommentCard> {
        self.comments()
            .iter()
            .find_map(|card| card.find(thing_id))
    }

    pub fn find_mut(&mut self, thing_id: &str) -> Option<&mut CommentCard> {
        match self {
            CommentsSection::Empty => None,
            CommentsSection::Comments { comments, .. } => comments
                .iter_mut()
                .find_map(|card| card.find_mut(thing_id)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommentCard {
    pub thing_id: String,
    pub author: String,
    pub is_op: bool,
    pub age: String,
    pub body: String,
    pub depth: usize,
    pub avatar_color: &'static str,
    pub avatar_initial: String,
    pub votes: VoteWidget,
    pub replies: Option<ReplyGroup>,
}

impl CommentCard {
    pub fn depth_class(&self) -> String {
        format!("ric-depth-{}", self.depth.min(MAX_DEPTH_CLASS))
    }

    pub fn profile_url(&self) -> String {
        format!("{}/user/{}/", reddit::DEFAULT_ORIGIN, self.author)
    }

    pub fn find(&self, thing_id: &str) -> Option<&CommentCard> {
        if self.thing_id == thing_id {
            return Some(self);
        }
        self.replies
            .as_ref()?
            .children
            .iter()
            .find_map(|child| child.find(thing_id))
    }

    pub fn find_mut(&mut self, thing_id: &str) -> Option<&mut CommentCard> {
        if self.thing_id == thing_id {
            return Some(self);
        }
        self.replies
            .as_mut()?
            .children
            .iter_mut()
            .find_map(|child| child.find_mut(thing_id))
    }
}

/// A collapsible group of replies under one comment.
#[derive(Debug, Clone)]
pub struct ReplyGroup {
    /// Comment-kind replies before truncation; what the label shows.
    pub total: usize,
    pub expanded: bool,
    pub children: Vec<CommentCard>,
}

impl ReplyGroup {
    pub fn label(&self) -> String {
        let noun = if self.total == 1 { "reply" } else { "replies" };
        format!("{} {}", self.total, noun)
    }

    pub fn toggle(&mut self) -> bool {
        self.expanded = !self.expanded;
        self.expanded
    }
}

pub struct Renderer {
    options: RenderOptions,
    now: DateTime<Utc>,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self::at(options, Utc::now())
    }

    /// Renderer with a fixed clock for relative ages.
    pub fn at(options: RenderOptions, now: DateTime<Utc>) -> Self {
        Self { options, now }
    }

    pub fn render_comments(&self, roots: &[CommentNode], permalink: &str) -> CommentsSection {
        if roots.is_empty() {
            return CommentsSection::Empty;
        }
        CommentsSection::Comments {
            comments: roots
                .iter()
                .map(|node| self.render_comment(node, 0))
                .collect(),
            permalink: permalink.to_string(),
        }
    }

    pub fn render_comment(&self, node: &CommentNode, depth: usize) -> CommentCard {
        let author = node
            .author
            .clone()
            .unwrap_or_else(|| DELETED_AUTHOR.to_string());

        let replies = if depth < self.options.max_reply_depth && !node.children.is_empty() {
            Some(ReplyGroup {
                total: node.children.len(),
                expanded: !self.options.start_collapsed,
                children: node
                    .children
                    .iter()
                    .take(self.options.max_replies_per_level)
                    .map(|child| self.render_comment(child, depth + 1))
                    .collect(),
            })
        } else {
            None
        };

        CommentCard {
            thing_id: node.id.clone(),
            avatar_color: avatar_color(&author),
            avatar_initial: avatar_initial(&author),
            age: format!("{} ago", time_ago(node.created_utc, self.now)),
            author,
            is_op: node.is_submitter,
            body: node.body.clone(),
            depth,
            votes: VoteWidget::new(node.id.clone(), node.score),
            replies,
        }
    }
}
