//! Feed integration: discovers posts, injects one toggle per post and drives the
//! per-post open/closed state machine.
//!
//! Network work runs on worker threads. Results come back over a channel and are
//! applied by whoever owns the [`FeedIntegration`] when it calls
//! [`FeedIntegration::poll_async`], so page and view state are only ever touched from
//! one thread. Every fetch carries a request id and every mounted view a mount id;
//! responses that no longer match are dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};

use crate::config::CommentsConfig;
use crate::data::{CommentService, VoteService};
use crate::markup;
use crate::page::{
    InlineView, Interest, Mutation, Page, PostId, SubscriptionId, Subscriptions, ToggleControl,
};
use crate::reddit;
use crate::render::{CommentNode, CommentsSection, RenderOptions, Renderer};
use crate::vote::{Resolution, VoteDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Closed,
    Open,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("post {0} has no inline toggle")]
    UnknownPost(PostId),
    #[error("post {0} has no comments mounted")]
    NotMounted(PostId),
    #[error("post {0} has no failed load to retry")]
    NothingToRetry(PostId),
    #[error("comment {0} is not rendered")]
    UnknownComment(String),
}

/// Top-level comment-kind entries of a listing, truncated to `max`.
pub fn root_comments(listing: &reddit::Listing<reddit::Comment>, max: usize) -> Vec<CommentNode> {
    listing.comments().take(max).map(CommentNode::from).collect()
}

#[derive(Debug)]
pub enum ViewContent {
    Loading,
    Error,
    Comments(CommentsSection),
}

#[derive(Debug)]
struct MountedView {
    mount_id: u64,
    content: ViewContent,
}

struct PendingComments {
    request_id: u64,
    cancel_flag: Arc<AtomicBool>,
}

struct PostSlot {
    permalink: String,
    state: ToggleState,
    view: Option<MountedView>,
    pending: Option<PendingComments>,
}

enum AsyncResponse {
    Comments {
        post: PostId,
        request_id: u64,
        result: Result<reddit::Listing<reddit::Comment>>,
    },
    VoteResult {
        post: PostId,
        mount_id: u64,
        thing_id: String,
        version: u64,
        error: Option<String>,
    },
}

pub struct FeedIntegration {
    comment_service: Arc<dyn CommentService>,
    vote_service: Arc<dyn VoteService>,
    options: CommentsConfig,
    subscriptions: Subscriptions,
    feed_subscription: Option<SubscriptionId>,
    waiting: HashMap<PostId, SubscriptionId>,
    slots: HashMap<PostId, PostSlot>,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
    next_request_id: u64,
    next_mount_id: u64,
}

impl FeedIntegration {
    pub fn new(
        comment_service: Arc<dyn CommentService>,
        vote_service: Arc<dyn VoteService>,
        options: CommentsConfig,
    ) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            comment_service,
            vote_service,
            options,
            subscriptions: Subscriptions::new(),
            feed_subscription: None,
            waiting: HashMap::new(),
            slots: HashMap::new(),
            response_tx,
            response_rx,
            next_request_id: 1,
            next_mount_id: 1,
        }
    }

    /// Starts watching the feed and processes the posts already on the page.
    pub fn start(&mut self, page: &mut Page) {
        if self.feed_subscription.is_none() {
            self.feed_subscription = Some(self.subscriptions.register(Interest::PostAppeared));
        }
        page.take_mutations();
        for post in page.post_ids() {
            self.discover(page, &post);
        }
        info!("inline comments ready, {} posts on page", self.slots.len());
    }

    /// Stops watching; mounted views stay where they are.
    pub fn stop(&mut self) {
        if let Some(id) = self.feed_subscription.take() {
            self.subscriptions.unregister(id);
        }
        for (_, id) in self.waiting.drain() {
            self.subscriptions.unregister(id);
        }
    }

    pub fn handle_mutations(&mut self, page: &mut Page) {
        for mutation in page.take_mutations() {
            for (id, interest) in self.subscriptions.matching(&mutation) {
                match interest {
                    Interest::PostAppeared => {
                        if let Mutation::PostAdded(post) = &mutation {
                            self.discover(page, post);
                        }
                    }
                    Interest::ActionRowReady(post) => {
                        if self.inject(page, &post) {
                            self.subscriptions.unregister(id);
                            self.waiting.remove(&post);
                        }
                    }
                }
            }
            if let Mutation::ActionRowAttached(post) = &mutation {
                self.reinject(page, post);
            }
        }
    }

    pub fn watched_posts(&self) -> usize {
        self.waiting.len()
    }

    fn discover(&mut self, page: &mut Page, post: &PostId) {
        if self.slots.contains_key(post) || self.waiting.contains_key(post) {
            return;
        }
        if self.inject(page, post) {
            return;
        }
        debug!("post {post}: action row not ready, waiting");
        let id = self
            .subscriptions
            .register(Interest::ActionRowReady(post.clone()));
        self.waiting.insert(post.clone(), id);
    }

    /// Injects the toggle into a post's action row. Returns `false` while the row
    /// does not exist yet.
    fn inject(&mut self, page: &mut Page, post: &PostId) -> bool {
        let Some(element) = page.post(post) else {
            return false;
        };
        if element.action_row.is_none() {
            return false;
        }
        if self.slots.contains_key(post) {
            return true;
        }
        let Some(permalink) = element.permalink.clone() else {
            debug!("post {post}: no comments link, skipping");
            return true;
        };
        let toggle = ToggleControl {
            state: ToggleState::Closed,
            markup: markup::toggle_html(ToggleState::Closed),
        };
        let Some(placement) = page.insert_toggle(post, toggle) else {
            return true;
        };
        debug!("post {post}: toggle injected ({placement:?})");
        self.slots.insert(
            post.clone(),
            PostSlot {
                permalink,
                state: ToggleState::Closed,
                view: None,
                pending: None,
            },
        );
        true
    }

    /// Puts the toggle back when the host re-renders the action row of a post that
    /// already has a slot. The slot's state and mounted view carry over.
    fn reinject(&mut self, page: &mut Page, post: &PostId) {
        if self.feed_subscription.is_none() || page.toggle(post).is_some() {
            return;
        }
        let Some(slot) = self.slots.get(post) else {
            return;
        };
        let toggle = ToggleControl {
            state: slot.state,
            markup: markup::toggle_html(slot.state),
        };
        if let Some(placement) = page.insert_toggle(post, toggle) {
            debug!("post {post}: action row replaced, toggle re-injected ({placement:?})");
            self.sync_page(page, post);
        }
    }

    pub fn state(&self, post: &PostId) -> Option<ToggleState> {
        self.slots.get(post).map(|slot| slot.state)
    }

    pub fn content(&self, post: &PostId) -> Option<&ViewContent> {
        self.slots
            .get(post)?
            .view
            .as_ref()
            .map(|view| &view.content)
    }

    pub fn section(&self, post: &PostId) -> Option<&CommentsSection> {
        match self.content(post)? {
            ViewContent::Comments(section) => Some(section),
            _ => None,
        }
    }

    /// Handles a press of the post's toggle control.
    pub fn activate(&mut self, page: &mut Page, post: &PostId) -> Result<ToggleState, FeedError> {
        let slot = self
            .slots
            .get_mut(post)
            .ok_or_else(|| FeedError::UnknownPost(post.clone()))?;
        let showing_error = matches!(
            slot.view.as_ref().map(|view| &view.content),
            Some(ViewContent::Error)
        );
        match (slot.state, showing_error) {
            (ToggleState::Open, true) => {
                self.fetch(page, post);
            }
            (ToggleState::Open, false) => {
                if let Some(pending) = slot.pending.take() {
                    pending.cancel_flag.store(true, Ordering::SeqCst);
                }
                slot.view = None;
                slot.state = ToggleState::Closed;
                debug!("post {post}: closed");
                self.sync_page(page, post);
            }
            (ToggleState::Closed, _) => {
                self.fetch(page, post);
            }
        }
        Ok(self.state(post).unwrap_or(ToggleState::Closed))
    }

    /// Handles the retry button of the error placeholder.
    pub fn retry(&mut self, page: &mut Page, post: &PostId) -> Result<(), FeedError> {
        match self.content(post) {
            Some(ViewContent::Error) => {}
            Some(_) => return Err(FeedError::NothingToRetry(post.clone())),
            None if self.slots.contains_key(post) => {
                return Err(FeedError::NothingToRetry(post.clone()))
            }
            None => return Err(FeedError::UnknownPost(post.clone())),
        }
        self.fetch(page, post);
        Ok(())
    }

    fn fetch(&mut self, page: &mut Page, post: &PostId) {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let mount_id = self.next_mount_id();
        let Some(slot) = self.slots.get_mut(post) else {
            return;
        };
        if let Some(pending) = slot.pending.take() {
            pending.cancel_flag.store(true, Ordering::SeqCst);
        }
        let cancel_flag = Arc::new(AtomicBool::new(false));
        slot.pending = Some(PendingComments {
            request_id,
            cancel_flag: cancel_flag.clone(),
        });
        slot.state = ToggleState::Open;
        slot.view = Some(MountedView {
            mount_id,
            content: ViewContent::Loading,
        });
        let permalink = slot.permalink.clone();
        self.sync_page(page, post);

        debug!("post {post}: loading comments (request {request_id})");
        let tx = self.response_tx.clone();
        let service = self.comment_service.clone();
        let post = post.clone();
        thread::spawn(move || {
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let result = service.load_comments(&permalink);
            if cancel_flag.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(AsyncResponse::Comments {
                post,
                request_id,
                result,
            });
        });
    }

    /// Presses a vote button on a rendered comment.
    pub fn press_vote(
        &mut self,
        page: &mut Page,
        post: &PostId,
        thing_id: &str,
        direction: VoteDirection,
    ) -> Result<(), FeedError> {
        let slot = self
            .slots
            .get_mut(post)
            .ok_or_else(|| FeedError::UnknownPost(post.clone()))?;
        let Some(MountedView {
            mount_id,
            content: ViewContent::Comments(section),
        }) = slot.view.as_mut()
        else {
            return Err(FeedError::NotMounted(post.clone()));
        };
        let mount_id = *mount_id;
        let card = section
            .find_mut(thing_id)
            .ok_or_else(|| FeedError::UnknownComment(thing_id.to_string()))?;
        let pending = card.votes.press(direction);
        self.sync_page(page, post);

        let tx = self.response_tx.clone();
        let service = self.vote_service.clone();
        let post = post.clone();
        thread::spawn(move || {
            let error = service
                .vote(&pending.thing_id, pending.state)
                .err()
                .map(|err| format!("{err:#}"));
            let _ = tx.send(AsyncResponse::VoteResult {
                post,
                mount_id,
                thing_id: pending.thing_id,
                version: pending.version,
                error,
            });
        });
        Ok(())
    }

    /// Flips one reply group open or closed. Returns the new expansion.
    pub fn toggle_replies(
        &mut self,
        page: &mut Page,
        post: &PostId,
        thing_id: &str,
    ) -> Result<bool, FeedError> {
        let section = self
            .slots
            .get_mut(post)
            .and_then(|slot| match slot.view.as_mut() {
                Some(MountedView {
                    content: ViewContent::Comments(section),
                    ..
                }) => Some(section),
                _ => None,
            })
            .ok_or_else(|| FeedError::NotMounted(post.clone()))?;
        let group = section
            .find_mut(thing_id)
            .and_then(|card| card.replies.as_mut())
            .ok_or_else(|| FeedError::UnknownComment(thing_id.to_string()))?;
        let expanded = group.toggle();
        self.sync_page(page, post);
        Ok(expanded)
    }

    /// Applies every response that has arrived. Returns whether anything was applied.
    pub fn poll_async(&mut self, page: &mut Page) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(page, message);
            changed = true;
        }
        changed
    }

    /// Blocks until at least one response arrives or `timeout` passes, then applies
    /// everything queued.
    pub fn wait_async(&mut self, page: &mut Page, timeout: Duration) -> bool {
        match self.response_rx.recv_timeout(timeout) {
            Ok(message) => {
                self.handle_async_response(page, message);
                self.poll_async(page);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    fn handle_async_response(&mut self, page: &mut Page, message: AsyncResponse) {
        match message {
            AsyncResponse::Comments {
                post,
                request_id,
                result,
            } => {
                let options = RenderOptions::from(&self.options);
                let max_roots = self.options.max_root_comments;
                let mount_id = self.next_mount_id();
                let Some(slot) = self.slots.get_mut(&post) else {
                    return;
                };
                let current = slot
                    .pending
                    .as_ref()
                    .is_some_and(|pending| pending.request_id == request_id);
                if !current || slot.state != ToggleState::Open {
                    debug!("post {post}: discarding stale comments (request {request_id})");
                    return;
                }
                slot.pending = None;
                let content = match result {
                    Ok(listing) => {
                        let roots = root_comments(&listing, max_roots);
                        ViewContent::Comments(
                            Renderer::new(options).render_comments(&roots, &slot.permalink),
                        )
                    }
                    Err(err) => {
                        warn!("post {post}: failed to load comments: {err:#}");
                        ViewContent::Error
                    }
                };
                slot.view = Some(MountedView { mount_id, content });
                self.sync_page(page, &post);
            }
            AsyncResponse::VoteResult {
                post,
                mount_id,
                thing_id,
                version,
                error,
            } => {
                let Some(section) = self.slots.get_mut(&post).and_then(|slot| {
                    match slot.view.as_mut() {
                        Some(MountedView {
                            mount_id: current,
                            content: ViewContent::Comments(section),
                        }) if *current == mount_id => Some(section),
                        _ => None,
                    }
                }) else {
                    debug!("post {post}: vote on {thing_id} resolved after unmount");
                    return;
                };
                let Some(card) = section.find_mut(&thing_id) else {
                    return;
                };
                if let Some(err) = &error {
                    warn!("vote on {thing_id} failed: {err}");
                }
                match card.votes.resolve(version, error.is_none()) {
                    Resolution::RolledBack => self.sync_page(page, &post),
                    Resolution::Committed => {}
                    Resolution::Stale => {
                        debug!("vote on {thing_id}: superseded response {version} ignored")
                    }
                }
            }
        }
    }

    fn next_mount_id(&mut self) -> u64 {
        let id = self.next_mount_id;
        self.next_mount_id = self.next_mount_id.wrapping_add(1);
        id
    }

    /// Writes the slot's toggle state and view markup to the page in one step.
    fn sync_page(&self, page: &mut Page, post: &PostId) {
        let Some(slot) = self.slots.get(post) else {
            return;
        };
        let theme = page.theme();
        let view = slot.view.as_ref().map(|view| InlineView {
            mount_id: view.mount_id,
            markup: match &view.content {
                ViewContent::Loading => markup::loading_html(theme),
                ViewContent::Error => markup::error_html(theme),
                ViewContent::Comments(section) => markup::section_html(section, theme),
            },
        });
        let toggle = ToggleControl {
            state: slot.state,
            markup: markup::toggle_html(slot.state),
        };
        page.set_view(post, toggle, view);
    }
}
