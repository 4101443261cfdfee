//! In-memory model of the host feed page.
//!
//! The page is the single shared mutable resource: post containers appear over time,
//! their action rows may show up after the post itself, and inline views are mounted
//! next to posts. Structural changes are recorded as [`Mutation`]s which interested
//! parties consume through a [`Subscriptions`] registry.

use std::fmt;

use crate::feed::ToggleState;
use crate::format::Theme;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(pub String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        PostId(id.into())
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    PostAdded(PostId),
    ActionRowAttached(PostId),
}

impl Mutation {
    pub fn post(&self) -> &PostId {
        match self {
            Mutation::PostAdded(post) | Mutation::ActionRowAttached(post) => post,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleControl {
    pub state: ToggleState,
    pub markup: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowItem {
    Native(String),
    ShareSlot,
    Toggle(ToggleControl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    BeforeShare,
    Appended,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionRow {
    pub items: Vec<RowItem>,
}

impl ActionRow {
    pub fn with_share_slot() -> Self {
        Self {
            items: vec![
                RowItem::Native("vote".into()),
                RowItem::Native("comments".into()),
                RowItem::ShareSlot,
            ],
        }
    }

    pub fn without_share_slot() -> Self {
        Self {
            items: vec![
                RowItem::Native("vote".into()),
                RowItem::Native("comments".into()),
            ],
        }
    }

    pub fn toggle(&self) -> Option<&ToggleControl> {
        self.items.iter().find_map(|item| match item {
            RowItem::Toggle(toggle) => Some(toggle),
            _ => None,
        })
    }

    fn toggle_mut(&mut self) -> Option<&mut ToggleControl> {
        self.items.iter_mut().find_map(|item| match item {
            RowItem::Toggle(toggle) => Some(toggle),
            _ => None,
        })
    }

    fn insert_toggle(&mut self, toggle: ToggleControl) -> Placement {
        match self
            .items
            .iter()
            .position(|item| matches!(item, RowItem::ShareSlot))
        {
            Some(index) => {
                self.items.insert(index, RowItem::Toggle(toggle));
                Placement::BeforeShare
            }
            None => {
                self.items.push(RowItem::Toggle(toggle));
                Placement::Appended
            }
        }
    }
}

/// Markup mounted directly after a post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineView {
    pub mount_id: u64,
    pub markup: String,
}

#[derive(Debug, Clone)]
pub struct PostElement {
    pub id: PostId,
    pub permalink: Option<String>,
    pub action_row: Option<ActionRow>,
    pub inline_view: Option<InlineView>,
}

#[derive(Debug, Default)]
pub struct Page {
    posts: Vec<PostElement>,
    root_classes: Vec<String>,
    body_classes: Vec<String>,
    mutations: Vec<Mutation>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_theme_classes(&mut self, root: &[&str], body: &[&str]) {
        self.root_classes = root.iter().map(|class| class.to_string()).collect();
        self.body_classes = body.iter().map(|class| class.to_string()).collect();
    }

    pub fn theme(&self) -> Theme {
        Theme::detect(&self.root_classes, &self.body_classes)
    }

    /// Adds a post container whose internals have not rendered yet.
    pub fn add_post(&mut self, id: PostId, permalink: Option<&str>) {
        if self.post(&id).is_some() {
            return;
        }
        self.posts.push(PostElement {
            id: id.clone(),
            permalink: permalink.map(str::to_string),
            action_row: None,
            inline_view: None,
        });
        self.mutations.push(Mutation::PostAdded(id));
    }

    pub fn attach_action_row(&mut self, id: &PostId, row: ActionRow) -> bool {
        let Some(post) = self.post_mut(id) else {
            return false;
        };
        post.action_row = Some(row);
        self.mutations.push(Mutation::ActionRowAttached(id.clone()));
        true
    }

    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    pub fn post_ids(&self) -> Vec<PostId> {
        self.posts.iter().map(|post| post.id.clone()).collect()
    }

    pub fn post(&self, id: &PostId) -> Option<&PostElement> {
        self.posts.iter().find(|post| &post.id == id)
    }

    fn post_mut(&mut self, id: &PostId) -> Option<&mut PostElement> {
        self.posts.iter_mut().find(|post| &post.id == id)
    }

    pub fn toggle(&self, id: &PostId) -> Option<&ToggleControl> {
        self.post(id)?.action_row.as_ref()?.toggle()
    }

    pub fn inline_view(&self, id: &PostId) -> Option<&InlineView> {
        self.post(id)?.inline_view.as_ref()
    }

    /// Inserts the toggle control into a post's action row, before the share slot
    /// when there is one. Returns `None` if the row is missing or already has a toggle.
    pub fn insert_toggle(&mut self, id: &PostId, toggle: ToggleControl) -> Option<Placement> {
        let row = self.post_mut(id)?.action_row.as_mut()?;
        if row.toggle().is_some() {
            return None;
        }
        Some(row.insert_toggle(toggle))
    }

    /// Updates the toggle control and the adjacent view in one step so the two
    /// never disagree.
    pub fn set_view(
        &mut self,
        id: &PostId,
        toggle: ToggleControl,
        view: Option<InlineView>,
    ) -> bool {
        let Some(post) = self.post_mut(id) else {
            return false;
        };
        let Some(control) = post.action_row.as_mut().and_then(ActionRow::toggle_mut) else {
            return false;
        };
        *control = toggle;
        post.inline_view = view;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interest {
    /// Any post container appearing; stays registered.
    PostAppeared,
    /// The action row of one post appearing; unregistered once handled.
    ActionRowReady(PostId),
}

impl Interest {
    fn matches(&self, mutation: &Mutation) -> bool {
        match (self, mutation) {
            (Interest::PostAppeared, Mutation::PostAdded(_)) => true,
            (Interest::ActionRowReady(post), Mutation::ActionRowAttached(changed)) => {
                post == changed
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Default)]
pub struct Subscriptions {
    next_id: u64,
    entries: Vec<(SubscriptionId, Interest)>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, interest: Interest) -> SubscriptionId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = SubscriptionId(self.next_id);
        self.entries.push((id, interest));
        id
    }

    pub fn unregister(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    pub fn matching(&self, mutation: &Mutation) -> Vec<(SubscriptionId, Interest)> {
        self.entries
            .iter()
            .filter(|(_, interest)| interest.matches(mutation))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toggle(state: ToggleState) -> ToggleControl {
        ToggleControl {
            state,
            markup: String::new(),
        }
    }

    #[test]
    fn mutations_are_recorded_once() {
        let mut page = Page::new();
        let id = PostId::new("t3_a");
        page.add_post(id.clone(), Some("/r/x/comments/a/"));
        page.add_post(id.clone(), Some("/r/x/comments/a/"));
        assert!(page.attach_action_row(&id, ActionRow::with_share_slot()));
        assert!(!page.attach_action_row(&PostId::new("t3_missing"), ActionRow::default()));
        assert_eq!(
            page.take_mutations(),
            vec![
                Mutation::PostAdded(id.clone()),
                Mutation::ActionRowAttached(id)
            ]
        );
        assert!(page.take_mutations().is_empty());
    }

    #[test]
    fn toggle_goes_before_share_slot() {
        let mut page = Page::new();
        let id = PostId::new("t3_a");
        page.add_post(id.clone(), None);
        assert_eq!(page.insert_toggle(&id, toggle(ToggleState::Closed)), None);
        page.attach_action_row(&id, ActionRow::with_share_slot());
        assert_eq!(
            page.insert_toggle(&id, toggle(ToggleState::Closed)),
            Some(Placement::BeforeShare)
        );
        assert_eq!(page.insert_toggle(&id, toggle(ToggleState::Closed)), None);
        let items = &page.post(&id).unwrap().action_row.as_ref().unwrap().items;
        assert!(matches!(items[2], RowItem::Toggle(_)));
        assert!(matches!(items[3], RowItem::ShareSlot));
    }

    #[test]
    fn toggle_appends_without_share_slot() {
        let mut page = Page::new();
        let id = PostId::new("t3_a");
        page.add_post(id.clone(), None);
        page.attach_action_row(&id, ActionRow::without_share_slot());
        assert_eq!(
            page.insert_toggle(&id, toggle(ToggleState::Closed)),
            Some(Placement::Appended)
        );
    }

    #[test]
    fn set_view_updates_toggle_and_view_together() {
        let mut page = Page::new();
        let id = PostId::new("t3_a");
        page.add_post(id.clone(), None);
        page.attach_action_row(&id, ActionRow::with_share_slot());
        page.insert_toggle(&id, toggle(ToggleState::Closed));
        let view = InlineView {
            mount_id: 1,
            markup: "<div></div>".into(),
        };
        assert!(page.set_view(&id, toggle(ToggleState::Open), Some(view.clone())));
        assert_eq!(page.toggle(&id).unwrap().state, ToggleState::Open);
        assert_eq!(page.inline_view(&id), Some(&view));
        assert!(page.set_view(&id, toggle(ToggleState::Closed), None));
        assert!(page.inline_view(&id).is_none());
    }

    #[test]
    fn theme_follows_classes() {
        let mut page = Page::new();
        assert_eq!(page.theme(), Theme::Light);
        page.set_theme_classes(&["theme-dark"], &[]);
        assert_eq!(page.theme(), Theme::Dark);
    }

    #[test]
    fn one_shot_interest_matches_only_its_post() {
        let mut subs = Subscriptions::new();
        let feed = subs.register(Interest::PostAppeared);
        let a = PostId::new("t3_a");
        let row = subs.register(Interest::ActionRowReady(a.clone()));
        assert_eq!(subs.len(), 2);

        let hits = subs.matching(&Mutation::ActionRowAttached(a.clone()));
        assert_eq!(hits, vec![(row, Interest::ActionRowReady(a.clone()))]);
        assert!(subs
            .matching(&Mutation::ActionRowAttached(PostId::new("t3_b")))
            .is_empty());
        assert_eq!(subs.matching(&Mutation::PostAdded(a)).len(), 1);

        assert!(subs.unregister(row));
        assert!(!subs.unregister(row));
        assert!(subs.unregister(feed));
        assert!(subs.is_empty());
    }
}
