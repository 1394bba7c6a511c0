//! The refresh cycle run on every employee selection change.
//!
//! A cycle moves through [`Phase`]s in a fixed order:
//! `Idle -> Disabled -> Fetching -> Rendering -> Rebound -> Idle`.
//! [`Page::begin_refresh`] covers the first two transitions and hands back a
//! [`RefreshTicket`]; [`fetch_cycle`] does the network work (on any thread);
//! [`Page::commit_refresh`] performs the document rewrite and re-enables the
//! menu. Every cycle carries a generation number and only the newest
//! generation may commit, so an older fetch finishing late is dropped
//! instead of overwriting a newer render.
//!
//! Rendering is all-or-nothing: nothing in `main` changes until every fetch
//! for the cycle has finished. A post whose author cannot be loaded fails
//! the cycle, and the content region falls back to the placeholder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::api::{Comment, Post, PostId, User, UserId};
use crate::builders::{
    build_comment_section, build_placeholder, build_post_article, build_toggle_button,
};
use crate::data::Directory;
use crate::dom::Fragment;
use crate::page::{InFlight, Page};
use crate::toggle::Toggles;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Disabled,
    Fetching,
    Rendering,
    Rebound,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Disabled => "disabled",
            Phase::Fetching => "fetching",
            Phase::Rendering => "rendering",
            Phase::Rebound => "rebinding",
        }
    }
}

/// Dropdown change event. `value` is the selected option's value, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    pub value: Option<String>,
}

impl ChangeEvent {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshTicket {
    pub generation: u64,
    pub user_id: UserId,
    pub cancel: Arc<AtomicBool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPost {
    pub post: Post,
    pub author: User,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("author {user_id} of post {post_id} could not be loaded")]
    MissingAuthor { post_id: PostId, user_id: UserId },
    #[error("refresh cancelled by a newer selection")]
    Cancelled,
}

pub type CycleResult = Result<Vec<RenderedPost>, RefreshError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Rendered { posts: usize, listeners: usize },
    Empty,
    Failed(RefreshError),
    Stale { generation: u64, current: u64 },
}

/// Loads everything one cycle renders for `user_id`.
///
/// Posts are walked in order with their author and comments fetched one at a
/// time. A failed post listing yields no posts; a failed comment listing
/// yields an empty section.
pub fn fetch_cycle(directory: &Directory, user_id: UserId, cancel: &AtomicBool) -> CycleResult {
    let Some(posts) = directory.get_user_posts(Some(user_id)) else {
        return Ok(Vec::new());
    };

    let mut rendered = Vec::with_capacity(posts.len());
    for post in posts {
        if cancel.load(Ordering::SeqCst) {
            return Err(RefreshError::Cancelled);
        }
        let author = directory
            .get_user(Some(post.user_id))
            .ok_or(RefreshError::MissingAuthor {
                post_id: post.id,
                user_id: post.user_id,
            })?;
        let comments = directory.get_post_comments(Some(post.id)).unwrap_or_default();
        rendered.push(RenderedPost {
            post,
            author,
            comments,
        });
    }
    Ok(rendered)
}

fn build_posts(posts: &[RenderedPost], toggles: &mut Toggles) -> Fragment {
    let mut fragment = Fragment::new();
    for entry in posts {
        let section = build_comment_section(entry.post.id, &entry.comments);
        let button = build_toggle_button(entry.post.id);
        fragment.append(build_post_article(
            &entry.post,
            &entry.author,
            section,
            button,
        ));
        toggles.track(entry.post.id);
    }
    fragment
}

impl Page {
    /// Event value as a user id, or the fallback when absent, empty, zero, or
    /// not a number.
    pub fn resolve_user_id(&self, event: &ChangeEvent) -> UserId {
        let raw = event.value.as_deref().map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return self.fallback_user_id;
        }
        match raw.parse::<UserId>() {
            Ok(0) => self.fallback_user_id,
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(value = raw, "unparseable employee id; using fallback");
                self.fallback_user_id
            }
        }
    }

    fn transition(&mut self, next: Phase) {
        tracing::debug!(
            generation = self.generation,
            from = self.phase.label(),
            to = next.label(),
            "refresh phase"
        );
        self.phase = next;
    }

    /// Starts a cycle: disables the menu and supersedes any cycle in flight.
    pub fn begin_refresh(&mut self, event: &ChangeEvent) -> RefreshTicket {
        if let Some(previous) = self.in_flight.take() {
            previous.cancel.store(true, Ordering::SeqCst);
            tracing::debug!(generation = previous.generation, "superseded refresh");
        }

        self.generation = self.generation.wrapping_add(1);
        self.document.select.set_disabled(true);
        self.transition(Phase::Disabled);

        let user_id = self.resolve_user_id(event);
        self.document.select.set_value(user_id.to_string());

        let cancel = Arc::new(AtomicBool::new(false));
        self.in_flight = Some(InFlight {
            generation: self.generation,
            cancel: cancel.clone(),
        });
        self.transition(Phase::Fetching);
        tracing::info!(generation = self.generation, user_id, "refreshing posts");

        RefreshTicket {
            generation: self.generation,
            user_id,
            cancel,
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Writes a finished fetch into `main` if `generation` is still current.
    pub fn commit_refresh(&mut self, generation: u64, result: CycleResult) -> CommitOutcome {
        let current = match &self.in_flight {
            Some(in_flight) if in_flight.generation == generation => generation,
            _ => {
                tracing::debug!(generation, current = self.generation, "dropping stale refresh");
                return CommitOutcome::Stale {
                    generation,
                    current: self.generation,
                };
            }
        };

        self.transition(Phase::Rendering);
        self.listeners.detach(&self.document);
        self.document.main.delete_children();
        self.toggles.clear();

        let (fragment, outcome) = match result {
            Ok(posts) if posts.is_empty() => {
                let mut fragment = Fragment::new();
                fragment.append(build_placeholder());
                (fragment, CommitOutcome::Empty)
            }
            Ok(posts) => {
                let count = posts.len();
                let fragment = build_posts(&posts, &mut self.toggles);
                (
                    fragment,
                    CommitOutcome::Rendered {
                        posts: count,
                        listeners: 0,
                    },
                )
            }
            Err(err) => {
                tracing::error!(generation = current, error = %err, "refresh failed");
                let mut fragment = Fragment::new();
                fragment.append(build_placeholder());
                (fragment, CommitOutcome::Failed(err))
            }
        };
        self.document.main.append_fragment(fragment);

        self.transition(Phase::Rebound);
        let attached = self.listeners.attach(&self.document);

        self.document.select.set_disabled(false);
        self.in_flight = None;
        self.transition(Phase::Idle);

        match outcome {
            CommitOutcome::Rendered { posts, .. } => CommitOutcome::Rendered {
                posts,
                listeners: attached,
            },
            other => other,
        }
    }

    /// Runs a whole cycle inline.
    pub fn refresh(&mut self, directory: &Directory, event: &ChangeEvent) -> CommitOutcome {
        let ticket = self.begin_refresh(event);
        let result = fetch_cycle(directory, ticket.user_id, &ticket.cancel);
        self.commit_refresh(ticket.generation, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Company;
    use crate::builders::{HIDE_CLASS, HIDE_COMMENTS, PLACEHOLDER_TEXT, POST_ID_KEY, SHOW_COMMENTS};
    use crate::data::MockDirectorySource;
    use crate::toggle::Visibility;

    fn user(id: UserId, name: &str) -> User {
        User {
            id,
            name: name.into(),
            username: String::new(),
            email: String::new(),
            company: Company {
                name: "Yost and Sons".into(),
                catch_phrase: "Switchable contextually-based project".into(),
            },
        }
    }

    fn post(id: PostId, user_id: UserId) -> Post {
        Post {
            id,
            user_id,
            title: format!("title {id}"),
            body: format!("body {id}"),
        }
    }

    fn comment(id: u64, post_id: PostId) -> Comment {
        Comment {
            id,
            post_id,
            name: format!("commenter {id}"),
            email: format!("c{id}@example.com"),
            body: format!("comment {id}"),
        }
    }

    fn directory() -> (Arc<MockDirectorySource>, Directory) {
        let source = Arc::new(
            MockDirectorySource::new()
                .with_user(user(1, "Leanne Graham"))
                .with_user(user(5, "Chelsey Dietrich"))
                .with_post(post(41, 5))
                .with_post(post(42, 5))
                .with_post(post(1, 1))
                .with_comment(comment(201, 41))
                .with_comment(comment(202, 41))
                .with_comment(comment(203, 42)),
        );
        (source.clone(), Directory::new(source))
    }

    fn articles(page: &Page) -> usize {
        page.document()
            .main
            .element_children()
            .filter(|child| child.tag() == "article")
            .count()
    }

    #[test]
    fn renders_one_article_per_post() {
        let (_, directory) = directory();
        let mut page = Page::default();
        let outcome = page.refresh(&directory, &ChangeEvent::new("5"));
        assert_eq!(
            outcome,
            CommitOutcome::Rendered {
                posts: 2,
                listeners: 2
            }
        );
        assert_eq!(articles(&page), 2);
        assert_eq!(page.rendered_posts(), vec![41, 42]);
        for id in ["41", "42"] {
            let main = &page.document().main;
            let button = main.find_by_data("button", POST_ID_KEY, id).unwrap();
            assert_eq!(button.text_content(), SHOW_COMMENTS);
            let section = main.find_by_data("section", POST_ID_KEY, id).unwrap();
            assert!(section.has_class(HIDE_CLASS));
        }
        let section = page
            .document()
            .main
            .find_by_data("section", POST_ID_KEY, "41")
            .unwrap();
        assert_eq!(section.element_children().count(), 2);
    }

    #[test]
    fn click_toggles_only_its_own_post() {
        let (_, directory) = directory();
        let mut page = Page::default();
        page.refresh(&directory, &ChangeEvent::new("5"));

        assert!(page.click(41));
        let main = &page.document().main;
        assert_eq!(
            main.find_by_data("button", POST_ID_KEY, "41")
                .unwrap()
                .text_content(),
            HIDE_COMMENTS
        );
        assert!(!main
            .find_by_data("section", POST_ID_KEY, "41")
            .unwrap()
            .has_class(HIDE_CLASS));
        assert!(main
            .find_by_data("section", POST_ID_KEY, "42")
            .unwrap()
            .has_class(HIDE_CLASS));
        assert_eq!(page.visibility(41), Visibility::Shown);
        assert_eq!(page.visibility(42), Visibility::Hidden);
    }

    #[test]
    fn user_without_posts_gets_placeholder() {
        let (_, directory) = directory();
        let mut page = Page::default();
        assert_eq!(
            page.refresh(&directory, &ChangeEvent::new("7")),
            CommitOutcome::Empty
        );
        let main = &page.document().main;
        assert_eq!(main.children().len(), 1);
        assert_eq!(main.text_content(), PLACEHOLDER_TEXT);
        assert!(page.document().main_buttons().is_empty());
        assert!(page.listeners().is_empty());
    }

    #[test]
    fn failed_post_listing_gets_placeholder() {
        let source = Arc::new(MockDirectorySource::new().failing_posts());
        let mut page = Page::default();
        let outcome = page.refresh(&Directory::new(source), &ChangeEvent::new("5"));
        assert_eq!(outcome, CommitOutcome::Empty);
        assert_eq!(page.document().main.text_content(), PLACEHOLDER_TEXT);
        assert!(!page.is_select_disabled());
    }

    #[test]
    fn missing_author_fails_whole_cycle() {
        let source = Arc::new(
            MockDirectorySource::new()
                .with_user(user(5, "Chelsey Dietrich"))
                .with_post(post(41, 5))
                .with_post(post(42, 5))
                .failing_user(5),
        );
        let mut page = Page::default();
        let outcome = page.refresh(&Directory::new(source), &ChangeEvent::new("5"));
        assert_eq!(
            outcome,
            CommitOutcome::Failed(RefreshError::MissingAuthor {
                post_id: 41,
                user_id: 5
            })
        );
        assert_eq!(articles(&page), 0);
        assert_eq!(page.document().main.text_content(), PLACEHOLDER_TEXT);
        assert!(!page.is_select_disabled());
        assert_eq!(page.phase(), Phase::Idle);
    }

    #[test]
    fn failed_comment_listing_renders_empty_section() {
        let source = Arc::new(
            MockDirectorySource::new()
                .with_user(user(5, "Chelsey Dietrich"))
                .with_post(post(41, 5))
                .with_post(post(42, 5))
                .with_comment(comment(201, 41))
                .with_comment(comment(203, 42))
                .failing_comments(41),
        );
        let mut page = Page::default();
        let outcome = page.refresh(&Directory::new(source), &ChangeEvent::new("5"));
        assert_eq!(
            outcome,
            CommitOutcome::Rendered {
                posts: 2,
                listeners: 2
            }
        );
        assert_eq!(articles(&page), 2);

        let main = &page.document().main;
        let section = main.find_by_data("section", POST_ID_KEY, "41").unwrap();
        assert!(section.has_class("comments"));
        assert!(section.has_class(HIDE_CLASS));
        assert_eq!(section.element_children().count(), 0);
        let other = main.find_by_data("section", POST_ID_KEY, "42").unwrap();
        assert_eq!(other.element_children().count(), 1);

        assert!(!page.is_select_disabled());
        assert_eq!(page.phase(), Phase::Idle);
    }

    #[test]
    fn menu_disabled_only_while_cycle_runs() {
        let (_, directory) = directory();
        let mut page = Page::default();
        assert!(!page.is_select_disabled());

        let ticket = page.begin_refresh(&ChangeEvent::new("5"));
        assert!(page.is_select_disabled());
        assert_eq!(page.phase(), Phase::Fetching);

        let result = fetch_cycle(&directory, ticket.user_id, &ticket.cancel);
        assert!(page.is_select_disabled());

        page.commit_refresh(ticket.generation, result);
        assert!(!page.is_select_disabled());
        assert_eq!(page.phase(), Phase::Idle);
    }

    #[test]
    fn missing_or_empty_value_falls_back() {
        let page = Page::default();
        assert_eq!(page.resolve_user_id(&ChangeEvent::default()), 1);
        assert_eq!(page.resolve_user_id(&ChangeEvent::new("")), 1);
        assert_eq!(page.resolve_user_id(&ChangeEvent::new("0")), 1);
        assert_eq!(page.resolve_user_id(&ChangeEvent::new("abc")), 1);
        assert_eq!(page.resolve_user_id(&ChangeEvent::new(" 9 ")), 9);

        let (_, directory) = directory();
        let mut page = Page::default();
        page.refresh(&directory, &ChangeEvent::default());
        assert_eq!(page.rendered_posts(), vec![1]);
        assert_eq!(page.selected_user_id(), Some(1));
    }

    #[test]
    fn stale_cycle_is_dropped() {
        let (_, directory) = directory();
        let mut page = Page::default();

        let first = page.begin_refresh(&ChangeEvent::new("1"));
        let second = page.begin_refresh(&ChangeEvent::new("5"));
        assert!(first.cancel.load(Ordering::SeqCst));

        let late = fetch_cycle(&directory, first.user_id, &AtomicBool::new(false));
        let before = page.document().clone();
        assert_eq!(
            page.commit_refresh(first.generation, late),
            CommitOutcome::Stale {
                generation: first.generation,
                current: second.generation
            }
        );
        assert_eq!(page.document().main, before.main);
        assert!(page.is_select_disabled());

        let fresh = fetch_cycle(&directory, second.user_id, &second.cancel);
        page.commit_refresh(second.generation, fresh);
        assert_eq!(page.rendered_posts(), vec![41, 42]);
        assert!(!page.is_select_disabled());
    }

    #[test]
    fn cancelled_fetch_stops_before_next_post() {
        let (source, directory) = directory();
        let cancel = AtomicBool::new(true);
        assert_eq!(
            fetch_cycle(&directory, 5, &cancel),
            Err(RefreshError::Cancelled)
        );
        assert_eq!(source.calls(), 1);
    }

    #[test]
    fn refresh_replaces_previous_listeners() {
        let (_, directory) = directory();
        let mut page = Page::default();
        page.refresh(&directory, &ChangeEvent::new("5"));
        assert_eq!(page.listeners().len(), 2);

        page.refresh(&directory, &ChangeEvent::new("1"));
        assert_eq!(page.listeners().len(), 1);
        assert!(!page.click(41));
        assert!(page.click(1));
        assert_eq!(articles(&page), 1);
    }

    #[test]
    fn fetches_run_in_post_order_one_at_a_time() {
        let (source, directory) = directory();
        let result = fetch_cycle(&directory, 5, &AtomicBool::new(false)).unwrap();
        let ids: Vec<PostId> = result.iter().map(|entry| entry.post.id).collect();
        assert_eq!(ids, vec![41, 42]);
        assert_eq!(result[0].comments.len(), 2);
        // posts + (author + comments) per post
        assert_eq!(source.calls(), 1 + 2 * 2);
    }
}
