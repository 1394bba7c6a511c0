use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::api::PostId;
use crate::builders::POST_ID_KEY;
use crate::dom::{Document, Element};
use crate::toggle::Toggles;

pub type ClickHandler = Rc<dyn Fn(&mut Document, &mut Toggles)>;

/// Click handlers for the buttons in `main`, keyed by post id.
///
/// The registry owns the only strong reference to each handler, so once a
/// binding is detached its closure is dropped and can no longer run.
#[derive(Default)]
pub struct ListenerRegistry {
    bindings: HashMap<PostId, ClickHandler>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bound: Vec<&PostId> = self.bindings.keys().collect();
        bound.sort();
        f.debug_struct("ListenerRegistry")
            .field("bound", &bound)
            .finish()
    }
}

pub fn button_post_id(button: &Element) -> Option<PostId> {
    button
        .data(POST_ID_KEY)
        .and_then(|raw| raw.parse::<PostId>().ok())
        .filter(|id| *id != 0)
}

/// Handler installed on every comment toggle button.
pub fn toggle_comments(post_id: PostId) -> ClickHandler {
    Rc::new(move |document: &mut Document, toggles: &mut Toggles| {
        if toggles.toggle(document, post_id).is_none() {
            tracing::debug!(post_id, "toggle for unrendered post ignored");
        }
    })
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, document: &Document) -> usize {
        self.attach_with(document, toggle_comments)
    }

    /// Binds a handler from `make` to every post button not already bound.
    pub fn attach_with<F>(&mut self, document: &Document, make: F) -> usize
    where
        F: Fn(PostId) -> ClickHandler,
    {
        let mut attached = 0;
        for button in document.main_buttons() {
            let Some(post_id) = button_post_id(button) else {
                continue;
            };
            if self.bindings.contains_key(&post_id) {
                tracing::warn!(post_id, "button already has a click handler; skipping");
                continue;
            }
            self.bindings.insert(post_id, make(post_id));
            attached += 1;
        }
        tracing::debug!(attached, "attached button listeners");
        attached
    }

    /// Drops the handler of every post button in `main`.
    pub fn detach(&mut self, document: &Document) -> usize {
        let mut detached = 0;
        for button in document.main_buttons() {
            let Some(post_id) = button_post_id(button) else {
                continue;
            };
            if self.bindings.remove(&post_id).is_some() {
                detached += 1;
            }
        }
        tracing::debug!(detached, "detached button listeners");
        detached
    }

    pub fn handler(&self, post_id: PostId) -> Option<ClickHandler> {
        self.bindings.get(&post_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
