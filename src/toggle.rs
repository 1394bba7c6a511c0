use std::collections::HashMap;

use crate::api::PostId;
use crate::builders::{HIDE_CLASS, HIDE_COMMENTS, POST_ID_KEY, SHOW_COMMENTS};
use crate::dom::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    Shown,
    #[default]
    Hidden,
}

impl Visibility {
    pub fn flipped(self) -> Self {
        match self {
            Visibility::Shown => Visibility::Hidden,
            Visibility::Hidden => Visibility::Shown,
        }
    }

    pub fn button_label(self) -> &'static str {
        match self {
            Visibility::Shown => HIDE_COMMENTS,
            Visibility::Hidden => SHOW_COMMENTS,
        }
    }
}

/// Comment section visibility per rendered post.
///
/// This map is the only record of whether a section is open. The `hide`
/// class and the button label are written from it and never read back.
#[derive(Debug, Default)]
pub struct Toggles {
    states: HashMap<PostId, Visibility>,
}

impl Toggles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, post_id: PostId) -> Visibility {
        self.states.get(&post_id).copied().unwrap_or_default()
    }

    pub fn track(&mut self, post_id: PostId) {
        self.states.insert(post_id, Visibility::Hidden);
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Flips `post_id` and syncs its section and button. Returns the new
    /// state, or `None` when the post is not rendered.
    pub fn toggle(&mut self, document: &mut Document, post_id: PostId) -> Option<Visibility> {
        let current = self.states.get_mut(&post_id)?;
        *current = current.flipped();
        let next = *current;
        apply(document, post_id, next);
        Some(next)
    }
}

fn apply(document: &mut Document, post_id: PostId, visibility: Visibility) {
    let key = post_id.to_string();
    if let Some(section) = document.main.find_by_data_mut("section", POST_ID_KEY, &key) {
        match visibility {
            Visibility::Shown => section.remove_class(HIDE_CLASS),
            Visibility::Hidden => section.add_class(HIDE_CLASS),
        }
    }
    if let Some(button) = document.main.find_by_data_mut("button", POST_ID_KEY, &key) {
        button.set_text_content(visibility.button_label());
    }
}
