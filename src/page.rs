use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::api::{PostId, User, UserId};
use crate::builders::{build_options, build_placeholder, POST_ID_KEY};
use crate::data::Directory;
use crate::dom::Document;
use crate::lifecycle::Phase;
use crate::listeners::{button_post_id, ListenerRegistry};
use crate::toggle::{Toggles, Visibility};

pub const DEFAULT_FALLBACK_USER_ID: UserId = 1;

pub(crate) struct InFlight {
    pub(crate) generation: u64,
    pub(crate) cancel: Arc<AtomicBool>,
}

/// Everything the employee view owns: the document, the button listeners,
/// comment visibility, and the state of the current refresh cycle.
pub struct Page {
    pub(crate) document: Document,
    pub(crate) listeners: ListenerRegistry,
    pub(crate) toggles: Toggles,
    pub(crate) phase: Phase,
    pub(crate) generation: u64,
    pub(crate) in_flight: Option<InFlight>,
    pub(crate) fallback_user_id: UserId,
}

impl Default for Page {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_USER_ID)
    }
}

impl Page {
    pub fn new(fallback_user_id: UserId) -> Self {
        let mut document = Document::new();
        document.main.append(build_placeholder());
        Self {
            document,
            listeners: ListenerRegistry::new(),
            toggles: Toggles::new(),
            phase: Phase::Idle,
            generation: 0,
            in_flight: None,
            fallback_user_id: if fallback_user_id == 0 {
                DEFAULT_FALLBACK_USER_ID
            } else {
                fallback_user_id
            },
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn fallback_user_id(&self) -> UserId {
        self.fallback_user_id
    }

    pub fn is_select_disabled(&self) -> bool {
        self.document.select.is_disabled()
    }

    pub fn selected_user_id(&self) -> Option<UserId> {
        self.document.select.value().and_then(|raw| raw.parse().ok())
    }

    /// Appends one option per user to the dropdown. `None` leaves it as is.
    pub fn populate_select_menu(&mut self, users: Option<&[User]>) -> usize {
        let Some(users) = users else {
            return 0;
        };
        let options = build_options(users);
        let added = options.len();
        for option in options {
            self.document.select.append(option);
        }
        tracing::info!(added, "populated employee menu");
        added
    }

    /// Fetches the employee list and fills the dropdown.
    pub fn init_page(&mut self, directory: &Directory) -> usize {
        let users = directory.get_users();
        self.populate_select_menu(users.as_deref())
    }

    /// `(value, label)` of each dropdown option in order.
    pub fn options(&self) -> Vec<(String, String)> {
        self.document
            .select
            .element_children()
            .filter(|child| child.tag() == "option")
            .map(|option| {
                (
                    option.value().unwrap_or_default().to_string(),
                    option.text_content(),
                )
            })
            .collect()
    }

    /// Post ids of the rendered toggle buttons, in document order.
    pub fn rendered_posts(&self) -> Vec<PostId> {
        self.document
            .main_buttons()
            .into_iter()
            .filter_map(button_post_id)
            .collect()
    }

    pub fn visibility(&self, post_id: PostId) -> Visibility {
        self.toggles.get(post_id)
    }

    /// Delivers a click to the button for `post_id`. Returns whether a
    /// handler ran.
    pub fn click(&mut self, post_id: PostId) -> bool {
        let key = post_id.to_string();
        if self
            .document
            .main
            .find_by_data("button", POST_ID_KEY, &key)
            .is_none()
        {
            return false;
        }
        let Some(handler) = self.listeners.handler(post_id) else {
            return false;
        };
        handler(&mut self.document, &mut self.toggles);
        true
    }
}
