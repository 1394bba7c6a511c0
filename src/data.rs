use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::api::{self, ApiError, Comment, Post, PostId, User, UserId};

/// Raw read operations against the employee directory.
pub trait DirectorySource: Send + Sync {
    fn users(&self) -> Result<Vec<User>, ApiError>;
    fn user(&self, user_id: UserId) -> Result<User, ApiError>;
    fn user_posts(&self, user_id: UserId) -> Result<Vec<Post>, ApiError>;
    fn post_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError>;
}

impl DirectorySource for api::Client {
    fn users(&self) -> Result<Vec<User>, ApiError> {
        api::Client::users(self)
    }

    fn user(&self, user_id: UserId) -> Result<User, ApiError> {
        api::Client::user(self, user_id)
    }

    fn user_posts(&self, user_id: UserId) -> Result<Vec<Post>, ApiError> {
        api::Client::user_posts(self, user_id)
    }

    fn post_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        api::Client::post_comments(self, post_id)
    }
}

/// Fetch-and-log facade over a [`DirectorySource`].
///
/// Callers observe only `Some(data)` or `None`. An absent identifier (`None`
/// or `0`) short-circuits to `None` without touching the source; any source
/// error is logged and also becomes `None`.
#[derive(Clone)]
pub struct Directory {
    source: Arc<dyn DirectorySource + Send + Sync>,
}

impl Directory {
    pub fn new(source: Arc<dyn DirectorySource + Send + Sync>) -> Self {
        Self { source }
    }

    pub fn get_users(&self) -> Option<Vec<User>> {
        logged("users", self.source.users())
    }

    pub fn get_user_posts(&self, user_id: Option<UserId>) -> Option<Vec<Post>> {
        let user_id = present(user_id)?;
        logged("user posts", self.source.user_posts(user_id))
    }

    pub fn get_user(&self, user_id: Option<UserId>) -> Option<User> {
        let user_id = present(user_id)?;
        logged("user", self.source.user(user_id))
    }

    pub fn get_post_comments(&self, post_id: Option<PostId>) -> Option<Vec<Comment>> {
        let post_id = present(post_id)?;
        logged("post comments", self.source.post_comments(post_id))
    }
}

fn present(id: Option<u64>) -> Option<u64> {
    id.filter(|id| *id != 0)
}

fn logged<T>(what: &str, result: Result<T, ApiError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::error!(error = %err, "fetch {what} failed");
            None
        }
    }
}

/// In-memory directory used for offline runs and tests.
#[derive(Default)]
pub struct MockDirectorySource {
    users: Vec<User>,
    posts: Vec<Post>,
    comments: HashMap<PostId, Vec<Comment>>,
    failing_users: Vec<UserId>,
    failing_comments: Vec<PostId>,
    fail_posts: bool,
    calls: AtomicUsize,
}

impl MockDirectorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_post(mut self, post: Post) -> Self {
        self.posts.push(post);
        self
    }

    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comments.entry(comment.post_id).or_default().push(comment);
        self
    }

    /// Makes `user` lookups for `user_id` fail with a 500.
    pub fn failing_user(mut self, user_id: UserId) -> Self {
        self.failing_users.push(user_id);
        self
    }

    /// Makes the comment listing for `post_id` fail with a 500.
    pub fn failing_comments(mut self, post_id: PostId) -> Self {
        self.failing_comments.push(post_id);
        self
    }

    /// Makes every post listing fail with a 500.
    pub fn failing_posts(mut self) -> Self {
        self.fail_posts = true;
        self
    }

    /// Number of source calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn mock_status(path: String) -> ApiError {
    ApiError::Status {
        url: format!("mock://{path}"),
        status: 500,
    }
}

impl DirectorySource for MockDirectorySource {
    fn users(&self) -> Result<Vec<User>, ApiError> {
        self.record();
        Ok(self.users.clone())
    }

    fn user(&self, user_id: UserId) -> Result<User, ApiError> {
        self.record();
        if self.failing_users.contains(&user_id) {
            return Err(mock_status(format!("users/{user_id}")));
        }
        self.users
            .iter()
            .find(|user| user.id == user_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                url: format!("mock://users/{user_id}"),
                status: 404,
            })
    }

    fn user_posts(&self, user_id: UserId) -> Result<Vec<Post>, ApiError> {
        self.record();
        if self.fail_posts {
            return Err(mock_status(format!("posts?userId={user_id}")));
        }
        Ok(self
            .posts
            .iter()
            .filter(|post| post.user_id == user_id)
            .cloned()
            .collect())
    }

    fn post_comments(&self, post_id: PostId) -> Result<Vec<Comment>, ApiError> {
        self.record();
        if self.failing_comments.contains(&post_id) {
            return Err(mock_status(format!("posts/{post_id}/comments")));
        }
        Ok(self.comments.get(&post_id).cloned().unwrap_or_default())
    }
}
