use crate::api::{Comment, Post, PostId, User};
use crate::dom::{Element, Fragment};

pub const SHOW_COMMENTS: &str = "Show Comments";
pub const HIDE_COMMENTS: &str = "Hide Comments";
pub const HIDE_CLASS: &str = "hide";
pub const POST_ID_KEY: &str = "postId";
pub const PLACEHOLDER_TEXT: &str = "Select an Employee to display their posts.";

pub fn create_elem_with_text(tag: &str, text: &str, class: Option<&str>) -> Element {
    let mut element = Element::new(tag);
    element.set_text_content(text);
    if let Some(class) = class.filter(|class| !class.is_empty()) {
        element.set_class_name(class);
    }
    element
}

pub fn build_option(user: &User) -> Element {
    let mut option = Element::new("option");
    option.set_value(user.id.to_string());
    option.set_text_content(user.name.as_str());
    option
}

pub fn build_options(users: &[User]) -> Vec<Element> {
    users.iter().map(build_option).collect()
}

pub fn build_comment_article(comment: &Comment) -> Element {
    let mut article = Element::new("article");
    article.append(create_elem_with_text("h3", &comment.name, None));
    article.append(create_elem_with_text("p", &comment.body, None));
    article.append(create_elem_with_text(
        "p",
        &format!("From: {}", comment.email),
        None,
    ));
    article
}

pub fn build_comments(comments: &[Comment]) -> Fragment {
    let mut fragment = Fragment::new();
    for comment in comments {
        fragment.append(build_comment_article(comment));
    }
    fragment
}

/// Hidden `section.comments` keyed by `post_id`.
pub fn build_comment_section(post_id: PostId, comments: &[Comment]) -> Element {
    let mut section = Element::new("section");
    section.set_data(POST_ID_KEY, post_id.to_string());
    section.set_class_name("comments");
    section.add_class(HIDE_CLASS);
    section.append_fragment(build_comments(comments));
    section
}

pub fn build_toggle_button(post_id: PostId) -> Element {
    let mut button = create_elem_with_text("button", SHOW_COMMENTS, None);
    button.set_data(POST_ID_KEY, post_id.to_string());
    button
}

pub fn build_post_article(
    post: &Post,
    author: &User,
    comments_section: Element,
    button: Element,
) -> Element {
    let mut article = Element::new("article");
    article.append(create_elem_with_text("h2", &post.title, None));
    article.append(create_elem_with_text("p", &post.body, None));
    article.append(create_elem_with_text(
        "p",
        &format!("Post ID: {}", post.id),
        None,
    ));
    article.append(create_elem_with_text(
        "p",
        &format!("Author: {} with {}", author.name, author.company.name),
        None,
    ));
    article.append(create_elem_with_text(
        "p",
        &author.company.catch_phrase,
        None,
    ));
    article.append(button);
    article.append(comments_section);
    article
}

pub fn build_placeholder() -> Element {
    create_elem_with_text("p", PLACEHOLDER_TEXT, Some("default-text"))
}
