//! What the host page draws, and what it sends back.
//!
//! [`build`] derives a serializable [`ViewModel`] from the controllers' state. Hosts either render that
//! JSON themselves or use [`render_html`]. User actions come back as [`Intent`]s, the HTML produced here
//! tags every control with the `data-intent` it should dispatch.

use crate::error::AppError;
use crate::post_form::{Draft, Field};
use crate::post_list::Post;
use crate::session::{Session, SessionStatus};
use crate::timestamps::format_timestamp;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi))]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    pub user_id: Option<String>,
    pub status: SessionStatus,
    pub body: Body,
    pub form: FormView,
    pub notice: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Body {
    Loading,
    Empty,
    Posts { posts: Vec<PostCard> },
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[serde(rename_all = "camelCase")]
pub struct PostCard {
    pub id: String,
    pub title: String,
    pub description: String,
    pub author: String,
    pub created_at: String,
    /// The store has not stamped the post yet, `created_at` is the local estimate.
    pub pending: bool,
}

impl From<&Post> for PostCard {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.to_string(),
            title: post.title.clone(),
            description: post.description.clone(),
            author: post.author.clone(),
            created_at: format_timestamp(&post.created_at),
            pending: post.created_at.is_pending(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    pub title: String,
    pub description: String,
    pub author: String,
    pub editing: bool,
    pub submit_label: String,
    /// Only a signed in user can submit.
    pub enabled: bool,
}

pub const ADD_LABEL: &str = "Add Post";
pub const UPDATE_LABEL: &str = "Update Post";

impl FormView {
    fn new(draft: &Draft, enabled: bool) -> Self {
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            author: draft.author.clone(),
            editing: draft.is_editing(),
            submit_label: if draft.is_editing() {
                UPDATE_LABEL
            } else {
                ADD_LABEL
            }
            .to_string(),
            enabled,
        }
    }

    fn value(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::Author => &self.author,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(from_wasm_abi))]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Intent {
    SetField { field: Field, value: String },
    StartEdit { id: String },
    Cancel,
    Submit,
    Delete { id: String },
    SignOut,
}

impl Intent {
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        serde_json::from_str(json).map_err(|e| AppError::Intent(e.to_string()))
    }
}

pub fn build(
    session: &Session,
    posts: &im::Vector<Post>,
    posts_loading: bool,
    draft: &Draft,
    notice: Option<&AppError>,
) -> ViewModel {
    let body = match session.status() {
        SessionStatus::Unauthenticated | SessionStatus::Authenticating => Body::Loading,
        SessionStatus::Failed => Body::Empty,
        SessionStatus::Authenticated if posts_loading => Body::Loading,
        SessionStatus::Authenticated if posts.is_empty() => Body::Empty,
        SessionStatus::Authenticated => Body::Posts {
            posts: posts.iter().map(PostCard::from).collect(),
        },
    };

    ViewModel {
        user_id: session.user_id().map(ToString::to_string),
        status: session.status(),
        body,
        form: FormView::new(draft, session.status() == SessionStatus::Authenticated),
        notice: notice
            .map(ToString::to_string)
            .or_else(|| session.error().map(ToString::to_string)),
    }
}

fn text(s: &str) -> String {
    html_escape::encode_text(s).into_owned()
}

fn attr(s: &str) -> String {
    html_escape::encode_double_quoted_attribute(s).into_owned()
}

pub fn render_html(view: &ViewModel) -> String {
    let mut html = String::from("<main class=\"blog\">\n<header>\n<h1>Blog Posts</h1>\n");
    match &view.user_id {
        Some(user_id) => {
            html.push_str(&format!(
                "<p class=\"user\">Signed in as <code>{}</code></p>\n",
                text(user_id)
            ));
            html.push_str("<button type=\"button\" data-intent=\"signOut\">Sign out</button>\n");
        }
        None => html.push_str("<p class=\"user\">Not signed in</p>\n"),
    }
    html.push_str("</header>\n");

    if let Some(notice) = &view.notice {
        html.push_str(&format!(
            "<p class=\"notice\" role=\"alert\">{}</p>\n",
            text(notice)
        ));
    }

    render_form(&mut html, &view.form);

    html.push_str("<section class=\"posts\">\n");
    match &view.body {
        Body::Loading => html.push_str("<p class=\"loading\">Loading posts...</p>\n"),
        Body::Empty => html.push_str("<p class=\"empty\">No posts yet.</p>\n"),
        Body::Posts { posts } => {
            html.push_str("<ul>\n");
            for post in posts {
                render_card(&mut html, post);
            }
            html.push_str("</ul>\n");
        }
    }
    html.push_str("</section>\n</main>\n");
    html
}

fn render_form(html: &mut String, form: &FormView) {
    let disabled = if form.enabled { "" } else { " disabled" };
    html.push_str("<form class=\"post-form\" data-intent=\"submit\">\n");
    for field in Field::ALL {
        let value = form.value(field);
        let control = match field {
            Field::Description => format!(
                "<textarea name=\"{name}\" data-intent=\"setField\" data-field=\"{name}\"{disabled}>{}</textarea>",
                text(value),
                name = field.name(),
            ),
            Field::Title | Field::Author => format!(
                "<input name=\"{name}\" data-intent=\"setField\" data-field=\"{name}\" value=\"{}\"{disabled}>",
                attr(value),
                name = field.name(),
            ),
        };
        html.push_str(&format!("<label>{field} {control}</label>\n"));
    }
    html.push_str(&format!(
        "<button type=\"submit\"{disabled}>{}</button>\n",
        text(&form.submit_label)
    ));
    if form.editing {
        html.push_str("<button type=\"button\" data-intent=\"cancel\">Cancel</button>\n");
    }
    html.push_str("</form>\n");
}

fn render_card(html: &mut String, post: &PostCard) {
    let id = attr(&post.id);
    let pending = if post.pending {
        " <span class=\"pending\">(saving)</span>"
    } else {
        ""
    };
    html.push_str(&format!(
        "<li class=\"post\" data-id=\"{id}\">\n<h2>{}</h2>\n<p>{}</p>\n<p class=\"meta\">By {} on <time>{}</time>{pending}</p>\n",
        text(&post.title),
        text(&post.description),
        text(&post.author),
        text(&post.created_at),
    ));
    html.push_str(&format!(
        "<button type=\"button\" data-intent=\"startEdit\" data-id=\"{id}\">Edit</button>\n<button type=\"button\" data-intent=\"delete\" data-id=\"{id}\">Delete</button>\n</li>\n"
    ));
}
