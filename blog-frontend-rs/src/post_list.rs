use std::cell::RefCell;
use std::cmp::Ordering;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;

use docsync::{
    CollectionPath, Document, DocumentId, PathError, RemoteStore, ServerTimestamp, Snapshot,
    StoreError, Subscription, UserId,
};

use crate::error::{ActionError, SubscriptionError, ValidationError, WriteError};
use crate::timeout::{Elapsed, Timer, with_timeout};

pub const POSTS_COLLECTION: &str = "blog_posts";

/// The three user-editable fields, exactly what is sent to the store on create and update.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PostFields {
    pub title: String,
    pub description: String,
    pub author: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: DocumentId,
    pub title: String,
    pub description: String,
    pub author: String,
    pub created_at: ServerTimestamp,
}

impl From<Document<PostFields>> for Post {
    fn from(document: Document<PostFields>) -> Self {
        let PostFields {
            title,
            description,
            author,
        } = document.fields;
        Self {
            id: document.id,
            title,
            description,
            author,
            created_at: document.created_at,
        }
    }
}

/// `artifacts/{application}/users/{user}/blog_posts`
pub fn posts_collection(
    application_id: &str,
    user: &UserId,
) -> Result<CollectionPath, PathError> {
    CollectionPath::user_collection(application_id, user.as_str(), POSTS_COLLECTION)
}

/// Newest first with pending posts on top. Equal timestamps fall back to the id so the order is total.
pub fn newest_first(a: &Post, b: &Post) -> Ordering {
    a.created_at
        .cmp_newest_first(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

fn sorted_posts(snapshot: Snapshot<PostFields>) -> im::Vector<Post> {
    let mut posts: Vec<Post> = snapshot.into_iter().map(Post::from).collect();
    posts.sort_by(newest_first);
    posts.into_iter().collect()
}

struct ListState {
    /// Collection whose events are accepted. Anything else is from a closed scope.
    scope: Option<CollectionPath>,
    posts: im::Vector<Post>,
    loading: bool,
    error: Option<SubscriptionError>,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            scope: None,
            posts: im::Vector::new(),
            loading: true,
            error: None,
        }
    }
}

struct ActiveScope {
    user: UserId,
    collection: CollectionPath,
    /// `None` when the store refused to subscribe. The scope stays so the refusal is not retried.
    _subscription: Option<Subscription>,
}

/// Mirror of the signed in user's posts.
///
/// At most one subscription is open at a time. Changing scope drops the old [`Subscription`] before the
/// new one is requested, and callbacks compare their collection against the current scope so a late
/// event from a closed scope is discarded.
pub struct PostListStore<S> {
    store: Rc<S>,
    application_id: String,
    write_timeout: Duration,
    timer: Rc<dyn Timer>,
    state: Rc<RefCell<ListState>>,
    active: RefCell<Option<ActiveScope>>,
}

impl<S: RemoteStore<PostFields>> PostListStore<S> {
    pub fn new(
        store: Rc<S>,
        application_id: impl Into<String>,
        write_timeout: Duration,
        timer: Rc<dyn Timer>,
    ) -> Self {
        Self {
            store,
            application_id: application_id.into(),
            write_timeout,
            timer,
            state: Rc::new(RefCell::new(ListState::default())),
            active: RefCell::new(None),
        }
    }

    /// Starts mirroring `user`'s posts. Does nothing if that user is already active.
    pub fn activate(&self, user: &UserId) -> Result<(), SubscriptionError> {
        if self.active_user().as_ref() == Some(user) {
            return Ok(());
        }
        self.deactivate();

        let collection = posts_collection(&self.application_id, user)?;
        {
            let mut state = self.state.borrow_mut();
            *state = ListState {
                scope: Some(collection.clone()),
                ..ListState::default()
            };
        }

        log::info!("Subscribing to {collection}");
        let subscribed = self.store.subscribe(
            &collection,
            Box::new(on_snapshot(Rc::downgrade(&self.state), collection.clone())),
            Box::new(on_error(Rc::downgrade(&self.state), collection.clone())),
        );

        let (subscription, result) = match subscribed {
            Ok(subscription) => (Some(subscription), Ok(())),
            Err(e) => {
                log::error!("Could not subscribe to {collection}: {e}");
                let error = SubscriptionError::Refused(e);
                let mut state = self.state.borrow_mut();
                state.loading = false;
                state.error = Some(error.clone());
                (None, Err(error))
            }
        };
        self.active.replace(Some(ActiveScope {
            user: user.clone(),
            collection,
            _subscription: subscription,
        }));
        result
    }

    /// Closes the subscription, if any, and forgets the list.
    pub fn deactivate(&self) {
        let previous = self.active.borrow_mut().take();
        if let Some(previous) = previous {
            log::info!("Unsubscribing from {}", previous.collection);
            drop(previous);
        }
        *self.state.borrow_mut() = ListState {
            loading: false,
            ..ListState::default()
        };
    }

    pub fn current_list(&self) -> im::Vector<Post> {
        self.state.borrow().posts.clone()
    }

    /// True until the first snapshot of the current scope arrives or subscribing fails.
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn last_error(&self) -> Option<SubscriptionError> {
        self.state.borrow().error.clone()
    }

    pub fn active_user(&self) -> Option<UserId> {
        self.active.borrow().as_ref().map(|active| active.user.clone())
    }

    pub fn find(&self, id: &str) -> Option<Post> {
        self.state
            .borrow()
            .posts
            .iter()
            .find(|post| post.id.as_str() == id)
            .cloned()
    }

    /// Asks the store to delete the post. The list only changes once a snapshot without it arrives.
    pub async fn delete(&self, user: Option<&UserId>, id: &DocumentId) -> Result<(), ActionError> {
        let user = user.ok_or(ValidationError::NotAuthenticated)?;
        let document = posts_collection(&self.application_id, user)
            .map_err(WriteError::from)?
            .document(id);

        log::info!("Deleting {document}");
        let result =
            bounded_write(&*self.timer, self.write_timeout, self.store.delete(&document)).await;
        if let Err(e) = &result {
            log::error!("Delete of {document} failed: {e}");
        }
        Ok(result?)
    }
}

fn on_snapshot(
    state: Weak<RefCell<ListState>>,
    scope: CollectionPath,
) -> impl Fn(Snapshot<PostFields>) {
    move |snapshot| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = state.borrow_mut();
        if state.scope.as_ref() != Some(&scope) || snapshot.collection != scope {
            log::debug!("Ignoring snapshot of closed scope {}", snapshot.collection);
            return;
        }
        log::debug!("Snapshot of {scope}: {} post(s)", snapshot.len());
        state.posts = sorted_posts(snapshot);
        state.loading = false;
    }
}

fn on_error(state: Weak<RefCell<ListState>>, scope: CollectionPath) -> impl Fn(StoreError) {
    move |e| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = state.borrow_mut();
        if state.scope.as_ref() != Some(&scope) {
            return;
        }
        log::error!("Live updates of {scope} stopped: {e}");
        state.loading = false;
        state.error = Some(SubscriptionError::Broken(e));
    }
}

/// Runs a store write under `timeout`.
pub(crate) async fn bounded_write<T>(
    timer: &dyn Timer,
    timeout: Duration,
    write: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, WriteError> {
    match with_timeout(timer, timeout, write).await {
        Ok(result) => Ok(result?),
        Err(Elapsed(after)) => Err(WriteError::TimedOut(after)),
    }
}
