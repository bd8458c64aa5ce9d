pub mod config;
pub mod error;
pub mod post_form;
pub mod post_list;
pub mod session;
pub mod timeout;
pub mod timestamps;
mod utils;
pub mod view;
#[cfg(target_arch = "wasm32")]
mod web;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::LazyLock;

use docsync::{IdentityProvider, RemoteStore};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub use config::{AppConfig, BackendCredentials, Timeouts};
pub use error::{
    ActionError, AppError, AuthError, ConfigError, SubscriptionError, ValidationError, WriteError,
};
pub use post_form::{Draft, Field, PostFormController, Submitted};
pub use post_list::{Post, PostFields, PostListStore};
pub use session::{Session, SessionController, SessionStatus};
pub use timeout::{Timer, default_timer};
pub use view::{Intent, ViewModel};

// putting this inside LOGGER prevents us from accidentally initializing the logger more than once
static LOGGER: LazyLock<()> = LazyLock::new(|| {
    utils::set_panic_hook();
    utils::init_logger();
    log::info!("Logging initialized");
});

/// The whole client: session, post list and form wired into one loop.
///
/// Identity events are only handled when the host pumps them with [`BlogApp::process_auth_events`] or
/// [`BlogApp::run`]. After each batch the post list is pointed at whoever is signed in.
pub struct BlogApp<P, S> {
    config: AppConfig,
    session: SessionController<P>,
    posts: PostListStore<S>,
    form: PostFormController<S>,
    // btw, we never hold a borrow of this across an .await
    notice: RefCell<Option<AppError>>,
}

impl<P: IdentityProvider, S: RemoteStore<PostFields>> BlogApp<P, S> {
    /// Uses [`default_timer`]. Natively that is tokio's timer, so drive the app inside a tokio runtime.
    pub fn new(config: AppConfig, identity: Rc<P>, store: Rc<S>) -> Result<Self, AppError> {
        Self::with_timer(config, identity, store, default_timer())
    }

    pub fn with_timer(
        config: AppConfig,
        identity: Rc<P>,
        store: Rc<S>,
        timer: Rc<dyn Timer>,
    ) -> Result<Self, AppError> {
        LazyLock::force(&LOGGER);

        config.validate().inspect_err(|e| {
            log::error!("Refusing to start: {e}");
        })?;
        log::info!("Starting blog client for application {}", config.application_id);

        let session = SessionController::activate(
            identity,
            config.bootstrap_token.clone(),
            config.timeouts.auth,
            timer.clone(),
        );
        let posts = PostListStore::new(
            store.clone(),
            config.application_id.clone(),
            config.timeouts.write,
            timer.clone(),
        );
        let form = PostFormController::new(
            store,
            config.application_id.clone(),
            config.timeouts.write,
            timer,
        );

        Ok(Self {
            config,
            session,
            posts,
            form,
            notice: RefCell::new(None),
        })
    }

    /// Handles every identity event that has arrived, then updates the post subscription.
    pub async fn process_auth_events(&self) -> usize {
        let handled = self.session.process_pending().await;
        self.sync_effects();
        handled
    }

    /// Handles identity events as they arrive, until the provider goes away.
    pub async fn run(&self) {
        while self.session.process_next().await {
            self.session.process_pending().await;
            self.sync_effects();
        }
        log::info!("Identity provider closed, event loop finished");
    }

    fn sync_effects(&self) {
        let session = self.session.session();
        match (session.status(), session.user_id()) {
            (SessionStatus::Authenticated, Some(user)) => {
                self.clear_auth_notice();
                if self.posts.active_user().as_ref() == Some(user) {
                    return;
                }
                // an edit in progress belongs to the previous user's posts
                if self.form.draft().is_editing() {
                    self.form.cancel();
                }
                if let Err(e) = self.posts.activate(user) {
                    self.set_notice(e.into());
                }
            }
            (SessionStatus::Failed, _) => {
                self.posts.deactivate();
                if let Some(e) = session.error() {
                    self.set_notice(e.clone().into());
                }
            }
            _ => self.posts.deactivate(),
        }
    }

    fn set_notice(&self, error: AppError) {
        self.notice.replace(Some(error));
    }

    fn clear_auth_notice(&self) {
        let mut notice = self.notice.borrow_mut();
        if matches!(*notice, Some(AppError::Auth(_))) {
            *notice = None;
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> Session {
        self.session.session()
    }

    pub fn posts(&self) -> im::Vector<Post> {
        self.posts.current_list()
    }

    pub fn is_loading(&self) -> bool {
        self.session.session().is_resolving() || self.posts.is_loading()
    }

    pub fn draft(&self) -> Draft {
        self.form.draft()
    }

    /// The last reported error, if nothing succeeded since.
    pub fn notice(&self) -> Option<AppError> {
        self.notice
            .borrow()
            .clone()
            .or_else(|| self.posts.last_error().map(AppError::from))
    }

    pub fn set_field(&self, field: Field, value: impl Into<String>) {
        self.form.set_field(field, value);
    }

    pub fn start_edit(&self, id: &str) -> Result<(), AppError> {
        let post = self
            .posts
            .find(id)
            .ok_or_else(|| AppError::UnknownPost(id.to_string()))?;
        self.form.start_edit(&post);
        Ok(())
    }

    pub fn cancel(&self) {
        self.form.cancel();
    }

    pub async fn submit(&self) -> Result<Submitted, AppError> {
        let user = self.session.user_id();
        Ok(self.form.submit(user.as_ref()).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let post = self
            .posts
            .find(id)
            .ok_or_else(|| AppError::UnknownPost(id.to_string()))?;
        let user = self.session.user_id();
        Ok(self.posts.delete(user.as_ref(), &post.id).await?)
    }

    /// Signs out and handles the resulting identity events. Unless sign-in is impossible, this ends
    /// with a fresh session.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.session.sign_out().await?;
        self.process_auth_events().await;
        Ok(())
    }

    /// Runs a user action. Failures become the notice, success clears it.
    pub async fn dispatch(&self, intent: Intent) -> Result<(), AppError> {
        log::debug!("Dispatching {intent:?}");
        let result = match intent {
            Intent::SetField { field, value } => {
                self.set_field(field, value);
                Ok(())
            }
            Intent::StartEdit { id } => self.start_edit(&id),
            Intent::Cancel => {
                self.cancel();
                Ok(())
            }
            Intent::Submit => self.submit().await.map(|_| ()),
            Intent::Delete { id } => self.delete(&id).await,
            Intent::SignOut => self.sign_out().await,
        };
        match &result {
            Ok(()) => {
                self.notice.replace(None);
            }
            Err(e) => {
                log::warn!("Action failed: {e}");
                self.set_notice(e.clone());
            }
        }
        result
    }

    pub async fn dispatch_json(&self, json: &str) -> Result<(), AppError> {
        let intent = Intent::from_json(json).inspect_err(|e| self.set_notice(e.clone()))?;
        self.dispatch(intent).await
    }

    pub fn view(&self) -> ViewModel {
        let notice = self.notice();
        view::build(
            &self.session.session(),
            &self.posts.current_list(),
            self.posts.is_loading(),
            &self.form.draft(),
            notice.as_ref(),
        )
    }

    pub fn render(&self) -> String {
        view::render_html(&self.view())
    }

    pub fn shutdown(&self) {
        self.session.shutdown();
        self.posts.deactivate();
    }
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
pub fn get_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post_list::posts_collection;
    use crate::timeout::tests::{ExpiredTimer, NeverTimer};
    use crate::view::Body;
    use chrono::{TimeZone, Utc};
    use docsync::memory::{MemoryIdentity, MemoryStore, WriteRecord};
    use docsync::{ServerTimestamp, StoreError, UserId};
    use futures::executor::block_on;

    type TestApp = BlogApp<MemoryIdentity, MemoryStore<PostFields>>;

    fn credentials() -> BackendCredentials {
        BackendCredentials {
            api_key: "key".into(),
            project_id: "project".into(),
            auth_domain: None,
        }
    }

    fn start(
        token: Option<&str>,
        timer: Rc<dyn Timer>,
    ) -> (TestApp, Rc<MemoryIdentity>, Rc<MemoryStore<PostFields>>) {
        let identity = Rc::new(MemoryIdentity::new());
        identity.accept_token("token-u1", UserId::new("u1"));
        let store = Rc::new(MemoryStore::new());
        let config =
            AppConfig::new("app1", credentials()).with_bootstrap_token(token.map(str::to_string));
        let app = BlogApp::with_timer(config, identity.clone(), store.clone(), timer).unwrap();
        block_on(app.process_auth_events());
        (app, identity, store)
    }

    fn start_as_u1() -> (TestApp, Rc<MemoryIdentity>, Rc<MemoryStore<PostFields>>) {
        start(Some("token-u1"), Rc::new(NeverTimer))
    }

    fn fields(title: &str, description: &str, author: &str) -> PostFields {
        PostFields {
            title: title.into(),
            description: description.into(),
            author: author.into(),
        }
    }

    fn resolved(secs: i64) -> ServerTimestamp {
        ServerTimestamp::Resolved(Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn u1_posts() -> docsync::CollectionPath {
        posts_collection("app1", &UserId::new("u1")).unwrap()
    }

    fn titles(app: &TestApp) -> Vec<String> {
        app.posts().iter().map(|post| post.title.clone()).collect()
    }

    fn fill(app: &TestApp, title: &str, description: &str, author: &str) {
        for (field, value) in [
            (Field::Title, title),
            (Field::Description, description),
            (Field::Author, author),
        ] {
            block_on(app.dispatch(Intent::SetField {
                field,
                value: value.into(),
            }))
            .unwrap();
        }
    }

    #[test]
    fn test_invalid_config_never_starts() {
        let config = AppConfig::new("", credentials());
        let result = BlogApp::new(
            config,
            Rc::new(MemoryIdentity::new()),
            Rc::new(MemoryStore::<PostFields>::new()),
        );
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::Missing(_)))
        ));
    }

    #[test]
    fn test_signs_in_and_subscribes() {
        let (app, identity, store) = start_as_u1();

        assert_eq!(app.session().status(), SessionStatus::Authenticated);
        assert_eq!(app.session().user_id(), Some(&UserId::new("u1")));
        assert_eq!(identity.listener_count(), 1);
        assert_eq!(store.listener_count(&u1_posts()), 1);
        assert!(!app.is_loading());
        assert_eq!(app.view().body, Body::Empty);
    }

    #[test]
    fn test_create_scenario() {
        let (app, _identity, store) = start_as_u1();
        store
            .seed(&u1_posts(), fields("Older", "post", "Bob"), resolved(10))
            .unwrap();

        fill(&app, "Hello", "World", "Ada");
        block_on(app.dispatch(Intent::Submit)).unwrap();

        let log = store.write_log();
        assert_eq!(log.len(), 1);
        assert!(matches!(
            &log[0],
            WriteRecord::Create { collection, fields: sent, .. }
                if collection.to_string() == "artifacts/app1/users/u1/blog_posts"
                    && *sent == fields("Hello", "World", "Ada")
        ));

        let posts = app.posts();
        assert_eq!(titles(&app), vec!["Hello", "Older"]);
        assert!(!posts[0].created_at.is_pending());
        assert_eq!(app.draft(), Draft::default());

        let Body::Posts { posts: cards } = app.view().body else {
            panic!("expected posts");
        };
        assert_eq!(cards[0].title, "Hello");
    }

    #[test]
    fn test_pending_post_shows_first_until_stamped() {
        let (app, _identity, store) = start_as_u1();
        store
            .seed(&u1_posts(), fields("Future", "clock", "Bob"), resolved(4_000_000_000))
            .unwrap();
        store.hold_server_timestamps(true);

        fill(&app, "Hello", "World", "Ada");
        block_on(app.submit()).unwrap();

        assert_eq!(titles(&app), vec!["Hello", "Future"]);
        assert!(app.posts()[0].created_at.is_pending());
        let Body::Posts { posts: cards } = app.view().body else {
            panic!("expected posts");
        };
        assert!(cards[0].pending);

        store.resolve_server_timestamps();
        assert!(!app.posts().iter().any(|post| post.created_at.is_pending()));
        assert_eq!(titles(&app), vec!["Future", "Hello"]);
    }

    #[test]
    fn test_validation_makes_no_call() {
        let (app, _identity, store) = start_as_u1();
        fill(&app, "Hello", "", "Ada");

        let result = block_on(app.dispatch(Intent::Submit));

        assert_eq!(
            result,
            Err(AppError::Validation(ValidationError::EmptyField(
                Field::Description
            )))
        );
        assert!(store.write_log().is_empty());
        assert_eq!(app.notice(), result.err());
        assert_eq!(app.draft().title, "Hello");
    }

    #[test]
    fn test_failed_delete_scenario() {
        let (app, _identity, store) = start_as_u1();
        let id = store
            .seed(&u1_posts(), fields("Keep", "me", "Ada"), resolved(10))
            .unwrap();
        store.fail_next_write(StoreError::Unavailable("network down".into()));

        let result = block_on(app.dispatch(Intent::Delete { id: id.to_string() }));

        let expected = AppError::Write(WriteError::Rejected(StoreError::Unavailable(
            "network down".into(),
        )));
        assert_eq!(result, Err(expected.clone()));
        assert_eq!(titles(&app), vec!["Keep"]);
        assert_eq!(app.notice(), Some(expected.clone()));
        assert_eq!(app.view().notice, Some(expected.to_string()));

        // the next successful action clears the notice
        block_on(app.dispatch(Intent::Delete { id: id.to_string() })).unwrap();
        assert!(app.posts().is_empty());
        assert_eq!(app.notice(), None);
    }

    #[test]
    fn test_edit_scenario() {
        let (app, _identity, store) = start_as_u1();
        let created_at = resolved(10);
        let id = store
            .seed(&u1_posts(), fields("Hello", "World", "Ada"), created_at)
            .unwrap();

        block_on(app.dispatch(Intent::StartEdit { id: id.to_string() })).unwrap();
        assert_eq!(app.view().form.submit_label, view::UPDATE_LABEL);
        block_on(app.dispatch(Intent::SetField {
            field: Field::Description,
            value: "Everyone".into(),
        }))
        .unwrap();
        block_on(app.dispatch(Intent::Submit)).unwrap();

        assert_eq!(
            store.write_log(),
            vec![WriteRecord::Update {
                document: u1_posts().document(&id),
                fields: fields("Hello", "Everyone", "Ada"),
            }]
        );
        assert_eq!(app.draft(), Draft::default());
        let posts = app.posts();
        let post = &posts[0];
        assert_eq!(post.id, id);
        assert_eq!(post.description, "Everyone");
        assert_eq!(post.created_at, created_at);
    }

    #[test]
    fn test_unknown_post() {
        let (app, _identity, store) = start_as_u1();
        assert_eq!(
            block_on(app.dispatch(Intent::StartEdit { id: "nope".into() })),
            Err(AppError::UnknownPost("nope".into()))
        );
        assert_eq!(
            block_on(app.delete("nope")),
            Err(AppError::UnknownPost("nope".into()))
        );
        assert!(store.write_log().is_empty());
    }

    #[test]
    fn test_user_switch_does_not_leak() {
        let (app, identity, store) = start_as_u1();
        let u2_posts = posts_collection("app1", &UserId::new("u2")).unwrap();
        let id = store
            .seed(&u1_posts(), fields("Mine", "u1", "Ada"), resolved(10))
            .unwrap();
        block_on(app.dispatch(Intent::StartEdit { id: id.to_string() })).unwrap();

        identity.force_user(Some(UserId::new("u2")));
        block_on(app.process_auth_events());

        assert_eq!(app.session().user_id(), Some(&UserId::new("u2")));
        assert_eq!(store.listener_count(&u1_posts()), 0);
        assert_eq!(store.listener_count(&u2_posts), 1);
        assert!(app.posts().is_empty());
        assert!(!app.draft().is_editing());

        store
            .seed(&u1_posts(), fields("Late", "u1", "Ada"), resolved(20))
            .unwrap();
        assert!(app.posts().is_empty());

        store
            .seed(&u2_posts, fields("Theirs", "u2", "Bo"), resolved(30))
            .unwrap();
        assert_eq!(titles(&app), vec!["Theirs"]);
    }

    #[test]
    fn test_sign_out_starts_a_new_anonymous_session() {
        let (app, _identity, store) = start(None, Rc::new(NeverTimer));
        let first = app.session().user_id().cloned().unwrap();
        let first_posts = posts_collection("app1", &first).unwrap();
        store
            .seed(&first_posts, fields("Old", "session", "Ada"), resolved(10))
            .unwrap();
        assert_eq!(titles(&app), vec!["Old"]);

        block_on(app.dispatch(Intent::SignOut)).unwrap();

        let second = app.session().user_id().cloned().unwrap();
        assert_ne!(first, second);
        assert_eq!(store.listener_count(&first_posts), 0);
        assert!(app.posts().is_empty());
    }

    #[test]
    fn test_auth_failure_degrades() {
        let (app, identity, store) = start(Some("stale"), Rc::new(NeverTimer));

        let session = app.session();
        assert_eq!(session.status(), SessionStatus::Failed);
        assert_eq!(session.user_id(), None);
        assert!(!app.is_loading());
        assert_eq!(store.listener_count(&u1_posts()), 0);
        assert_eq!(identity.sign_in_attempts(), 1);

        let view = app.view();
        assert_eq!(view.body, Body::Empty);
        assert!(matches!(app.notice(), Some(AppError::Auth(_))));
        assert!(view.notice.is_some());

        fill(&app, "Hello", "World", "Ada");
        assert_eq!(
            block_on(app.submit()),
            Err(AppError::Validation(ValidationError::NotAuthenticated))
        );
        assert!(store.write_log().is_empty());
    }

    #[test]
    fn test_sign_in_after_failure_clears_auth_notice() {
        let (app, identity, store) = start(Some("stale"), Rc::new(NeverTimer));
        assert!(matches!(app.notice(), Some(AppError::Auth(_))));

        identity.force_user(Some(UserId::new("u1")));
        block_on(app.process_auth_events());

        assert_eq!(app.session().status(), SessionStatus::Authenticated);
        assert_eq!(app.notice(), None);
        assert_eq!(app.view().notice, None);
        assert_eq!(store.listener_count(&u1_posts()), 1);
    }

    #[test]
    fn test_hung_write_times_out() {
        let (app, _identity, store) = start(Some("token-u1"), Rc::new(ExpiredTimer));
        assert_eq!(app.session().status(), SessionStatus::Authenticated);
        store.hang_writes(true);

        fill(&app, "Hello", "World", "Ada");
        let result = block_on(app.submit());

        assert_eq!(
            result,
            Err(AppError::Write(WriteError::TimedOut(
                Timeouts::default().write
            )))
        );
        assert_eq!(app.draft().title, "Hello");
        assert!(app.posts().is_empty());
    }

    #[test]
    fn test_broken_subscription_is_reported() {
        let (app, _identity, store) = start_as_u1();
        store
            .seed(&u1_posts(), fields("Kept", "list", "Ada"), resolved(10))
            .unwrap();
        store.break_subscriptions(&u1_posts(), StoreError::Unavailable("gone".into()));

        assert_eq!(titles(&app), vec!["Kept"]);
        assert!(!app.is_loading());
        assert!(matches!(
            app.notice(),
            Some(AppError::Subscription(SubscriptionError::Broken(_)))
        ));
    }

    #[test]
    fn test_dispatch_json() {
        let (app, _identity, _store) = start_as_u1();
        assert!(matches!(
            block_on(app.dispatch_json("{not json")),
            Err(AppError::Intent(_))
        ));
        assert!(matches!(app.notice(), Some(AppError::Intent(_))));

        block_on(app.dispatch_json(r#"{"type":"setField","field":"author","value":"Ada"}"#))
            .unwrap();
        assert_eq!(app.draft().author, "Ada");
        assert_eq!(app.notice(), None);
        assert!(app.render().contains("value=\"Ada\""));
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let (app, identity, store) = start_as_u1();
        app.shutdown();
        assert_eq!(identity.listener_count(), 0);
        assert_eq!(store.listener_count(&u1_posts()), 0);
    }

    #[test]
    fn test_run_stops_when_provider_is_gone() {
        let (app, _identity, _store) = start_as_u1();
        // dropping the registration closes the event channel
        app.shutdown();
        block_on(app.run());
    }

    #[test]
    fn test_get_app_version() {
        assert_eq!(get_app_version(), env!("CARGO_PKG_VERSION"));
    }
}
