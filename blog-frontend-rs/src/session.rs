use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use docsync::{IdentityProvider, Subscription, UserId};
use futures::{FutureExt, StreamExt};
use futures::channel::mpsc::{UnboundedReceiver, unbounded};

use crate::error::AuthError;
use crate::timeout::{Elapsed, Timer, with_timeout};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(target_arch = "wasm32", derive(tsify::Tsify))]
#[cfg_attr(target_arch = "wasm32", tsify(into_wasm_abi))]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Failed,
}

/// Who is signed in. A user id is present exactly when the status is `Authenticated`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    user_id: Option<UserId>,
    status: SessionStatus,
    error: Option<AuthError>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            user_id: None,
            status: SessionStatus::Unauthenticated,
            error: None,
        }
    }
}

impl Session {
    fn authenticating() -> Self {
        Self {
            status: SessionStatus::Authenticating,
            ..Self::default()
        }
    }

    fn authenticated(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            status: SessionStatus::Authenticated,
            error: None,
        }
    }

    fn failed(error: AuthError) -> Self {
        Self {
            user_id: None,
            status: SessionStatus::Failed,
            error: Some(error),
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn error(&self) -> Option<&AuthError> {
        self.error.as_ref()
    }

    /// Still waiting to learn who the user is.
    pub fn is_resolving(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Unauthenticated | SessionStatus::Authenticating
        )
    }
}

/// Owns the authentication lifecycle.
///
/// Identity events from the provider are queued as they arrive and handled in order by
/// [`SessionController::process_pending`] or [`SessionController::process_next`]. An event without a
/// user starts exactly one sign-in attempt. A failed attempt is final until the provider reports the
/// user as absent again.
pub struct SessionController<P> {
    provider: Rc<P>,
    bootstrap_token: Option<String>,
    auth_timeout: Duration,
    timer: Rc<dyn Timer>,
    session: RefCell<Session>,
    events: RefCell<UnboundedReceiver<Option<UserId>>>,
    registration: RefCell<Option<Subscription>>,
}

impl<P: IdentityProvider> SessionController<P> {
    pub fn activate(
        provider: Rc<P>,
        bootstrap_token: Option<String>,
        auth_timeout: Duration,
        timer: Rc<dyn Timer>,
    ) -> Self {
        let (tx, rx) = unbounded();
        let registration = provider.on_state_change(Box::new(move |user| {
            if tx.unbounded_send(user).is_err() {
                log::debug!("Session controller is gone, dropping identity event");
            }
        }));

        Self {
            provider,
            bootstrap_token,
            auth_timeout,
            timer,
            session: RefCell::new(Session::default()),
            events: RefCell::new(rx),
            registration: RefCell::new(Some(registration)),
        }
    }

    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.session.borrow().user_id.clone()
    }

    /// Handles every queued identity event, including the ones caused by its own sign-in attempts.
    /// Returns how many were handled.
    pub async fn process_pending(&self) -> usize {
        let mut handled = 0;
        loop {
            // None if nothing is queued, Some(None) once the provider dropped its end
            let next = self.events.borrow_mut().next().now_or_never();
            let Some(Some(event)) = next else {
                break;
            };
            self.handle_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Waits for the next identity event and handles it. Returns false once no more can arrive.
    pub async fn process_next(&self) -> bool {
        let next =
            futures::future::poll_fn(|cx| self.events.borrow_mut().poll_next_unpin(cx)).await;
        match next {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        log::info!("Signing out");
        with_timeout(&*self.timer, self.auth_timeout, self.provider.sign_out())
            .await
            .map_err(|Elapsed(after)| AuthError::TimedOut(after))??;
        Ok(())
    }

    /// Stops listening to the provider. Events that already arrived can still be processed.
    pub fn shutdown(&self) {
        if let Some(registration) = self.registration.borrow_mut().take() {
            log::info!("Session controller shutting down");
            registration.cancel();
        }
    }

    async fn handle_event(&self, user: Option<UserId>) {
        if let Some(user) = user {
            log::info!("Signed in as {user}");
            self.session.replace(Session::authenticated(user));
            return;
        }

        self.session.replace(Session::authenticating());
        match self.sign_in().await {
            Ok(user) => {
                // the provider echoes the identity as an event too, handling it again is harmless
                if self.session.borrow().status == SessionStatus::Authenticating {
                    self.session.replace(Session::authenticated(user));
                }
            }
            Err(error) => {
                log::error!("Sign-in failed: {error}");
                self.session.replace(Session::failed(error));
            }
        }
    }

    async fn sign_in(&self) -> Result<UserId, AuthError> {
        let attempt = async {
            match &self.bootstrap_token {
                Some(token) => {
                    log::info!("Signing in with bootstrap token");
                    self.provider.sign_in_with_token(token).await
                }
                None => {
                    log::info!("Signing in anonymously");
                    self.provider.sign_in_anonymously().await
                }
            }
        };
        let user = with_timeout(&*self.timer, self.auth_timeout, attempt)
            .await
            .map_err(|Elapsed(after)| AuthError::TimedOut(after))??;
        Ok(user)
    }
}

impl<P> Drop for SessionController<P> {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.get_mut().take() {
            registration.cancel();
        }
    }
}
