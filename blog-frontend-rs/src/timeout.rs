//! Every call into the hosted services is raced against a timer, so a hung request ends in a reported
//! error instead of an endless spinner.

use std::future::Future;
use std::time::Duration;

use futures::future::{self, Either, LocalBoxFuture};

pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed(pub Duration);

pub async fn with_timeout<T>(
    timer: &dyn Timer,
    duration: Duration,
    operation: impl Future<Output = T>,
) -> Result<T, Elapsed> {
    let operation = std::pin::pin!(operation);
    match future::select(operation, timer.sleep(duration)).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(Elapsed(duration)),
    }
}

/// Backed by the tokio timer wheel, so it needs to be polled inside a tokio runtime. Dropping the
/// sleep removes its timer entry.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioTimer;

#[cfg(not(target_arch = "wasm32"))]
impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Backed by `window.setTimeout`.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowTimer;

#[cfg(target_arch = "wasm32")]
impl Timer for WindowTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = duration.as_millis().min(i32::MAX as u128) as i32;
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            if let Some(window) = web_sys::window() {
                if let Err(e) = window
                    .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, millis)
                {
                    log::error!("setTimeout failed: {e:?}");
                }
            }
        });
        Box::pin(async move {
            let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
        })
    }
}

pub fn default_timer() -> std::rc::Rc<dyn Timer> {
    #[cfg(target_arch = "wasm32")]
    {
        std::rc::Rc::new(WindowTimer)
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        std::rc::Rc::new(TokioTimer)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Expires immediately.
    pub(crate) struct ExpiredTimer;

    impl Timer for ExpiredTimer {
        fn sleep(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
            Box::pin(future::ready(()))
        }
    }

    /// Never expires.
    pub(crate) struct NeverTimer;

    impl Timer for NeverTimer {
        fn sleep(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
            Box::pin(future::pending())
        }
    }

    #[test]
    fn test_ready_operation_wins() {
        let result = block_on(with_timeout(
            &ExpiredTimer,
            Duration::from_secs(1),
            future::ready(7),
        ));
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn test_hung_operation_times_out() {
        let result = block_on(with_timeout(
            &ExpiredTimer,
            Duration::from_secs(1),
            future::pending::<u32>(),
        ));
        assert_eq!(result, Err(Elapsed(Duration::from_secs(1))));
    }

    #[test]
    fn test_finished_operation_drops_the_sleep() {
        struct TrackedTimer(Rc<Cell<bool>>);

        struct Sleeping(Rc<Cell<bool>>);

        impl Drop for Sleeping {
            fn drop(&mut self) {
                self.0.set(false);
            }
        }

        impl Timer for TrackedTimer {
            fn sleep(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
                self.0.set(true);
                let sleeping = Sleeping(self.0.clone());
                Box::pin(async move {
                    let _sleeping = sleeping;
                    future::pending::<()>().await
                })
            }
        }

        let running = Rc::new(Cell::new(false));
        let result = block_on(with_timeout(
            &TrackedTimer(running.clone()),
            Duration::from_secs(15),
            future::ready(1),
        ));
        assert_eq!(result, Ok(1));
        assert!(!running.get());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_fires() {
        let result =
            with_timeout(&TokioTimer, Duration::from_secs(15), future::pending::<u32>()).await;
        assert_eq!(result, Err(Elapsed(Duration::from_secs(15))));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_does_not_delay_finished_operation() {
        let started = tokio::time::Instant::now();
        let result = with_timeout(&TokioTimer, Duration::from_secs(15), future::ready(3)).await;
        assert_eq!(result, Ok(3));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
