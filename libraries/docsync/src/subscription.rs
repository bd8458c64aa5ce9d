use std::fmt;

/// Keeps a listener registered for as long as it is alive.
///
/// Dropping the guard unregisters the listener before `drop` returns, so a caller that replaces one
/// subscription with another never has two live at once.
#[must_use = "dropping a Subscription unregisters its listener immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_cancels_once() {
        let cancelled = Rc::new(Cell::new(0));
        let cancelled0 = cancelled.clone();
        let subscription = Subscription::new(move || cancelled0.set(cancelled0.get() + 1));
        subscription.cancel();
        assert_eq!(cancelled.get(), 1);
    }

    #[test]
    fn test_drop_cancels() {
        let cancelled = Rc::new(Cell::new(false));
        let cancelled0 = cancelled.clone();
        {
            let _subscription = Subscription::new(move || cancelled0.set(true));
            assert!(!cancelled.get());
        }
        assert!(cancelled.get());
    }
}
