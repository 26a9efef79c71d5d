//! Single-slot callback wrapper, generalized from the teacher's
//! `platform::Callback<A>` (a `RefCell<Option<Function<A>>>` wrapping a
//! JS function) into a native `Box<dyn Fn(A)>` holder. Delivery is
//! deferred one tick via [`tokio::spawn`] so that a callback firing from
//! inside a state transition never reenters that transition (spec §4.8).

use std::cell::RefCell;

/// Holds at most one subscriber for events of type `A`.
///
/// `A` must be `'static + Send` so the deferred dispatch can move it into
/// a spawned task.
pub struct Callback<A> {
    f: RefCell<Option<Box<dyn Fn(A)>>>,
}

impl<A> Default for Callback<A> {
    fn default() -> Self {
        Self { f: RefCell::new(None) }
    }
}

impl<A: 'static> Callback<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current subscriber, if any.
    pub fn set_func<F: Fn(A) + 'static>(&self, f: F) {
        self.f.borrow_mut().replace(Box::new(f));
    }

    /// Drops the current subscriber.
    pub fn clear(&self) {
        self.f.borrow_mut().take();
    }

    /// Whether a subscriber is currently set.
    pub fn is_set(&self) -> bool {
        self.f.borrow().is_some()
    }

    /// Invokes the subscriber synchronously, if any. Used internally by
    /// [`Callback::call_deferred`]; exposed for tests that want
    /// deterministic, non-deferred delivery.
    pub fn call_now(&self, arg: A) {
        if let Some(f) = self.f.borrow().as_ref() {
            f(arg);
        }
    }
}

impl<A: 'static> Callback<A> {
    /// Schedules delivery on the next tick of the runtime, so that a
    /// synchronous UI reaction to this callback cannot reenter the state
    /// transition that raised it.
    ///
    /// No-op if no subscriber is set (the argument is simply dropped).
    pub fn call_deferred(self: &std::rc::Rc<Self>, arg: A) {
        if !self.is_set() {
            return;
        }
        let this = std::rc::Rc::clone(self);
        // `Rc` is not `Send`; run the deferred call on a `LocalSet`-bound
        // task via `tokio::task::spawn_local` so the single-threaded
        // cooperative model assumed by the rest of the crate holds even
        // though the underlying runtime may be multi-threaded.
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            this.call_now(arg);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn call_now_invokes_set_subscriber() {
        let cb: Callback<u32> = Callback::new();
        let seen = Rc::new(Cell::new(0));
        let seen2 = Rc::clone(&seen);
        cb.set_func(move |v| seen2.set(v));
        cb.call_now(42);
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn call_now_without_subscriber_is_noop() {
        let cb: Callback<u32> = Callback::new();
        cb.call_now(1);
    }

    #[test]
    fn clear_removes_subscriber() {
        let cb: Callback<u32> = Callback::new();
        cb.set_func(|_| panic!("should not be called"));
        cb.clear();
        assert!(!cb.is_set());
        cb.call_now(1);
    }
}
