//! Dependency Tracker - records which sources an evaluation reads.
//!
//! A single thread-local stack of evaluation frames captures every tracked
//! read made during [`track`]. Nested evaluations push their own frame, so an
//! inner computed never leaks its reads into the outer one. Frames are
//! popped by an RAII guard, so the stack is restored on every exit path,
//! including propagated errors.
//!
//! Reads never subscribe eagerly: [`track`] only *returns* the dependency
//! set, and the caller decides whether to turn it into subscriptions.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashSet;
use tracing::trace;

use super::{SourceId, Trackable};

enum Frame {
    /// Accumulates the distinct sources read during the evaluation.
    Tracking {
        deps: Vec<Rc<dyn Trackable>>,
        seen: AHashSet<SourceId>,
    },
    /// Swallows reads. Used to isolate callbacks (afterRender) from the
    /// enclosing evaluation.
    Inert,
}

thread_local! {
    static EVAL_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Pops its frame on drop, so a panicking or erroring evaluation still
/// restores the stack.
struct FrameGuard;

impl FrameGuard {
    fn push(frame: Frame) -> Self {
        EVAL_STACK.with(|stack| stack.borrow_mut().push(frame));
        FrameGuard
    }

    fn pop(self) -> Frame {
        // Forget self so Drop doesn't pop a second time.
        std::mem::forget(self);
        EVAL_STACK.with(|stack| {
            stack
                .borrow_mut()
                .pop()
                .unwrap_or(Frame::Inert)
        })
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        EVAL_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Run `evaluation` with a fresh dependency accumulator on the evaluation
/// stack; returns its result alongside the distinct sources it read, in
/// first-read order.
pub fn track<T>(evaluation: impl FnOnce() -> T) -> (T, Vec<Rc<dyn Trackable>>) {
    let guard = FrameGuard::push(Frame::Tracking {
        deps: Vec::new(),
        seen: AHashSet::new(),
    });
    let value = evaluation();
    let frame = guard.pop();
    let deps = match frame {
        Frame::Tracking { deps, .. } => deps,
        Frame::Inert => Vec::new(),
    };
    trace!(deps = deps.len(), "tracked evaluation finished");
    (value, deps)
}

/// Run `f` under an inert frame: reads made inside register no dependency
/// anywhere, regardless of how deep the enclosing evaluation stack is.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let guard = FrameGuard::push(Frame::Inert);
    let value = f();
    let _ = guard.pop();
    value
}

/// Record a read of `source` into the top evaluation frame, if any.
pub(crate) fn track_read(source: Rc<dyn Trackable>) {
    EVAL_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if let Some(Frame::Tracking { deps, seen }) = stack.last_mut() {
            if seen.insert(source.source_id()) {
                deps.push(source);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observable;

    #[test]
    fn test_track_collects_reads() {
        let a = Observable::new(1);
        let b = Observable::new(2);

        let (sum, deps) = track(|| a.get() + b.get());
        assert_eq!(sum, 3);
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn test_track_dedups_repeated_reads() {
        let a = Observable::new(1);

        let (_, deps) = track(|| a.get() + a.get() + a.get());
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_nested_frames_do_not_leak() {
        let outer = Observable::new(1);
        let inner = Observable::new(2);

        let (_, outer_deps) = track(|| {
            let (_, inner_deps) = track(|| inner.get());
            assert_eq!(inner_deps.len(), 1);
            outer.get()
        });

        // The inner frame captured `inner`; the outer frame must only see
        // `outer`.
        assert_eq!(outer_deps.len(), 1);
        assert_eq!(outer_deps[0].source_id(), outer.source_id());
    }

    #[test]
    fn test_untracked_swallows_reads() {
        let a = Observable::new(1);
        let b = Observable::new(2);

        let (_, deps) = track(|| {
            let _ = untracked(|| a.get());
            b.get()
        });
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].source_id(), b.source_id());
    }

    #[test]
    fn test_stack_restored_after_panic() {
        let a = Observable::new(1);

        let result = std::panic::catch_unwind(|| {
            track(|| -> i32 { panic!("boom") });
        });
        assert!(result.is_err());

        // A later evaluation still tracks normally.
        let (_, deps) = track(|| a.get());
        assert_eq!(deps.len(), 1);
    }

    #[test]
    fn test_untracked_read_outside_any_frame_is_noop() {
        let a = Observable::new(5);
        // No frame on the stack: plain read, nothing recorded, no panic.
        assert_eq!(a.get(), 5);
    }
}
