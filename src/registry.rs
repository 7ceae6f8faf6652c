//! The context registry: which context is active on this thread.
//!
//! The registry is a thread-local stack, so traces that run on different
//! threads never see each other's contexts. Entering a context returns a
//! [`ContextGuard`]; the frame is popped when the guard is exited or
//! dropped, including during unwinding.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    marker::PhantomData,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use tracing::{debug, warn};

use crate::{
    context::Context,
    error::{ModelError, Result},
    math_base::Real,
};

/// Shared handle to the context of a running trace.
pub type ContextRef<R> = Rc<RefCell<Context<R>>>;

/// Identifies the model a trace belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(u64);

impl ModelId {
    pub(crate) fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        ModelId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

struct Frame {
    id: u64,
    model: Option<ModelId>,
    context: Rc<dyn Any>,
}

thread_local! {
    static STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
    static NEXT_FRAME: Cell<u64> = const { Cell::new(0) };
}

/// Keeps a context active. Not `Send`: a frame must be released on the
/// thread that pushed it.
#[must_use = "the context is deactivated when the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard {
    id: u64,
    exited: bool,
    _not_send: PhantomData<Rc<()>>,
}

impl ContextGuard {
    /// Deactivate the context.
    ///
    /// Fails with [`ModelError::InternalConsistency`] if the context on top
    /// of the stack is not the one this guard activated. The frame of this
    /// guard and every frame above it are released anyway.
    pub fn exit(mut self) -> Result<()> {
        self.exited = true;
        release(self.id)
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if self.exited {
            return;
        }
        warn!(frame = self.id, "context released without explicit exit");
        let _ = release(self.id);
    }
}

/// Pop the frame `id`. If it is not on top, frames pushed after it were
/// leaked by their guards; they are dropped together with it.
fn release(id: u64) -> Result<()> {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        match stack.last() {
            Some(frame) if frame.id == id => {
                stack.pop();
                debug!(frame = id, depth = stack.len(), "exited context");
                Ok(())
            }
            other => {
                let found = other.map(|frame| frame.id);
                if let Some(position) = stack.iter().position(|frame| frame.id == id) {
                    warn!(
                        frame = id,
                        leaked = stack.len() - position - 1,
                        "released context above leaked frames"
                    );
                    stack.truncate(position);
                }
                Err(ModelError::InternalConsistency {
                    expected: id,
                    found,
                })
            }
        }
    })
}

/// Make `context` the active context of this thread.
///
/// A context that belongs to a model cannot be entered while another trace
/// of the same model is active on this thread.
pub fn enter<R: Real>(context: ContextRef<R>, model: Option<ModelId>) -> Result<ContextGuard> {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        if let Some(model) = model {
            if stack.iter().any(|frame| frame.model == Some(model)) {
                return Err(ModelError::ContextConflict {
                    reason: format!("a trace of model {model:?} is already active"),
                });
            }
        }
        let id = NEXT_FRAME.with(|next| {
            let id = next.get();
            next.set(id + 1);
            id
        });
        stack.push(Frame {
            id,
            model,
            context,
        });
        debug!(frame = id, depth = stack.len(), "entered context");
        Ok(ContextGuard {
            id,
            exited: false,
            _not_send: PhantomData,
        })
    })
}

/// The active context, or `None` outside of any trace.
///
/// Fails if the active context resolves variables to a different value
/// type than `R`.
pub fn current<R: Real>() -> Result<Option<ContextRef<R>>> {
    STACK.with(|stack| {
        let stack = stack.borrow();
        let Some(frame) = stack.last() else {
            return Ok(None);
        };
        frame
            .context
            .clone()
            .downcast::<RefCell<Context<R>>>()
            .map(Some)
            .map_err(|_| ModelError::ContextConflict {
                reason: format!(
                    "the active context does not resolve values of type {}",
                    std::any::type_name::<R>()
                ),
            })
    })
}

/// Number of active contexts on this thread.
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

/// Run `func` against an empty registry and restore the current stack
/// afterwards, also when `func` panics.
///
/// Work stealing can run another job on this thread while a trace is
/// waiting inside the thread pool. Such a job must not see that trace.
pub fn isolated<T>(func: impl FnOnce() -> T) -> T {
    struct Restore(Vec<Frame>);

    impl Drop for Restore {
        fn drop(&mut self) {
            let outer = std::mem::take(&mut self.0);
            STACK.with(|stack| {
                let inner = std::mem::replace(&mut *stack.borrow_mut(), outer);
                if !inner.is_empty() {
                    warn!(leaked = inner.len(), "isolated job left contexts behind");
                }
            });
        }
    }

    let _restore = Restore(STACK.with(|stack| std::mem::take(&mut *stack.borrow_mut())));
    func()
}

/// Run `func` with `context` active and deactivate it afterwards, whether
/// `func` succeeds, fails or panics.
pub fn with_context<R: Real, T>(
    context: ContextRef<R>,
    model: Option<ModelId>,
    func: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let guard = enter(context, model)?;
    let result = func();
    guard.exit()?;
    result
}
