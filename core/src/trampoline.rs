//! The user-facing wrapper.

use core::fmt;
use core::mem;
use core::ptr;

use trampoline_mm::{self as mm, CodeSlot, SlabError};

use crate::signature::{Callable, Signature};
use crate::thunk;

/// A type-erased callable that doubles as a plain C-ABI function pointer.
///
/// A wrapper is in one of three states:
///
/// - **empty**: nothing to call; [`raw`](Self::raw) is `None` and
///   [`call`](Self::call) panics;
/// - **function pointer**: wraps an existing C-ABI function; no thunk, no
///   owned state; [`raw`](Self::raw) returns the wrapped pointer itself;
/// - **closure-backed**: owns the boxed callable and one executable slot
///   holding a thunk emitted for exactly this callable's address.
///
/// Moving a wrapper transfers the slot and the callable without
/// regenerating the thunk; a raw pointer obtained before the move stays
/// valid. Wrappers are not clonable: the captured callable need not be, and
/// two wrappers cannot share one emitted thunk.
pub struct Trampoline<S: Signature> {
    inner: Inner<S>,
}

enum Inner<S: Signature> {
    Empty,
    Direct(S::Raw),
    Emitted(Emitted<S>),
}

/// Owned pieces of a closure-backed wrapper.
struct Emitted<S: Signature> {
    object: *mut (),
    slot: CodeSlot,
    caller: unsafe fn(*const (), S::Args) -> S::Ret,
    deleter: unsafe fn(*mut ()),
}

impl<S: Signature> Drop for Emitted<S> {
    fn drop(&mut self) {
        // SAFETY: `object` is the Box the constructor leaked, and `deleter`
        // was monomorphised for its concrete type. The slot handle returns
        // the thunk memory afterwards.
        unsafe {
            (self.deleter)(self.object);
        }
    }
}

impl<S: Signature> Trampoline<S> {
    /// An empty wrapper.
    pub fn empty() -> Self {
        Self {
            inner: Inner::Empty,
        }
    }

    /// Wrap an existing C-ABI function pointer. No thunk is emitted;
    /// [`raw`](Self::raw) hands the pointer back unchanged.
    ///
    /// # Safety
    ///
    /// `raw` must point at a live function of exactly this signature for as
    /// long as the wrapper (or any pointer obtained from it) is used.
    pub unsafe fn from_fn(raw: S::Raw) -> Self {
        Self {
            inner: Inner::Direct(raw),
        }
    }

    /// Wrap a callable, emitting its thunk into a fresh executable slot.
    ///
    /// Fails only if the code slab is exhausted; no wrapper is produced in
    /// that case.
    pub fn new<F: Callable<S>>(callable: F) -> Result<Self, SlabError> {
        let slot = mm::acquire()?;
        let object = Box::into_raw(Box::new(callable)) as *mut ();

        let code = thunk::emit(
            S::INTEGER_ARGS,
            S::SSE_ARGS,
            object as u64,
            F::dispatcher(),
        );
        // SAFETY: the slot is at least SLOT_SIZE bytes, writable, and
        // exclusively ours until the handle drops.
        unsafe {
            ptr::copy_nonoverlapping(code.as_bytes().as_ptr(), slot.as_ptr(), code.len());
        }
        log::trace!("emitted {}-byte thunk at {:p}", code.len(), slot.as_ptr());

        Ok(Self {
            inner: Inner::Emitted(Emitted {
                object,
                slot,
                caller: F::caller(),
                deleter: F::deleter(),
            }),
        })
    }

    /// True when nothing is wrapped.
    pub fn is_empty(&self) -> bool {
        matches!(self.inner, Inner::Empty)
    }

    /// Invoke the wrapped callable with `args`.
    ///
    /// # Panics
    ///
    /// Panics if the wrapper is empty; check [`is_empty`](Self::is_empty)
    /// first.
    pub fn call(&self, args: S::Args) -> S::Ret {
        match &self.inner {
            Inner::Empty => panic!("called an empty trampoline"),
            // SAFETY: the pointer was vouched for at construction.
            Inner::Direct(raw) => unsafe { S::invoke_raw(*raw, args) },
            // SAFETY: `object` is this wrapper's live boxed callable and
            // `caller` was monomorphised for its type.
            Inner::Emitted(emitted) => unsafe {
                (emitted.caller)(emitted.object as *const (), args)
            },
        }
    }

    /// The C-ABI view of the wrapper: `None` when empty, the wrapped
    /// pointer in function-pointer state, the thunk entry in closure-backed
    /// state.
    ///
    /// The returned pointer is a genuine System V AMD64 entry point; any
    /// caller honouring that ABI may invoke it. It stays valid across moves
    /// of the wrapper but must not be called after the wrapper is dropped
    /// or cleared.
    pub fn raw(&self) -> Option<S::Raw> {
        match &self.inner {
            Inner::Empty => None,
            Inner::Direct(raw) => Some(*raw),
            Inner::Emitted(emitted) => {
                let entry = emitted.slot.as_ptr();
                // SAFETY: the slot holds a complete thunk observing this
                // signature's ABI; a function pointer is the slot address.
                Some(unsafe { mem::transmute_copy::<*mut u8, S::Raw>(&entry) })
            }
        }
    }

    /// Replace the wrapped callable, releasing the previous state.
    pub fn set<F: Callable<S>>(&mut self, callable: F) -> Result<(), SlabError> {
        let mut fresh = Self::new(callable)?;
        mem::swap(self, &mut fresh);
        Ok(())
    }

    /// Release the wrapped state; the wrapper becomes empty. Clearing an
    /// empty wrapper is a no-op.
    pub fn clear(&mut self) {
        self.inner = Inner::Empty;
    }

    /// Exchange the complete state of two wrappers.
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Move the state out, leaving this wrapper empty.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

impl<S: Signature> Default for Trampoline<S> {
    fn default() -> Self {
        Self::empty()
    }
}

// Function pointers only implement Debug up to twelve parameters, so the
// wrapper's Debug is conditional on the signature's pointer type.
impl<S: Signature> fmt::Debug for Trampoline<S>
where
    S::Raw: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Empty => f.write_str("Trampoline::Empty"),
            Inner::Direct(raw) => f.debug_tuple("Trampoline::Direct").field(raw).finish(),
            Inner::Emitted(emitted) => f
                .debug_tuple("Trampoline::Emitted")
                .field(&emitted.slot.as_ptr())
                .finish(),
        }
    }
}
