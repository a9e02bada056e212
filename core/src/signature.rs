//! Signature descriptors and type-erased dispatch.
//!
//! [`Signature`] is implemented for bare function-pointer types
//! `fn(A1, …, An) -> R` up to [`MAX_ARGS`](trampoline_abi::MAX_ARGS)
//! parameters; it carries the ABI facts the thunk emitter needs plus the raw
//! exported pointer type. [`Callable`] binds a concrete `Fn` closure type to
//! one of those signatures and hands out the three monomorphised entry
//! points a wrapper stores: the dispatcher the thunk transfers to, the
//! erased direct-call entry, and the deleter for the boxed callable.
//!
//! Higher-ranked signatures (`for<'a> fn(&'a T)`) are not describable;
//! reference parameters must name a concrete lifetime.

use paste::paste;
use trampoline_abi::{AbiParam, AbiReturn, ArgClass, integer_count, sse_count};

/// A function signature the wrapper can take on.
///
/// # Safety
///
/// `ARG_CLASSES` must list the System V class of every parameter in source
/// order, and `Raw` must be the C-ABI pointer type of exactly this
/// signature; the thunk emitter trusts both.
pub unsafe trait Signature: Copy {
    /// Exported C-ABI pointer type. Calling it is unsafe because the pointer
    /// is only valid while the wrapper that produced it is alive.
    ///
    /// Only `Copy` is required here: the standard library's comparison and
    /// formatting impls for function pointers stop at twelve parameters,
    /// and signatures up to [`MAX_ARGS`](trampoline_abi::MAX_ARGS) are
    /// supported. Concrete pointer types of twelve or fewer parameters
    /// still compare and print as usual.
    type Raw: Copy;
    /// Arguments as a tuple, for direct invocation.
    type Args;
    /// Return type.
    type Ret;

    /// Per-parameter register classes, in source order.
    const ARG_CLASSES: &'static [ArgClass];
    /// INTEGER-class parameter total.
    const INTEGER_ARGS: usize;
    /// SSE-class parameter total.
    const SSE_ARGS: usize;

    /// Splat `args` through the C ABI into `raw`.
    ///
    /// # Safety
    ///
    /// `raw` must point at a live function of this exact signature.
    unsafe fn invoke_raw(raw: Self::Raw, args: Self::Args) -> Self::Ret;
}

/// A callable that can back a wrapper of signature `S`.
///
/// # Safety
///
/// The three entry points must agree on the concrete `Self` type: the
/// dispatcher and caller reinterpret the erased object pointer as `*const
/// Self`, the deleter as `*mut Self`.
pub unsafe trait Callable<S: Signature>: Sized + 'static {
    /// Address of the `extern "C"` dispatcher for this callable type: the
    /// function the emitted thunk transfers to, taking the object pointer
    /// prepended to the signature's parameters.
    fn dispatcher() -> u64;

    /// Type-erased direct-invocation entry.
    fn caller() -> unsafe fn(*const (), S::Args) -> S::Ret;

    /// Destructor for the heap-owned callable.
    fn deleter() -> unsafe fn(*mut ());
}

/// Drops a boxed callable through its erased pointer.
unsafe fn drop_boxed<F>(object: *mut ()) {
    // SAFETY: `object` came out of Box::into_raw for a value of type F.
    unsafe {
        drop(Box::from_raw(object as *mut F));
    }
}

macro_rules! impl_signature {
    ($n:literal => $($arg:ident)*) => { paste! {
        #[allow(non_snake_case, improper_ctypes_definitions)]
        unsafe extern "C" fn [<dispatch_ $n>]<F, R, $($arg),*>(
            object: *const F,
            $($arg: $arg,)*
        ) -> R
        where
            F: Fn($($arg),*) -> R,
        {
            // SAFETY: the thunk embedding `object` was emitted for a live
            // callable of type F owned by the wrapper.
            unsafe { (*object)($($arg),*) }
        }

        #[allow(non_snake_case)]
        unsafe fn [<call_ $n>]<F, R, $($arg),*>(object: *const (), args: ($($arg,)*)) -> R
        where
            F: Fn($($arg),*) -> R,
        {
            let ($($arg,)*) = args;
            // SAFETY: same contract as the dispatcher; `object` is the
            // wrapper's boxed callable of type F.
            unsafe { (*(object as *const F))($($arg),*) }
        }

        unsafe impl<R, $($arg),*> Signature for fn($($arg),*) -> R
        where
            R: AbiReturn,
            $($arg: AbiParam,)*
        {
            type Raw = unsafe extern "C" fn($($arg),*) -> R;
            type Args = ($($arg,)*);
            type Ret = R;

            const ARG_CLASSES: &'static [ArgClass] = &[$(<$arg as AbiParam>::CLASS),*];
            const INTEGER_ARGS: usize = integer_count(Self::ARG_CLASSES);
            const SSE_ARGS: usize = sse_count(Self::ARG_CLASSES);

            #[allow(non_snake_case)]
            unsafe fn invoke_raw(raw: Self::Raw, args: Self::Args) -> Self::Ret {
                let ($($arg,)*) = args;
                // SAFETY: forwarded to the caller's contract.
                unsafe { raw($($arg),*) }
            }
        }

        unsafe impl<F, R, $($arg),*> Callable<fn($($arg),*) -> R> for F
        where
            F: Fn($($arg),*) -> R + 'static,
            R: AbiReturn,
            $($arg: AbiParam,)*
        {
            fn dispatcher() -> u64 {
                [<dispatch_ $n>]::<F, R, $($arg),*> as *const () as usize as u64
            }

            fn caller() -> unsafe fn(*const (), ($($arg,)*)) -> R {
                [<call_ $n>]::<F, R, $($arg),*>
            }

            fn deleter() -> unsafe fn(*mut ()) {
                drop_boxed::<F>
            }
        }
    } };
}

impl_signature!(0 => );
impl_signature!(1 => A0);
impl_signature!(2 => A0 A1);
impl_signature!(3 => A0 A1 A2);
impl_signature!(4 => A0 A1 A2 A3);
impl_signature!(5 => A0 A1 A2 A3 A4);
impl_signature!(6 => A0 A1 A2 A3 A4 A5);
impl_signature!(7 => A0 A1 A2 A3 A4 A5 A6);
impl_signature!(8 => A0 A1 A2 A3 A4 A5 A6 A7);
impl_signature!(9 => A0 A1 A2 A3 A4 A5 A6 A7 A8);
impl_signature!(10 => A0 A1 A2 A3 A4 A5 A6 A7 A8 A9);
impl_signature!(11 => A0 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10);
impl_signature!(12 => A0 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11);
impl_signature!(13 => A0 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12);
impl_signature!(14 => A0 A1 A2 A3 A4 A5 A6 A7 A8 A9 A10 A11 A12 A13);
