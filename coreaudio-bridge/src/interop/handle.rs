//! Owned, reference-counted handles to foreign interface instances.
//!
//! The interface types themselves come from `windows-core`: every
//! `#[interface]` declaration is a reference-counted smart pointer whose
//! `Clone` adds a reference and whose `Drop` releases one. A [`Handle`]
//! wraps one of those so it can move between threads, and puts the
//! status-preserving call and capability-upgrade helpers on top.

use super::error::BridgeError;
use super::status::{Status, StatusOutcome};
use std::ffi::c_void;
use std::fmt;
use std::ops::Deref;
use windows_core::{IUnknown, Interface, GUID, HRESULT};

/// The bare type name of an interface, e.g. `IMMEndpoint`.
pub fn interface_name<I: Interface>() -> &'static str {
    let full = std::any::type_name::<I>();
    full.rsplit("::").next().unwrap_or(full)
}

/// One owned reference to a foreign object, viewed through interface `I`.
///
/// Cloning adds a reference; dropping releases one. Handles can move to
/// another thread but are not `Sync`: concurrent calls on one handle must
/// be serialized by the caller.
#[repr(transparent)]
pub struct Handle<I: Interface> {
    inner: I,
}

// The reference count is atomic on both sides of the boundary. Calls
// through one handle are still serialized by `&self` not being shared.
unsafe impl<I: Interface> Send for Handle<I> {}

impl<I: Interface> Handle<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }

    /// Adopt a reference the caller already owns. Returns `None` for null.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a live object implementing `I`, and the caller
    /// must be giving up one reference to it.
    pub unsafe fn from_raw(raw: *mut c_void) -> Option<Self> {
        (!raw.is_null()).then(|| Self::new(I::from_raw(raw)))
    }

    /// Take a new reference to an object the caller does not own.
    ///
    /// # Safety
    ///
    /// `raw` must be null or a live object implementing `I`.
    pub unsafe fn from_raw_borrowed(raw: *mut c_void) -> Option<Self> {
        I::from_raw_borrowed(&raw).cloned().map(Self::new)
    }

    pub fn as_interface(&self) -> &I {
        &self.inner
    }

    pub fn into_interface(self) -> I {
        self.inner
    }

    pub fn as_raw(&self) -> *mut c_void {
        self.inner.as_raw()
    }

    /// Give up ownership without releasing. The caller now owns the reference.
    pub fn into_raw(self) -> *mut c_void {
        self.inner.into_raw()
    }

    /// Ask the object for another interface. A new, independently owned
    /// handle is returned on success; `E_NOINTERFACE` is the expected
    /// failure when the capability is absent.
    pub fn query_capability<J: Interface>(&self) -> StatusOutcome<Handle<J>> {
        match self.inner.cast::<J>() {
            Ok(upgraded) => StatusOutcome::success(Handle::new(upgraded)),
            Err(error) => StatusOutcome::failure(Status::from(error)),
        }
    }

    /// [`query_capability`](Self::query_capability) for an identifier only
    /// known at run time. The result is typed as the base interface.
    pub fn query_capability_iid(&self, iid: &GUID) -> StatusOutcome<Handle<IUnknown>> {
        unsafe { self.call_handle(|object, out| object.query(iid, out)) }
    }

    /// Tagged-result form of [`query_capability`](Self::query_capability).
    pub fn upgrade<J: Interface>(&self) -> Result<Handle<J>, BridgeError> {
        self.query_capability::<J>()
            .try_unwrap()
            .map_err(|e| match e.status {
                Status::E_NOINTERFACE => BridgeError::NotSupported {
                    interface: interface_name::<J>(),
                    status: e.status,
                },
                _ => BridgeError::CallFailed(e),
            })
    }

    /// Whether both handles reach the same object, compared by the identity
    /// each object reports for `IUnknown`.
    pub fn is_same_object<J: Interface>(&self, other: &Handle<J>) -> bool {
        match (self.inner.cast::<IUnknown>(), other.inner.cast::<IUnknown>()) {
            (Ok(a), Ok(b)) => a.as_raw() == b.as_raw(),
            _ => false,
        }
    }

    /// Invoke a method with output storage `O` and package the outcome.
    ///
    /// `O` is default-initialized before the call. `read` turns the storage
    /// into the payload; it runs on every path, so it must not interpret
    /// the storage beyond copying it.
    pub fn call<O, T>(&self, invoke: impl FnOnce(&I, &mut O) -> HRESULT, read: impl FnOnce(O) -> T) -> StatusOutcome<T>
    where
        O: Default,
    {
        let mut out = O::default();
        let status = Status::from(invoke(&self.inner, &mut out));
        StatusOutcome::new(status, || read(out))
    }

    /// Invoke a method that has no outputs.
    pub fn call_status(&self, invoke: impl FnOnce(&I) -> HRESULT) -> StatusOutcome<()> {
        let status = Status::from(invoke(&self.inner));
        StatusOutcome::new(status, || ())
    }

    /// Invoke a method whose output is another interface pointer.
    ///
    /// The slot starts out null. A success status with a null slot becomes
    /// `E_POINTER`; on failure anything the callee wrote anyway is released.
    ///
    /// # Safety
    ///
    /// The method must write either null or an owned reference to an
    /// object implementing `J` into the slot.
    pub unsafe fn call_handle<J: Interface>(
        &self,
        invoke: impl FnOnce(&I, *mut *mut c_void) -> HRESULT,
    ) -> StatusOutcome<Handle<J>> {
        let mut slot: Option<J> = None;
        let status = Status::from(invoke(&self.inner, &mut slot as *mut Option<J> as *mut *mut c_void));
        match (status.is_success(), slot) {
            (true, Some(out)) => StatusOutcome::new(status, || Handle::new(out)),
            (true, None) => StatusOutcome::failure(Status::E_POINTER),
            (false, _) => StatusOutcome::failure(status),
        }
    }
}

impl<I: Interface> Deref for Handle<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.inner
    }
}

impl<I: Interface> From<I> for Handle<I> {
    fn from(inner: I) -> Self {
        Self::new(inner)
    }
}

impl<I: Interface> Clone for Handle<I> {
    fn clone(&self) -> Self {
        Self::new(self.inner.clone())
    }
}

impl<I: Interface> PartialEq for Handle<I> {
    fn eq(&self, other: &Self) -> bool {
        self.as_raw() == other.as_raw()
    }
}

impl<I: Interface> Eq for Handle<I> {}

impl<I: Interface> fmt::Debug for Handle<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>({:p})", interface_name::<I>(), self.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use windows_core::{implement, interface, IUnknown_Vtbl};

    #[interface("6B3F0A2C-41D7-4E0B-9C1E-2F6E8A7D5B40")]
    unsafe trait ICounter: IUnknown {
        fn get(&self, value: *mut u32) -> HRESULT;
    }

    #[interface("0D1E2F3A-4B5C-4D6E-8F70-8192A3B4C5D6")]
    unsafe trait IOther: IUnknown {}

    #[implement(ICounter)]
    struct Counter {
        value: u32,
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Counter {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ICounter_Impl for Counter_Impl {
        unsafe fn get(&self, value: *mut u32) -> HRESULT {
            *value = self.value;
            Status::S_OK.into()
        }
    }

    fn counter(value: u32) -> (Handle<ICounter>, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let object: ICounter = Counter {
            value,
            drops: drops.clone(),
        }
        .into();
        (Handle::new(object), drops)
    }

    fn read(handle: &Handle<ICounter>) -> StatusOutcome<u32> {
        handle.call(|counter, out: &mut u32| unsafe { counter.get(out) }, |v| v)
    }

    #[test]
    fn test_call_reads_output() {
        let (handle, _) = counter(42);
        assert_eq!(read(&handle).unwrap(), 42);
    }

    #[test]
    fn test_released_exactly_once() {
        let (handle, drops) = counter(1);
        let second = handle.clone();
        let upgraded = handle.query_capability::<ICounter>().unwrap();
        drop(handle);
        drop(second);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(upgraded);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_upgrades_are_independent_owners() {
        let (handle, drops) = counter(5);
        let a = handle.query_capability::<ICounter>().unwrap();
        let b = handle.query_capability::<ICounter>().unwrap();
        assert!(a.is_same_object(&b));
        drop(handle);
        drop(a);
        assert_eq!(read(&b).unwrap(), 5);
        drop(b);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsupported_capability() {
        let (handle, drops) = counter(0);
        let outcome = handle.query_capability::<IOther>();
        assert_eq!(outcome.status(), Status::E_NOINTERFACE);
        assert!(matches!(
            handle.upgrade::<IOther>(),
            Err(BridgeError::NotSupported { interface: "IOther", .. })
        ));
        drop(outcome);
        drop(handle);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_by_runtime_iid() {
        let (handle, _) = counter(0);
        assert!(handle.query_capability_iid(&ICounter::IID).is_success());
        assert!(handle.query_capability_iid(&IUnknown::IID).is_success());
        assert_eq!(
            handle.query_capability_iid(&GUID::zeroed()).status(),
            Status::E_NOINTERFACE
        );
    }

    #[test]
    fn test_raw_round_trip_keeps_reference() {
        let (handle, drops) = counter(0);
        let raw = handle.into_raw();
        let borrowed = unsafe { Handle::<ICounter>::from_raw_borrowed(raw) }.unwrap();
        let adopted = unsafe { Handle::<ICounter>::from_raw(raw) }.unwrap();
        assert_eq!(borrowed, adopted);
        drop(adopted);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(borrowed);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(unsafe { Handle::<ICounter>::from_raw(std::ptr::null_mut()) }.is_none());
    }

    #[test]
    fn test_handle_moves_across_threads() {
        let (handle, drops) = counter(9);
        let value = std::thread::spawn(move || read(&handle).unwrap()).join().unwrap();
        assert_eq!(value, 9);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_interface_name_is_bare() {
        assert_eq!(interface_name::<ICounter>(), "ICounter");
        assert_eq!(interface_name::<IUnknown>(), "IUnknown");
    }
}
