//! Fixed-count, index-addressable views over foreign collections.

use super::error::{BridgeError, ForeignCallFailed};
use super::handle::Handle;
use super::status::{Status, StatusOutcome};
use std::fmt;
use windows_core::Interface;

/// A foreign interface exposing `count` + `item(index)`.
pub trait IndexedCollection: Interface {
    /// What one index materializes as (usually a wrapper around a new handle).
    type Element;

    fn count(collection: &Handle<Self>) -> StatusOutcome<u32>;

    fn item(collection: &Handle<Self>, index: u32) -> StatusOutcome<Self::Element>;
}

/// An owned foreign collection. Elements are materialized on demand; the
/// foreign side enforces the index range.
pub struct CollectionAdapter<C: IndexedCollection> {
    handle: Handle<C>,
}

impl<C: IndexedCollection> CollectionAdapter<C> {
    pub fn new(handle: Handle<C>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle<C> {
        &self.handle
    }

    pub fn into_handle(self) -> Handle<C> {
        self.handle
    }

    pub fn try_count(&self) -> StatusOutcome<u32> {
        C::count(&self.handle)
    }

    /// Number of elements. A failing count call is fatal here.
    #[track_caller]
    pub fn count(&self) -> usize {
        self.try_count().unwrap() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn get_outcome(&self, index: u32) -> StatusOutcome<C::Element> {
        C::item(&self.handle, index)
    }

    /// Materialize the element at `index`. The foreign call's range
    /// failure is reported as [`BridgeError::IndexOutOfRange`].
    pub fn get(&self, index: u32) -> Result<C::Element, BridgeError> {
        self.get_outcome(index)
            .try_unwrap()
            .map_err(|ForeignCallFailed { status }| match status {
                Status::E_INVALIDARG | Status::E_BOUNDS => {
                    BridgeError::IndexOutOfRange { index, status }
                }
                _ => BridgeError::CallFailed(ForeignCallFailed::new(status)),
            })
    }

    /// Iterate from index 0. The count is queried once, when iteration
    /// starts; elements added or removed on the foreign side afterwards are
    /// not observed, and a removal can surface as an `IndexOutOfRange` item.
    pub fn iter(&self) -> CollectionIter<'_, C> {
        CollectionIter {
            adapter: self,
            next: 0,
            end: self.try_count().unwrap(),
        }
    }

    /// Materialize every element.
    pub fn to_vec(&self) -> Result<Vec<C::Element>, BridgeError> {
        self.iter().collect()
    }
}

impl<'a, C: IndexedCollection> IntoIterator for &'a CollectionAdapter<C> {
    type Item = Result<C::Element, BridgeError>;
    type IntoIter = CollectionIter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<C: IndexedCollection> fmt::Debug for CollectionAdapter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionAdapter")
            .field("handle", &self.handle)
            .finish()
    }
}

/// Lazy iterator over a [`CollectionAdapter`].
pub struct CollectionIter<'a, C: IndexedCollection> {
    adapter: &'a CollectionAdapter<C>,
    next: u32,
    end: u32,
}

impl<C: IndexedCollection> Iterator for CollectionIter<'_, C> {
    type Item = Result<C::Element, BridgeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(self.adapter.get(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl<C: IndexedCollection> ExactSizeIterator for CollectionIter<'_, C> {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use windows_core::{implement, interface, IUnknown, IUnknown_Vtbl, HRESULT};

    #[interface("7A4E6C1D-93B2-4F08-A5D1-0C3E9B2F7E64")]
    unsafe trait INames: IUnknown {
        fn get_count(&self, count: *mut u32) -> HRESULT;
        fn item(&self, index: u32, value: *mut u32) -> HRESULT;
    }

    #[implement(INames)]
    struct Names {
        values: Arc<Mutex<Vec<u32>>>,
    }

    impl INames_Impl for Names_Impl {
        unsafe fn get_count(&self, count: *mut u32) -> HRESULT {
            *count = self.values.lock().unwrap().len() as u32;
            Status::S_OK.into()
        }

        unsafe fn item(&self, index: u32, value: *mut u32) -> HRESULT {
            match self.values.lock().unwrap().get(index as usize) {
                Some(v) => {
                    *value = *v;
                    Status::S_OK.into()
                }
                None => Status::E_INVALIDARG.into(),
            }
        }
    }

    impl IndexedCollection for INames {
        type Element = u32;

        fn count(collection: &Handle<Self>) -> StatusOutcome<u32> {
            collection.call(|names, out: &mut u32| unsafe { names.get_count(out) }, |n| n)
        }

        fn item(collection: &Handle<Self>, index: u32) -> StatusOutcome<u32> {
            collection.call(|names, out: &mut u32| unsafe { names.item(index, out) }, |v| v)
        }
    }

    fn names(values: Vec<u32>) -> (CollectionAdapter<INames>, Arc<Mutex<Vec<u32>>>) {
        let values = Arc::new(Mutex::new(values));
        let object: INames = Names {
            values: values.clone(),
        }
        .into();
        (CollectionAdapter::new(Handle::new(object)), values)
    }

    #[test]
    fn test_get_within_and_past_range() {
        let (adapter, _) = names(vec![10, 20, 30]);
        assert_eq!(adapter.count(), 3);
        for i in 0..3 {
            assert!(adapter.get(i).is_ok());
        }
        assert_eq!(
            adapter.get(3),
            Err(BridgeError::IndexOutOfRange {
                index: 3,
                status: Status::E_INVALIDARG
            })
        );
    }

    #[test]
    fn test_iteration_is_restartable() {
        let (adapter, _) = names(vec![7, 8, 9]);
        let first = adapter.to_vec().unwrap();
        let second: Vec<u32> = adapter.iter().map(Result::unwrap).collect();
        assert_eq!(first, vec![7, 8, 9]);
        assert_eq!(first, second);
        assert_eq!(adapter.iter().len(), 3);
    }

    #[test]
    fn test_empty_collection() {
        let (adapter, _) = names(Vec::new());
        assert!(adapter.is_empty());
        assert_eq!(adapter.iter().count(), 0);
        assert!(matches!(
            adapter.get(0),
            Err(BridgeError::IndexOutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn test_count_fixed_at_iteration_start() {
        let (adapter, values) = names(vec![1, 2, 3]);
        let mut iter = adapter.iter();
        assert_eq!(iter.next(), Some(Ok(1)));

        values.lock().unwrap().truncate(1);

        assert!(matches!(
            iter.next(),
            Some(Err(BridgeError::IndexOutOfRange { index: 1, .. }))
        ));
        assert_eq!(adapter.iter().count(), 1);
    }
}
