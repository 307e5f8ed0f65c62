//! Endpoint and audio-effects property stores.
//!
//! Enumerating keys, reading string and integer values such as the
//! friendly name, and writing values into the effects stores.

use super::interfaces::IPropertyStore;
use crate::interop::memory::{alloc_wide, task_mem_alloc, wide_to_string};
use crate::interop::{Braced, Handle, Status, StatusOutcome, GUID};
use std::fmt;

/// PROPERTYKEY: a format identifier plus a property id within it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PropertyKey {
    pub fmtid: GUID,
    pub pid: u32,
}

impl PropertyKey {
    pub const fn new(fmtid: GUID, pid: u32) -> Self {
        Self { fmtid, pid }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", Braced(&self.fmtid), self.pid)
    }
}

/// DEVPKEY_Device_FriendlyName
pub const PKEY_DEVICE_FRIENDLY_NAME: PropertyKey = PropertyKey::new(
    GUID::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0),
    14,
);

/// DEVPKEY_Device_DeviceDesc
pub const PKEY_DEVICE_DESC: PropertyKey = PropertyKey::new(
    GUID::from_u128(0xa45c254e_df1c_4efd_8020_67d146a850e0),
    2,
);

const AUDIO_ENDPOINT_FMTID: GUID = GUID::from_u128(0x1DA5D803_D492_4EDD_8C23_E0C0FFEE7F0E);

pub const PKEY_AUDIO_ENDPOINT_FORM_FACTOR: PropertyKey = PropertyKey::new(AUDIO_ENDPOINT_FMTID, 0);
pub const PKEY_AUDIO_ENDPOINT_GUID: PropertyKey = PropertyKey::new(AUDIO_ENDPOINT_FMTID, 4);

pub const VT_EMPTY: u16 = 0;
pub const VT_UI4: u16 = 19;
pub const VT_LPWSTR: u16 = 31;
pub const VT_CLSID: u16 = 72;

/// PROPVARIANT storage: an 8-byte header followed by a two-pointer union.
#[repr(C)]
pub struct RawPropVariant {
    pub vt: u16,
    pub reserved: [u16; 3],
    pub data: [usize; 2],
}

impl Default for RawPropVariant {
    fn default() -> Self {
        Self {
            vt: VT_EMPTY,
            reserved: [0; 3],
            data: [0; 2],
        }
    }
}

impl RawPropVariant {
    fn with(vt: u16, first: usize) -> Self {
        Self {
            vt,
            reserved: [0; 3],
            data: [first, 0],
        }
    }

    pub fn from_u32(value: u32) -> Self {
        Self::with(VT_UI4, value as usize)
    }

    /// A `VT_LPWSTR` holding a task-allocator copy of `value`.
    pub fn from_string(value: &str) -> Self {
        let text = alloc_wide(value);
        if text.is_null() {
            return Self::default();
        }
        Self::with(VT_LPWSTR, text as usize)
    }

    /// A `VT_CLSID` holding a task-allocator copy of `value`, the form
    /// activation parameters take.
    pub fn from_clsid(value: &GUID) -> Self {
        let block = task_mem_alloc(std::mem::size_of::<GUID>()) as *mut GUID;
        if block.is_null() {
            return Self::default();
        }
        unsafe { block.write(*value) };
        Self::with(VT_CLSID, block as usize)
    }

    /// Read as an owned string when the variant holds one.
    pub fn string(&self) -> Option<String> {
        match self.vt {
            VT_LPWSTR => unsafe { wide_to_string(self.data[0] as *const u16) },
            _ => None,
        }
    }

    pub fn u32(&self) -> Option<u32> {
        match self.vt {
            VT_UI4 => Some(self.data[0] as u32),
            _ => None,
        }
    }

    pub fn clsid(&self) -> Option<GUID> {
        match (self.vt, self.data[0]) {
            (VT_CLSID, 0) => None,
            (VT_CLSID, block) => Some(unsafe { *(block as *const GUID) }),
            _ => None,
        }
    }
}

impl fmt::Debug for RawPropVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("RawPropVariant");
        out.field("vt", &self.vt);
        if let Some(text) = self.string() {
            out.field("value", &text);
        } else if let Some(value) = self.u32() {
            out.field("value", &value);
        } else if let Some(clsid) = self.clsid() {
            out.field("value", &clsid);
        }
        out.finish()
    }
}

impl Drop for RawPropVariant {
    fn drop(&mut self) {
        clear(self);
    }
}

#[cfg(windows)]
fn clear(value: &mut RawPropVariant) {
    use windows::Win32::System::Com::StructuredStorage::{PropVariantClear, PROPVARIANT};

    if value.vt != VT_EMPTY {
        let _ = unsafe { PropVariantClear(value as *mut RawPropVariant as *mut PROPVARIANT) };
        *value = RawPropVariant {
            vt: VT_EMPTY,
            reserved: [0; 3],
            data: [0; 2],
        };
    }
}

#[cfg(not(windows))]
fn clear(value: &mut RawPropVariant) {
    use crate::interop::memory::task_mem_free;
    use std::ffi::c_void;

    if matches!(value.vt, VT_LPWSTR | VT_CLSID) {
        unsafe { task_mem_free(value.data[0] as *mut c_void) };
    }
    value.vt = VT_EMPTY;
    value.data = [0; 2];
}

/// Storage access mode for [`MMDevice::open_property_store`](super::MMDevice::open_property_store).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum StorageAccess {
    Read = 0x0,
    Write = 0x1,
    ReadWrite = 0x2,
}

/// A property store. Wrapper around `IPropertyStore`.
#[derive(Debug, Clone)]
pub struct PropertyStore {
    handle: Handle<IPropertyStore>,
}

impl PropertyStore {
    pub fn from_handle(handle: Handle<IPropertyStore>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle<IPropertyStore> {
        &self.handle
    }

    pub fn count(&self) -> StatusOutcome<u32> {
        self.handle
            .call(|store, out: &mut u32| unsafe { store.GetCount(out) }, |n| n)
    }

    pub fn key_at(&self, index: u32) -> StatusOutcome<PropertyKey> {
        self.handle
            .call(|store, out: &mut PropertyKey| unsafe { store.GetAt(index, out) }, |key| key)
    }

    /// Every key in the store, in store order.
    pub fn keys(&self) -> StatusOutcome<Vec<PropertyKey>> {
        self.count().and_then(|count| {
            let mut keys = Vec::with_capacity(count as usize);
            for index in 0..count {
                match self.key_at(index).try_unwrap() {
                    Ok(key) => keys.push(key),
                    Err(e) => return StatusOutcome::failure(e.status),
                }
            }
            StatusOutcome::success(keys)
        })
    }

    pub fn value(&self, key: &PropertyKey) -> StatusOutcome<RawPropVariant> {
        self.handle
            .call(|store, out: &mut RawPropVariant| unsafe { store.GetValue(key, out) }, |value| value)
    }

    /// A string property. A missing or non-string value reads as `None`.
    pub fn string_value(&self, key: &PropertyKey) -> StatusOutcome<Option<String>> {
        self.value(key).map(|value| value.string())
    }

    pub fn u32_value(&self, key: &PropertyKey) -> StatusOutcome<Option<u32>> {
        self.value(key).map(|value| value.u32())
    }

    /// Write a value. Stores opened read-only refuse with `STG_E_ACCESSDENIED`.
    pub fn set_value(&self, key: &PropertyKey, value: &RawPropVariant) -> StatusOutcome<()> {
        self.handle.call_status(|store| unsafe { store.SetValue(key, value) })
    }

    pub fn set_string_value(&self, key: &PropertyKey, value: &str) -> StatusOutcome<()> {
        let value = RawPropVariant::from_string(value);
        if value.vt != VT_LPWSTR {
            return StatusOutcome::failure(Status::E_OUTOFMEMORY);
        }
        self.set_value(key, &value)
    }

    pub fn set_u32_value(&self, key: &PropertyKey, value: u32) -> StatusOutcome<()> {
        self.set_value(key, &RawPropVariant::from_u32(value))
    }

    pub fn commit(&self) -> StatusOutcome<()> {
        self.handle.call_status(|store| unsafe { store.Commit() })
    }
}

impl From<Handle<IPropertyStore>> for PropertyStore {
    fn from(handle: Handle<IPropertyStore>) -> Self {
        Self::from_handle(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::EndpointFormFactor;
    use crate::fake::{FakeAudioSystem, FakeDevice};
    use pretty_assertions::assert_eq;

    fn store() -> (FakeAudioSystem, PropertyStore) {
        let system = FakeAudioSystem::builder()
            .device(FakeDevice::render("spk", "Speakers (USB Audio)").description("Speakers"))
            .build();
        let store = system
            .enumerator()
            .default_speaker()
            .unwrap()
            .property_store_read()
            .unwrap();
        (system, store)
    }

    #[test]
    fn test_keys_in_store_order() {
        let (_system, store) = store();
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(
            store.keys().unwrap(),
            vec![PKEY_DEVICE_FRIENDLY_NAME, PKEY_DEVICE_DESC, PKEY_AUDIO_ENDPOINT_FORM_FACTOR]
        );
        assert!(store.key_at(3).is_failure());
    }

    #[test]
    fn test_typed_values() {
        let (_system, store) = store();
        assert_eq!(
            store.string_value(&PKEY_DEVICE_FRIENDLY_NAME).unwrap().as_deref(),
            Some("Speakers (USB Audio)")
        );
        assert_eq!(
            store.u32_value(&PKEY_AUDIO_ENDPOINT_FORM_FACTOR).unwrap(),
            Some(EndpointFormFactor::Speakers as u32)
        );
        // Wrong type reads as absent.
        assert_eq!(store.u32_value(&PKEY_DEVICE_DESC).unwrap(), None);
    }

    #[test]
    fn test_device_store_is_read_only() {
        let (_system, store) = store();
        assert_eq!(
            store.set_u32_value(&PKEY_AUDIO_ENDPOINT_FORM_FACTOR, 3).status(),
            Status::STG_E_ACCESSDENIED
        );
        assert_eq!(store.commit().status(), Status::STG_E_ACCESSDENIED);
    }

    #[test]
    fn test_variant_constructors() {
        assert_eq!(RawPropVariant::from_string("Line In").string().as_deref(), Some("Line In"));
        assert_eq!(RawPropVariant::from_u32(7).u32(), Some(7));

        let context = GUID::from_u128(0x4A2B8C1D_3E5F_4A6B_8C7D_9E0F1A2B3C4D);
        let variant = RawPropVariant::from_clsid(&context);
        assert_eq!(variant.vt, VT_CLSID);
        assert_eq!(variant.clsid(), Some(context));
        assert_eq!(variant.string(), None);
    }

    #[test]
    fn test_missing_key_is_empty() {
        let (_system, store) = store();
        let value = store.value(&PKEY_AUDIO_ENDPOINT_GUID).unwrap();
        assert_eq!(value.vt, VT_EMPTY);
        assert_eq!(store.string_value(&PKEY_AUDIO_ENDPOINT_GUID).unwrap(), None);
    }
}
