//! Audio-effects property stores using IAudioSystemEffectsPropertyStore.
//!
//! An effects component keeps its settings in three property stores per
//! endpoint and context GUID: the shipped defaults, the user's changes and
//! a volatile store that does not survive a restart. Changes to any of
//! them are reported through a registered
//! [`EffectsPropertyChangeHandler`](super::EffectsPropertyChangeHandler).

use super::interfaces::{IAudioSystemEffectsPropertyChangeNotificationClient, IAudioSystemEffectsPropertyStore, IPropertyStore};
use super::notifications::{self, EffectsPropertyChangeHandler};
use super::property_store::{PropertyStore, StorageAccess};
use crate::interop::{Handle, NotificationSource, Registration, Status, StatusOutcome};
use std::fmt;

/// A registered effects property change bridge.
pub type EffectsNotificationRegistration =
    Registration<IAudioSystemEffectsPropertyStore, IAudioSystemEffectsPropertyChangeNotificationClient>;

impl NotificationSource<IAudioSystemEffectsPropertyChangeNotificationClient> for IAudioSystemEffectsPropertyStore {
    fn register(source: &Handle<Self>, client: &Handle<IAudioSystemEffectsPropertyChangeNotificationClient>) -> Status {
        unsafe { source.RegisterPropertyChangeNotification(client.as_raw()) }.into()
    }

    fn unregister(source: &Handle<Self>, client: &Handle<IAudioSystemEffectsPropertyChangeNotificationClient>) -> Status {
        unsafe { source.UnregisterPropertyChangeNotification(client.as_raw()) }.into()
    }
}

/// Which store a property lives in (maps to `AUDIO_SYSTEMEFFECTS_PROPERTYSTORE_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EffectsPropertyStoreType {
    Default = 0,
    User = 1,
    Volatile = 2,
}

impl EffectsPropertyStoreType {
    pub const ALL: [EffectsPropertyStoreType; 3] = [Self::Default, Self::User, Self::Volatile];

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Default),
            1 => Some(Self::User),
            2 => Some(Self::Volatile),
            _ => None,
        }
    }
}

impl fmt::Display for EffectsPropertyStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::User => "user",
            Self::Volatile => "volatile",
        })
    }
}

/// Wrapper around `IAudioSystemEffectsPropertyStore`. Obtained from
/// [`MMDevice::activate_audio_system_effects_property_store`](super::MMDevice::activate_audio_system_effects_property_store).
#[derive(Debug, Clone)]
pub struct AudioSystemEffectsPropertyStore {
    handle: Handle<IAudioSystemEffectsPropertyStore>,
}

impl AudioSystemEffectsPropertyStore {
    pub fn from_handle(handle: Handle<IAudioSystemEffectsPropertyStore>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle<IAudioSystemEffectsPropertyStore> {
        &self.handle
    }

    pub fn open_default_property_store(&self, access: StorageAccess) -> StatusOutcome<PropertyStore> {
        unsafe {
            self.handle
                .call_handle::<IPropertyStore>(|effects, out| effects.OpenDefaultPropertyStore(access as u32, out))
        }
        .map(PropertyStore::from_handle)
    }

    pub fn open_user_property_store(&self, access: StorageAccess) -> StatusOutcome<PropertyStore> {
        unsafe {
            self.handle
                .call_handle::<IPropertyStore>(|effects, out| effects.OpenUserPropertyStore(access as u32, out))
        }
        .map(PropertyStore::from_handle)
    }

    pub fn open_volatile_property_store(&self, access: StorageAccess) -> StatusOutcome<PropertyStore> {
        unsafe {
            self.handle
                .call_handle::<IPropertyStore>(|effects, out| effects.OpenVolatilePropertyStore(access as u32, out))
        }
        .map(PropertyStore::from_handle)
    }

    /// Open one of the three stores by type.
    pub fn open_property_store(
        &self,
        store_type: EffectsPropertyStoreType,
        access: StorageAccess,
    ) -> StatusOutcome<PropertyStore> {
        match store_type {
            EffectsPropertyStoreType::Default => self.open_default_property_store(access),
            EffectsPropertyStoreType::User => self.open_user_property_store(access),
            EffectsPropertyStoreType::Volatile => self.open_volatile_property_store(access),
        }
    }

    /// Discard the user's changes.
    pub fn reset_user_property_store(&self) -> StatusOutcome<()> {
        self.handle
            .call_status(|effects| unsafe { effects.ResetUserPropertyStore() })
    }

    pub fn reset_volatile_property_store(&self) -> StatusOutcome<()> {
        self.handle
            .call_status(|effects| unsafe { effects.ResetVolatilePropertyStore() })
    }

    /// Wrap `handler` in a property change bridge and register it.
    pub fn register_property_change_notification<H>(
        &self,
        handler: H,
    ) -> StatusOutcome<EffectsNotificationRegistration>
    where
        H: EffectsPropertyChangeHandler + 'static,
    {
        Registration::register(&self.handle, notifications::effects_property_change_client(handler))
    }
}

impl From<Handle<IAudioSystemEffectsPropertyStore>> for AudioSystemEffectsPropertyStore {
    fn from(handle: Handle<IAudioSystemEffectsPropertyStore>) -> Self {
        Self::from_handle(handle)
    }
}
