//! Audio module for Windows Core Audio API interactions.
//!
//! Typed wrappers over the MMDevice, endpoint volume, metering,
//! audio-effects property store and policy interfaces, built on the [`interop`](crate::interop) layer. Every call
//! returns a [`StatusOutcome`](crate::interop::StatusOutcome).

pub mod device;
pub mod effects;
pub mod endpoint;
pub mod enumerator;
pub mod interfaces;
pub mod meter;
pub mod notifications;
pub mod policy;
pub mod property_store;
pub mod volume;

pub use device::{
    ClsCtx, DataFlow, DeviceEvent, DeviceState, EndpointFormFactor, HardwareSupport, Role, VolumeRange,
    VolumeStepInfo,
};
pub use effects::{AudioSystemEffectsPropertyStore, EffectsNotificationRegistration, EffectsPropertyStoreType};
pub use endpoint::{MMDevice, MMDeviceCollection, MMEndpoint};
pub use enumerator::{EndpointNotificationRegistration, MMDeviceEnumerator};
pub use meter::AudioMeterInformation;
pub use notifications::{
    create_event_channel, DeviceNotificationHandler, EffectsPropertyChangeHandler, EventForwarder,
    VolumeNotification, VolumeNotificationHandler,
};
pub use policy::PolicyConfig;
pub use property_store::{PropertyKey, PropertyStore, RawPropVariant, StorageAccess};
pub use volume::{AudioEndpointVolume, AudioEndpointVolumeEx, VolumeNotificationRegistration};
