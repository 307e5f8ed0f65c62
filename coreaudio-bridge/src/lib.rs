//! Core Audio Bridge - Library
//!
//! A typed bridge over the Windows Core Audio endpoint interfaces.
//!
//! ## Layers
//!
//! - [`interop`]: status outcomes, reference-counted handles, capability
//!   upgrades, indexed collections and callback registration, on top of
//!   `windows-core`. Platform independent.
//! - [`audio`]: the MMDevice, endpoint volume, metering, property store,
//!   audio-effects store and policy interfaces, wrapped on top of `interop`.
//! - [`platform`] (Windows only): the COM apartment guard and the root factory.
//! - [`fake`] (tests and the `fake` feature): an in-process subsystem that
//!   serves the same interfaces, so everything above runs on any host.
//!
//! Expected failures are values. A call that the subsystem refuses returns a
//! [`StatusOutcome`] carrying the untouched status code; nothing panics unless
//! the caller unwraps.

pub mod audio;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod interop;
#[cfg(windows)]
pub mod platform;

pub use audio::{
    AudioEndpointVolume, AudioMeterInformation, AudioSystemEffectsPropertyStore, DataFlow, DeviceEvent,
    DeviceNotificationHandler, DeviceState, EffectsPropertyStoreType, MMDevice, MMDeviceEnumerator, PolicyConfig,
    Role, VolumeNotification,
};
pub use interop::{BridgeError, Handle, Status, StatusOutcome, GUID};
#[cfg(windows)]
pub use platform::ComGuard;
