//! Interface declarations for the MMDevice and endpoint volume APIs.
//!
//! Slot order and signatures follow `mmdeviceapi.h`, `endpointvolume.h`,
//! `audioclient.h` and `propsys.h`. Enumerations travel as `i32`, `BOOL` as
//! `i32`, event-context GUIDs as nullable pointers and interface outputs as
//! `*mut *mut c_void` slots.

#![allow(non_snake_case)]

use super::property_store::{PropertyKey, RawPropVariant};
use std::ffi::c_void;
use windows_core::{interface, IUnknown, IUnknown_Vtbl, GUID, HRESULT};

#[interface("A95664D2-9614-4F35-A746-DE8DB63617E6")]
pub unsafe trait IMMDeviceEnumerator: IUnknown {
    pub fn EnumAudioEndpoints(&self, flow: i32, state_mask: u32, devices: *mut *mut c_void) -> HRESULT;
    pub fn GetDefaultAudioEndpoint(&self, flow: i32, role: i32, endpoint: *mut *mut c_void) -> HRESULT;
    pub fn GetDevice(&self, id: *const u16, device: *mut *mut c_void) -> HRESULT;
    pub fn RegisterEndpointNotificationCallback(&self, client: *mut c_void) -> HRESULT;
    pub fn UnregisterEndpointNotificationCallback(&self, client: *mut c_void) -> HRESULT;
}

#[interface("0BD7A1BE-7A1A-44DB-8397-CC5392387B5E")]
pub unsafe trait IMMDeviceCollection: IUnknown {
    pub fn GetCount(&self, count: *mut u32) -> HRESULT;
    pub fn Item(&self, index: u32, device: *mut *mut c_void) -> HRESULT;
}

#[interface("D666063F-1587-4E43-81F1-B948E807363F")]
pub unsafe trait IMMDevice: IUnknown {
    pub fn Activate(
        &self,
        iid: *const GUID,
        clsctx: u32,
        params: *const RawPropVariant,
        out: *mut *mut c_void,
    ) -> HRESULT;
    pub fn OpenPropertyStore(&self, access: u32, store: *mut *mut c_void) -> HRESULT;
    pub fn GetId(&self, id: *mut *mut u16) -> HRESULT;
    pub fn GetState(&self, state: *mut u32) -> HRESULT;
}

#[interface("1BE09788-6894-4089-8586-9A2A6C265AC5")]
pub unsafe trait IMMEndpoint: IUnknown {
    pub fn GetDataFlow(&self, flow: *mut i32) -> HRESULT;
}

#[interface("7991EEC9-7E89-4D85-8390-6C703CEC60C0")]
pub unsafe trait IMMNotificationClient: IUnknown {
    pub fn OnDeviceStateChanged(&self, id: *const u16, new_state: u32) -> HRESULT;
    pub fn OnDeviceAdded(&self, id: *const u16) -> HRESULT;
    pub fn OnDeviceRemoved(&self, id: *const u16) -> HRESULT;
    pub fn OnDefaultDeviceChanged(&self, flow: i32, role: i32, id: *const u16) -> HRESULT;
    pub fn OnPropertyValueChanged(&self, id: *const u16, key: PropertyKey) -> HRESULT;
}

#[interface("5CDF2C82-841E-4546-9722-0CF74078229A")]
pub unsafe trait IAudioEndpointVolume: IUnknown {
    pub fn RegisterControlChangeNotify(&self, client: *mut c_void) -> HRESULT;
    pub fn UnregisterControlChangeNotify(&self, client: *mut c_void) -> HRESULT;
    pub fn GetChannelCount(&self, count: *mut u32) -> HRESULT;
    pub fn SetMasterVolumeLevel(&self, level_db: f32, context: *const GUID) -> HRESULT;
    pub fn SetMasterVolumeLevelScalar(&self, level: f32, context: *const GUID) -> HRESULT;
    pub fn GetMasterVolumeLevel(&self, level_db: *mut f32) -> HRESULT;
    pub fn GetMasterVolumeLevelScalar(&self, level: *mut f32) -> HRESULT;
    pub fn SetChannelVolumeLevel(&self, channel: u32, level_db: f32, context: *const GUID) -> HRESULT;
    pub fn SetChannelVolumeLevelScalar(&self, channel: u32, level: f32, context: *const GUID) -> HRESULT;
    pub fn GetChannelVolumeLevel(&self, channel: u32, level_db: *mut f32) -> HRESULT;
    pub fn GetChannelVolumeLevelScalar(&self, channel: u32, level: *mut f32) -> HRESULT;
    pub fn SetMute(&self, mute: i32, context: *const GUID) -> HRESULT;
    pub fn GetMute(&self, mute: *mut i32) -> HRESULT;
    pub fn GetVolumeStepInfo(&self, step: *mut u32, step_count: *mut u32) -> HRESULT;
    pub fn VolumeStepUp(&self, context: *const GUID) -> HRESULT;
    pub fn VolumeStepDown(&self, context: *const GUID) -> HRESULT;
    pub fn QueryHardwareSupport(&self, mask: *mut u32) -> HRESULT;
    pub fn GetVolumeRange(&self, min_db: *mut f32, max_db: *mut f32, increment_db: *mut f32) -> HRESULT;
}

#[interface("66E11784-F695-4F28-A505-A7080081A78F")]
pub unsafe trait IAudioEndpointVolumeEx: IAudioEndpointVolume {
    pub fn GetVolumeRangeChannel(
        &self,
        channel: u32,
        min_db: *mut f32,
        max_db: *mut f32,
        increment_db: *mut f32,
    ) -> HRESULT;
}

/// AUDIO_VOLUME_NOTIFICATION_DATA. `channel_volumes` is declared with one
/// element; the real array has `channels` entries.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AudioVolumeNotificationData {
    pub event_context: GUID,
    pub muted: i32,
    pub master_volume: f32,
    pub channels: u32,
    pub channel_volumes: [f32; 1],
}

#[interface("657804FA-D6AD-4496-8A60-352752AF4F89")]
pub unsafe trait IAudioEndpointVolumeCallback: IUnknown {
    pub fn OnNotify(&self, data: *const AudioVolumeNotificationData) -> HRESULT;
}

#[interface("C02216F6-8C67-4B5B-9D00-D008E73E0064")]
pub unsafe trait IAudioMeterInformation: IUnknown {
    pub fn GetPeakValue(&self, peak: *mut f32) -> HRESULT;
    pub fn GetMeteringChannelCount(&self, count: *mut u32) -> HRESULT;
    pub fn GetChannelsPeakValues(&self, count: u32, peaks: *mut f32) -> HRESULT;
    pub fn QueryHardwareSupport(&self, mask: *mut u32) -> HRESULT;
}

#[interface("886D8EEB-8CF2-4446-8D02-CDBA1DBDCF99")]
pub unsafe trait IPropertyStore: IUnknown {
    pub fn GetCount(&self, count: *mut u32) -> HRESULT;
    pub fn GetAt(&self, index: u32, key: *mut PropertyKey) -> HRESULT;
    pub fn GetValue(&self, key: *const PropertyKey, value: *mut RawPropVariant) -> HRESULT;
    pub fn SetValue(&self, key: *const PropertyKey, value: *const RawPropVariant) -> HRESULT;
    pub fn Commit(&self) -> HRESULT;
}

/// Per-endpoint store of audio-effects settings, activated from an
/// `IMMDevice` with a `VT_CLSID` context parameter.
#[interface("302AE7F9-D7E0-43E4-971B-1F8293613D2A")]
pub unsafe trait IAudioSystemEffectsPropertyStore: IUnknown {
    pub fn OpenDefaultPropertyStore(&self, access: u32, store: *mut *mut c_void) -> HRESULT;
    pub fn OpenUserPropertyStore(&self, access: u32, store: *mut *mut c_void) -> HRESULT;
    pub fn OpenVolatilePropertyStore(&self, access: u32, store: *mut *mut c_void) -> HRESULT;
    pub fn ResetUserPropertyStore(&self) -> HRESULT;
    pub fn ResetVolatilePropertyStore(&self) -> HRESULT;
    pub fn RegisterPropertyChangeNotification(&self, client: *mut c_void) -> HRESULT;
    pub fn UnregisterPropertyChangeNotification(&self, client: *mut c_void) -> HRESULT;
}

#[interface("20049D40-56D5-400E-A2EF-385599FEED49")]
pub unsafe trait IAudioSystemEffectsPropertyChangeNotificationClient: IUnknown {
    /// `store_type` is an AUDIO_SYSTEMEFFECTS_PROPERTYSTORE_TYPE.
    pub fn OnPropertyChanged(&self, store_type: i32, key: PropertyKey) -> HRESULT;
}

/// Undocumented but stable; used to change the default endpoint.
#[interface("F8679F50-850A-41CF-9C72-430F290290C8")]
pub unsafe trait IPolicyConfig: IUnknown {
    /// The format and period slots are declared without parameters; only
    /// their position in the vtable matters here.
    fn GetMixFormat(&self) -> HRESULT;
    fn GetDeviceFormat(&self) -> HRESULT;
    fn ResetDeviceFormat(&self) -> HRESULT;
    fn SetDeviceFormat(&self) -> HRESULT;
    fn GetProcessingPeriod(&self) -> HRESULT;
    fn SetProcessingPeriod(&self) -> HRESULT;
    fn GetShareMode(&self) -> HRESULT;
    fn SetShareMode(&self) -> HRESULT;
    fn GetPropertyValue(&self) -> HRESULT;
    fn SetPropertyValue(&self) -> HRESULT;
    pub fn SetDefaultEndpoint(&self, id: *const u16, role: i32) -> HRESULT;
    pub fn SetEndpointVisibility(&self, id: *const u16, visible: i32) -> HRESULT;
}
