//! Endpoint devices and device collections.

use super::device::{ClsCtx, DataFlow, DeviceState, EndpointFormFactor};
use super::effects::AudioSystemEffectsPropertyStore;
use super::interfaces::{
    IAudioEndpointVolume, IAudioMeterInformation, IAudioSystemEffectsPropertyStore, IMMDevice,
    IMMDeviceCollection, IMMEndpoint, IPropertyStore,
};
use super::meter::AudioMeterInformation;
use super::property_store::{
    PropertyStore, RawPropVariant, StorageAccess, PKEY_AUDIO_ENDPOINT_FORM_FACTOR, PKEY_DEVICE_DESC,
    PKEY_DEVICE_FRIENDLY_NAME, VT_CLSID,
};
use super::volume::AudioEndpointVolume;
use crate::interop::{CollectionAdapter, Handle, IndexedCollection, Status, StatusOutcome, TaskString, GUID};
use std::ptr;
use windows_core::Interface;

/// An audio endpoint device. Wrapper around `IMMDevice`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MMDevice {
    handle: Handle<IMMDevice>,
}

impl MMDevice {
    pub fn from_handle(handle: Handle<IMMDevice>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle<IMMDevice> {
        &self.handle
    }

    /// Create an object implementing `I` on this device.
    pub fn activate<I: Interface>(&self, clsctx: ClsCtx) -> StatusOutcome<Handle<I>> {
        self.activate_with_params(clsctx, None)
    }

    /// [`activate`](Self::activate) with an activation parameter, for the
    /// interfaces that take one.
    pub fn activate_with_params<I: Interface>(
        &self,
        clsctx: ClsCtx,
        params: Option<&RawPropVariant>,
    ) -> StatusOutcome<Handle<I>> {
        let params = params.map_or(ptr::null(), |value| value as *const RawPropVariant);
        unsafe {
            self.handle
                .call_handle::<I>(|device, out| device.Activate(&I::IID, clsctx.bits(), params, out))
        }
    }

    pub fn activate_endpoint_volume(&self) -> StatusOutcome<AudioEndpointVolume> {
        self.activate::<IAudioEndpointVolume>(ClsCtx::ALL)
            .map(AudioEndpointVolume::from_handle)
    }

    pub fn activate_meter_information(&self) -> StatusOutcome<AudioMeterInformation> {
        self.activate::<IAudioMeterInformation>(ClsCtx::ALL)
            .map(AudioMeterInformation::from_handle)
    }

    /// The audio-effects property store for `context`, a GUID the effects
    /// component uses to keep its settings apart from others'.
    pub fn activate_audio_system_effects_property_store(
        &self,
        context: GUID,
    ) -> StatusOutcome<AudioSystemEffectsPropertyStore> {
        let params = RawPropVariant::from_clsid(&context);
        if params.vt != VT_CLSID {
            return StatusOutcome::failure(Status::E_OUTOFMEMORY);
        }
        self.activate_with_params::<IAudioSystemEffectsPropertyStore>(ClsCtx::ALL, Some(&params))
            .map(AudioSystemEffectsPropertyStore::from_handle)
    }

    pub fn open_property_store(&self, access: StorageAccess) -> StatusOutcome<PropertyStore> {
        unsafe {
            self.handle
                .call_handle::<IPropertyStore>(|device, out| device.OpenPropertyStore(access as u32, out))
        }
        .map(PropertyStore::from_handle)
    }

    pub fn property_store_read(&self) -> StatusOutcome<PropertyStore> {
        self.open_property_store(StorageAccess::Read)
    }

    /// The endpoint ID string. A null ID reads as empty.
    pub fn id(&self) -> StatusOutcome<String> {
        self.handle.call(
            |device, out: &mut TaskString| unsafe { device.GetId(out.as_mut_ptr()) },
            |id| id.to_string_lossy().unwrap_or_default(),
        )
    }

    pub fn state(&self) -> StatusOutcome<DeviceState> {
        self.handle.call(
            |device, out: &mut u32| unsafe { device.GetState(out) },
            DeviceState::from_bits_retain,
        )
    }

    /// The `IMMEndpoint` view of this device.
    pub fn endpoint(&self) -> StatusOutcome<MMEndpoint> {
        self.handle
            .query_capability::<IMMEndpoint>()
            .map(MMEndpoint::from_handle)
    }

    /// `DEVPKEY_Device_FriendlyName`, e.g. "Speakers (Realtek Audio)".
    pub fn friendly_name(&self) -> StatusOutcome<String> {
        self.property_store_read()
            .and_then(|store| store.string_value(&PKEY_DEVICE_FRIENDLY_NAME))
            .map(Option::unwrap_or_default)
    }

    pub fn description(&self) -> StatusOutcome<String> {
        self.property_store_read()
            .and_then(|store| store.string_value(&PKEY_DEVICE_DESC))
            .map(Option::unwrap_or_default)
    }

    pub fn form_factor(&self) -> StatusOutcome<EndpointFormFactor> {
        self.property_store_read()
            .and_then(|store| store.u32_value(&PKEY_AUDIO_ENDPOINT_FORM_FACTOR))
            .map(|raw| raw.map_or(EndpointFormFactor::Unknown, EndpointFormFactor::from_raw))
    }
}

impl From<Handle<IMMDevice>> for MMDevice {
    fn from(handle: Handle<IMMDevice>) -> Self {
        Self::from_handle(handle)
    }
}

/// Wrapper around `IMMEndpoint`.
#[derive(Debug, Clone)]
pub struct MMEndpoint {
    handle: Handle<IMMEndpoint>,
}

impl MMEndpoint {
    pub fn from_handle(handle: Handle<IMMEndpoint>) -> Self {
        Self { handle }
    }

    /// Data-flow direction. A value outside the known range reads as
    /// [`DataFlow::All`].
    pub fn data_flow(&self) -> StatusOutcome<DataFlow> {
        self.handle.call(
            |endpoint, out: &mut i32| unsafe { endpoint.GetDataFlow(out) },
            |raw| DataFlow::from_raw(raw).unwrap_or(DataFlow::All),
        )
    }
}

impl IndexedCollection for IMMDeviceCollection {
    type Element = MMDevice;

    fn count(collection: &Handle<Self>) -> StatusOutcome<u32> {
        collection.call(|devices, out: &mut u32| unsafe { devices.GetCount(out) }, |n| n)
    }

    fn item(collection: &Handle<Self>, index: u32) -> StatusOutcome<MMDevice> {
        unsafe { collection.call_handle::<IMMDevice>(|devices, out| devices.Item(index, out)) }
            .map(MMDevice::from_handle)
    }
}

/// Endpoints returned by [`MMDeviceEnumerator::enum_audio_endpoints`](super::MMDeviceEnumerator::enum_audio_endpoints).
pub type MMDeviceCollection = CollectionAdapter<IMMDeviceCollection>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeAudioSystem, FakeDevice};
    use crate::interop::BridgeError;
    use pretty_assertions::assert_eq;

    fn system() -> FakeAudioSystem {
        FakeAudioSystem::builder()
            .device(FakeDevice::render("{0.0.0.00000000}.{spk-1}", "Speakers (Fake Audio)"))
            .device(
                FakeDevice::capture("{0.0.1.00000000}.{mic-1}", "Microphone (Fake Audio)")
                    .state(DeviceState::DISABLED),
            )
            .build()
    }

    #[test]
    fn test_device_identity_and_properties() {
        let system = system();
        let device = system
            .enumerator()
            .device("{0.0.0.00000000}.{spk-1}")
            .unwrap();

        assert_eq!(device.id().unwrap(), "{0.0.0.00000000}.{spk-1}");
        assert_eq!(device.state().unwrap(), DeviceState::ACTIVE);
        assert_eq!(device.friendly_name().unwrap(), "Speakers (Fake Audio)");
        assert_eq!(device.form_factor().unwrap(), EndpointFormFactor::Speakers);
        assert_eq!(device.endpoint().unwrap().data_flow().unwrap(), DataFlow::Render);
    }

    #[test]
    fn test_capture_endpoint_state() {
        let system = system();
        let device = system
            .enumerator()
            .device("{0.0.1.00000000}.{mic-1}")
            .unwrap();
        assert_eq!(device.state().unwrap(), DeviceState::DISABLED);
        assert_eq!(device.endpoint().unwrap().data_flow().unwrap(), DataFlow::Capture);
        assert_eq!(device.form_factor().unwrap(), EndpointFormFactor::Microphone);
    }

    #[test]
    fn test_missing_form_factor_reads_unknown() {
        let system = FakeAudioSystem::builder()
            .device(FakeDevice::render("spdif", "Digital Output").without_form_factor())
            .build();
        let device = system.enumerator().device("spdif").unwrap();
        assert_eq!(
            device
                .property_store_read()
                .unwrap()
                .u32_value(&PKEY_AUDIO_ENDPOINT_FORM_FACTOR)
                .unwrap(),
            None
        );
        assert_eq!(device.form_factor().unwrap(), EndpointFormFactor::Unknown);
    }

    #[test]
    fn test_activate_unsupported_interface() {
        let system = system();
        let device = system.enumerator().default_speaker().unwrap();
        let outcome = device.activate::<IMMDeviceCollection>(ClsCtx::ALL);
        assert_eq!(outcome.status(), Status::E_NOINTERFACE);
    }

    #[test]
    fn test_effects_store_needs_clsid_parameter() {
        let system = system();
        let device = system.enumerator().default_speaker().unwrap();
        assert_eq!(
            device
                .activate::<IAudioSystemEffectsPropertyStore>(ClsCtx::ALL)
                .status(),
            Status::E_INVALIDARG
        );
        let wrong_type = RawPropVariant::from_u32(1);
        assert_eq!(
            device
                .activate_with_params::<IAudioSystemEffectsPropertyStore>(ClsCtx::ALL, Some(&wrong_type))
                .status(),
            Status::E_INVALIDARG
        );
        assert!(device
            .activate_audio_system_effects_property_store(GUID::from_u128(0x1))
            .is_success());
    }

    #[test]
    fn test_collection_filters_by_state() {
        let system = system();
        let enumerator = system.enumerator();

        let active = enumerator
            .enum_audio_endpoints(DataFlow::All, DeviceState::ACTIVE)
            .unwrap();
        assert_eq!(active.count(), 1);

        let everything = enumerator
            .enum_audio_endpoints(DataFlow::All, DeviceState::all())
            .unwrap();
        let ids: Vec<String> = everything
            .iter()
            .map(|device| device.unwrap().id().unwrap())
            .collect();
        assert_eq!(
            ids,
            vec!["{0.0.0.00000000}.{spk-1}", "{0.0.1.00000000}.{mic-1}"]
        );
        assert!(matches!(
            everything.get(2),
            Err(BridgeError::IndexOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn test_handles_released_with_wrappers() {
        let system = system();
        let baseline = system.live_objects();
        {
            let device = system.enumerator().default_speaker().unwrap();
            let _volume = device.activate_endpoint_volume().unwrap();
            let _store = device.property_store_read().unwrap();
            let _endpoint = device.endpoint().unwrap();
            assert!(system.live_objects() > baseline);
        }
        assert_eq!(system.live_objects(), baseline);
    }
}
