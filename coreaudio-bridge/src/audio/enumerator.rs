//! Endpoint enumeration using the MMDevice API.
//!
//! [`MMDeviceEnumerator`] is the root object: every device, collection and
//! notification registration is reached through it.

use super::device::{DataFlow, DeviceState, Role};
use super::endpoint::{MMDevice, MMDeviceCollection};
use super::interfaces::{IMMDevice, IMMDeviceCollection, IMMDeviceEnumerator, IMMNotificationClient};
use super::notifications::{self, DeviceNotificationHandler};
use crate::interop::memory::to_wide;
use crate::interop::{CollectionAdapter, Handle, NotificationSource, Registration, Status, StatusOutcome};

/// A registered endpoint notification bridge.
pub type EndpointNotificationRegistration = Registration<IMMDeviceEnumerator, IMMNotificationClient>;

impl NotificationSource<IMMNotificationClient> for IMMDeviceEnumerator {
    fn register(source: &Handle<Self>, client: &Handle<IMMNotificationClient>) -> Status {
        unsafe { source.RegisterEndpointNotificationCallback(client.as_raw()) }.into()
    }

    fn unregister(source: &Handle<Self>, client: &Handle<IMMNotificationClient>) -> Status {
        unsafe { source.UnregisterEndpointNotificationCallback(client.as_raw()) }.into()
    }
}

/// Device enumerator. Wrapper around `IMMDeviceEnumerator`.
#[derive(Debug, Clone)]
pub struct MMDeviceEnumerator {
    handle: Handle<IMMDeviceEnumerator>,
}

impl MMDeviceEnumerator {
    /// Create the system enumerator.
    ///
    /// Note: COM must be initialized on this thread (see
    /// [`ComGuard`](crate::platform::ComGuard)).
    #[cfg(windows)]
    pub fn create() -> Result<Self, crate::interop::BridgeError> {
        use super::device::ClsCtx;
        use crate::platform::{create_instance, CLSID_MM_DEVICE_ENUMERATOR};

        let handle = create_instance::<IMMDeviceEnumerator>(&CLSID_MM_DEVICE_ENUMERATOR, ClsCtx::ALL)?;
        Ok(Self::from_handle(handle))
    }

    pub fn from_handle(handle: Handle<IMMDeviceEnumerator>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &Handle<IMMDeviceEnumerator> {
        &self.handle
    }

    /// Endpoints with the given flow whose state is in `state_mask`.
    pub fn enum_audio_endpoints(
        &self,
        flow: DataFlow,
        state_mask: DeviceState,
    ) -> StatusOutcome<MMDeviceCollection> {
        unsafe {
            self.handle.call_handle::<IMMDeviceCollection>(|enumerator, out| {
                enumerator.EnumAudioEndpoints(flow as i32, state_mask.bits(), out)
            })
        }
        .map(CollectionAdapter::new)
    }

    /// The default endpoint for a flow and role. `E_NOTFOUND` when there is
    /// none.
    pub fn default_audio_endpoint(&self, flow: DataFlow, role: Role) -> StatusOutcome<MMDevice> {
        unsafe {
            self.handle.call_handle::<IMMDevice>(|enumerator, out| {
                enumerator.GetDefaultAudioEndpoint(flow as i32, role as i32, out)
            })
        }
        .map(MMDevice::from_handle)
    }

    /// Look up a device by its endpoint ID string.
    pub fn device(&self, id: &str) -> StatusOutcome<MMDevice> {
        let wide = to_wide(id);
        unsafe {
            self.handle
                .call_handle::<IMMDevice>(|enumerator, out| enumerator.GetDevice(wide.as_ptr(), out))
        }
        .map(MMDevice::from_handle)
    }

    /// Active render endpoints.
    pub fn speakers(&self) -> StatusOutcome<MMDeviceCollection> {
        self.enum_audio_endpoints(DataFlow::Render, DeviceState::ACTIVE)
    }

    /// Active capture endpoints.
    pub fn microphones(&self) -> StatusOutcome<MMDeviceCollection> {
        self.enum_audio_endpoints(DataFlow::Capture, DeviceState::ACTIVE)
    }

    pub fn default_speaker(&self) -> StatusOutcome<MMDevice> {
        self.default_audio_endpoint(DataFlow::Render, Role::Multimedia)
    }

    pub fn default_microphone(&self) -> StatusOutcome<MMDevice> {
        self.default_audio_endpoint(DataFlow::Capture, Role::Multimedia)
    }

    /// Wrap `handler` in a notification bridge and register it. Events
    /// arrive on threads owned by the audio subsystem until the returned
    /// registration is unregistered or dropped.
    pub fn register_endpoint_notification_callback<H>(
        &self,
        handler: H,
    ) -> StatusOutcome<EndpointNotificationRegistration>
    where
        H: DeviceNotificationHandler + 'static,
    {
        Registration::register(&self.handle, notifications::device_notification_client(handler))
    }
}

impl From<Handle<IMMDeviceEnumerator>> for MMDeviceEnumerator {
    fn from(handle: Handle<IMMDeviceEnumerator>) -> Self {
        Self::from_handle(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeAudioSystem, FakeDevice};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_follow_role() {
        let system = FakeAudioSystem::builder()
            .device(FakeDevice::render("spk-a", "Speakers A"))
            .device(FakeDevice::render("spk-b", "Speakers B").default_for(Role::Communications))
            .device(FakeDevice::capture("mic-a", "Microphone A"))
            .build();
        let enumerator = system.enumerator();

        let speaker = enumerator.default_speaker().unwrap();
        assert_eq!(speaker.id().unwrap(), "spk-a");

        let comms = enumerator
            .default_audio_endpoint(DataFlow::Render, Role::Communications)
            .unwrap();
        assert_eq!(comms.id().unwrap(), "spk-b");

        assert_eq!(enumerator.default_microphone().unwrap().id().unwrap(), "mic-a");
    }

    #[test]
    fn test_no_default_endpoint() {
        let system = FakeAudioSystem::builder()
            .device(FakeDevice::render("spk-a", "Speakers A"))
            .build();
        let outcome = system.enumerator().default_microphone();
        assert_eq!(outcome.status(), Status::E_NOTFOUND);
        assert!(outcome.ok().is_none());
    }

    #[test]
    fn test_unknown_device_id() {
        let system = FakeAudioSystem::builder().build();
        assert_eq!(system.enumerator().device("missing").status(), Status::E_NOTFOUND);
    }

    #[test]
    fn test_empty_speaker_collection() {
        let system = FakeAudioSystem::builder()
            .device(FakeDevice::capture("mic-a", "Microphone A"))
            .build();
        let speakers = system.enumerator().speakers().unwrap();
        assert_eq!(speakers.count(), 0);
        assert_eq!(speakers.iter().count(), 0);
    }

    #[test]
    fn test_speakers_and_microphones_split_by_flow() {
        let system = FakeAudioSystem::builder()
            .device(FakeDevice::render("spk-a", "Speakers A"))
            .device(FakeDevice::capture("mic-a", "Microphone A"))
            .device(FakeDevice::capture("mic-b", "Microphone B"))
            .build();
        let enumerator = system.enumerator();
        assert_eq!(enumerator.speakers().unwrap().count(), 1);
        assert_eq!(enumerator.microphones().unwrap().count(), 2);
    }
}
