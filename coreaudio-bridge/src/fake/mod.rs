//! An in-process stand-in for the Core Audio subsystem.
//!
//! [`FakeAudioSystem`] serves the same interfaces the real subsystem does,
//! as `#[implement]` objects, so the wrappers in [`audio`](crate::audio)
//! run unchanged against it on any platform. Tests use it to inject
//! notifications and to check that every object handed out is released.
//!
//! ```ignore
//! let system = FakeAudioSystem::builder()
//!     .device(FakeDevice::render("{0.0.0.00000000}.{speakers}", "Speakers"))
//!     .build();
//! let speaker = system.enumerator().default_speaker().unwrap();
//! ```

mod objects;

use crate::audio::interfaces::{
    IAudioEndpointVolumeCallback, IAudioSystemEffectsPropertyChangeNotificationClient, IMMNotificationClient,
};
use crate::audio::{
    DataFlow, DeviceState, EffectsPropertyStoreType, EndpointFormFactor, MMDeviceEnumerator, PolicyConfig,
    PropertyKey, RawPropVariant, Role,
};
use crate::audio::property_store::{PKEY_AUDIO_ENDPOINT_FORM_FACTOR, PKEY_DEVICE_DESC, PKEY_DEVICE_FRIENDLY_NAME};
use crate::interop::memory::to_wide;
use crate::interop::{Handle, Status, GUID};
use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Decibel range reported by every fake endpoint.
pub const MIN_DB: f32 = -65.25;
pub const MAX_DB: f32 = 0.0;
pub const INCREMENT_DB: f32 = 0.03125;

/// Number of volume steps reported by every fake endpoint.
pub const STEP_COUNT: u32 = 51;

/// Description of one endpoint to install in a [`FakeAudioSystem`].
#[derive(Debug, Clone)]
pub struct FakeDevice {
    id: String,
    name: String,
    description: String,
    flow: DataFlow,
    state: DeviceState,
    form_factor: Option<EndpointFormFactor>,
    peaks: Vec<f32>,
    default_for: Vec<Role>,
    effects_defaults: Vec<(PropertyKey, StoredValue)>,
}

impl FakeDevice {
    fn new(id: &str, name: &str, flow: DataFlow) -> Self {
        let (description, form_factor, channels) = match flow {
            DataFlow::Capture => ("Microphone", EndpointFormFactor::Microphone, 1),
            _ => ("Speakers", EndpointFormFactor::Speakers, 2),
        };
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            flow,
            state: DeviceState::ACTIVE,
            form_factor: Some(form_factor),
            peaks: vec![0.0; channels],
            default_for: Vec::new(),
            effects_defaults: Vec::new(),
        }
    }

    /// An active, stereo render endpoint.
    pub fn render(id: &str, name: &str) -> Self {
        Self::new(id, name, DataFlow::Render)
    }

    /// An active, mono capture endpoint.
    pub fn capture(id: &str, name: &str) -> Self {
        Self::new(id, name, DataFlow::Capture)
    }

    pub fn state(mut self, state: DeviceState) -> Self {
        self.state = state;
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn form_factor(mut self, form_factor: EndpointFormFactor) -> Self {
        self.form_factor = Some(form_factor);
        self
    }

    /// Leave the form factor key out of the device's property store.
    pub fn without_form_factor(mut self) -> Self {
        self.form_factor = None;
        self
    }

    /// A value in the default audio-effects store, shared by every context.
    pub fn effects_default(mut self, key: PropertyKey, value: u32) -> Self {
        upsert(&mut self.effects_defaults, key, StoredValue::U32(value));
        self
    }

    pub fn channels(mut self, channels: usize) -> Self {
        self.peaks.resize(channels, 0.0);
        self
    }

    /// Per-channel meter peaks. Also sets the channel count.
    pub fn peaks(mut self, peaks: &[f32]) -> Self {
        self.peaks = peaks.to_vec();
        self
    }

    /// Make this the default for `role` in its flow. Without any claim,
    /// the first active device of a flow is the default for every role.
    pub fn default_for(mut self, role: Role) -> Self {
        self.default_for.push(role);
        self
    }
}

/// A property value as the fake stores keep it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StoredValue {
    U32(u32),
    Text(String),
    Clsid(GUID),
}

impl StoredValue {
    pub fn from_variant(value: &RawPropVariant) -> Option<Self> {
        value
            .u32()
            .map(Self::U32)
            .or_else(|| value.string().map(Self::Text))
            .or_else(|| value.clsid().map(Self::Clsid))
    }

    pub fn to_variant(&self) -> RawPropVariant {
        match self {
            Self::U32(value) => RawPropVariant::from_u32(*value),
            Self::Text(value) => RawPropVariant::from_string(value),
            Self::Clsid(value) => RawPropVariant::from_clsid(value),
        }
    }
}

pub(crate) type Properties = Vec<(PropertyKey, StoredValue)>;

/// Replace the value for `key`, or append it. Keys keep insertion order.
pub(crate) fn upsert(properties: &mut Properties, key: PropertyKey, value: StoredValue) {
    match properties.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => properties.push((key, value)),
    }
}

#[derive(Debug, Clone)]
pub(crate) struct VolumeModel {
    pub master: f32,
    pub channels: Vec<f32>,
    pub muted: bool,
}

impl VolumeModel {
    fn new(channels: usize) -> Self {
        Self {
            master: 1.0,
            channels: vec![1.0; channels],
            muted: false,
        }
    }

    pub fn step(&self) -> u32 {
        (self.master * (STEP_COUNT - 1) as f32).round() as u32
    }

    pub fn set_step(&mut self, step: u32) {
        self.master = step.min(STEP_COUNT - 1) as f32 / (STEP_COUNT - 1) as f32;
    }
}

pub(crate) struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub flow: DataFlow,
    pub state: DeviceState,
    pub form_factor: Option<EndpointFormFactor>,
    pub peaks: Vec<f32>,
    pub volume: VolumeModel,
    pub volume_clients: Vec<Handle<IAudioEndpointVolumeCallback>>,
    pub effects_defaults: Properties,
    /// User and volatile effects stores, keyed by context.
    pub effects: HashMap<(GUID, EffectsPropertyStoreType), Properties>,
    pub effects_clients: Vec<(GUID, Handle<IAudioSystemEffectsPropertyChangeNotificationClient>)>,
}

impl DeviceRecord {
    /// The device property store's contents.
    pub fn properties(&self) -> Properties {
        let mut properties = vec![
            (PKEY_DEVICE_FRIENDLY_NAME, StoredValue::Text(self.name.clone())),
            (PKEY_DEVICE_DESC, StoredValue::Text(self.description.clone())),
        ];
        if let Some(form_factor) = self.form_factor {
            properties.push((PKEY_AUDIO_ENDPOINT_FORM_FACTOR, StoredValue::U32(form_factor as u32)));
        }
        properties
    }

    pub fn effects_store(&self, context: GUID, store_type: EffectsPropertyStoreType) -> Properties {
        match store_type {
            EffectsPropertyStoreType::Default => self.effects_defaults.clone(),
            _ => self.effects.get(&(context, store_type)).cloned().unwrap_or_default(),
        }
    }
}

impl From<FakeDevice> for DeviceRecord {
    fn from(device: FakeDevice) -> Self {
        Self {
            volume: VolumeModel::new(device.peaks.len()),
            id: device.id,
            name: device.name,
            description: device.description,
            flow: device.flow,
            state: device.state,
            form_factor: device.form_factor,
            peaks: device.peaks,
            volume_clients: Vec::new(),
            effects_defaults: device.effects_defaults,
            effects: HashMap::new(),
            effects_clients: Vec::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct World {
    pub devices: Vec<DeviceRecord>,
    pub defaults: HashMap<(DataFlow, Role), String>,
    pub endpoint_clients: Vec<Handle<IMMNotificationClient>>,
}

impl World {
    pub fn device(&self, id: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn device_mut(&mut self, id: &str) -> Option<&mut DeviceRecord> {
        self.devices.iter_mut().find(|d| d.id == id)
    }
}

/// State shared by the system and every object it hands out.
#[derive(Default)]
pub(crate) struct Shared {
    world: Mutex<World>,
    live: AtomicUsize,
}

impl Shared {
    pub fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Call every registered endpoint client. The lock is not held while
    /// clients run, so handlers may call back into the system.
    pub fn dispatch_endpoint(
        &self,
        event: &'static str,
        call: impl Fn(&IMMNotificationClient) -> windows_core::HRESULT,
    ) -> Vec<Status> {
        let clients = self.world().endpoint_clients.clone();
        tracing::trace!(event, clients = clients.len(), "Dispatching endpoint notification");
        clients.iter().map(|client| Status::from(call(client))).collect()
    }

    /// Call the effects clients registered on `device_id` for `context`, or
    /// for every context when `context` is `None`.
    pub fn dispatch_effects(
        &self,
        device_id: &str,
        context: Option<GUID>,
        store_type: i32,
        key: PropertyKey,
    ) -> Vec<Status> {
        let clients: Vec<_> = self
            .world()
            .device(device_id)
            .map(|device| {
                device
                    .effects_clients
                    .iter()
                    .filter(|(registered, _)| context.map_or(true, |c| c == *registered))
                    .map(|(_, client)| client.clone())
                    .collect()
            })
            .unwrap_or_default();
        tracing::trace!(device_id, store_type, clients = clients.len(), "Dispatching effects notification");
        clients
            .iter()
            .map(|client| Status::from(unsafe { client.OnPropertyChanged(store_type, key) }))
            .collect()
    }

    pub fn notify_device_state_changed(&self, device_id: &str, new_state: u32) -> Vec<Status> {
        let id = to_wide(device_id);
        self.dispatch_endpoint("OnDeviceStateChanged", |client| unsafe {
            client.OnDeviceStateChanged(id.as_ptr(), new_state)
        })
    }

    pub fn notify_default_device_changed(&self, flow: i32, role: i32, device_id: Option<&str>) -> Vec<Status> {
        let id = device_id.map(to_wide);
        let id_ptr = id.as_ref().map_or(ptr::null(), |w| w.as_ptr());
        self.dispatch_endpoint("OnDefaultDeviceChanged", |client| unsafe {
            client.OnDefaultDeviceChanged(flow, role, id_ptr)
        })
    }
}

/// Object state that counts towards [`FakeAudioSystem::live_objects`].
pub(crate) struct Tracked<T> {
    pub shared: Arc<Shared>,
    pub inner: T,
}

impl<T> Tracked<T> {
    pub fn new(shared: &Arc<Shared>, inner: T) -> Self {
        shared.live.fetch_add(1, Ordering::SeqCst);
        Self {
            shared: shared.clone(),
            inner,
        }
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An in-process audio subsystem. See the [module docs](self).
pub struct FakeAudioSystem {
    shared: Arc<Shared>,
}

/// Builder for [`FakeAudioSystem`].
#[derive(Debug, Default)]
pub struct FakeAudioSystemBuilder {
    devices: Vec<FakeDevice>,
}

impl FakeAudioSystemBuilder {
    pub fn device(mut self, device: FakeDevice) -> Self {
        self.devices.push(device);
        self
    }

    pub fn build(self) -> FakeAudioSystem {
        let mut world = World::default();
        for flow in [DataFlow::Render, DataFlow::Capture] {
            for role in Role::ALL {
                let claimed = self
                    .devices
                    .iter()
                    .find(|d| d.flow == flow && d.default_for.contains(&role));
                let fallback = self
                    .devices
                    .iter()
                    .find(|d| d.flow == flow && d.state.contains(DeviceState::ACTIVE));
                if let Some(device) = claimed.or(fallback) {
                    world.defaults.insert((flow, role), device.id.clone());
                }
            }
        }
        world.devices = self.devices.into_iter().map(DeviceRecord::from).collect();

        FakeAudioSystem {
            shared: Arc::new(Shared {
                world: Mutex::new(world),
                live: AtomicUsize::new(0),
            }),
        }
    }
}

impl FakeAudioSystem {
    pub fn builder() -> FakeAudioSystemBuilder {
        FakeAudioSystemBuilder::default()
    }

    /// A new enumerator object.
    pub fn enumerator(&self) -> MMDeviceEnumerator {
        MMDeviceEnumerator::from_handle(objects::enumerator(&self.shared))
    }

    /// A new policy config object.
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig::from_handle(objects::policy_config(&self.shared))
    }

    /// Objects handed out and not yet released.
    pub fn live_objects(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Endpoint notification clients currently registered.
    pub fn endpoint_client_count(&self) -> usize {
        self.shared.world().endpoint_clients.len()
    }

    /// Volume callbacks currently registered on `device_id`.
    pub fn volume_client_count(&self, device_id: &str) -> usize {
        self.shared
            .world()
            .device(device_id)
            .map_or(0, |d| d.volume_clients.len())
    }

    /// Effects property change clients currently registered on `device_id`.
    pub fn effects_client_count(&self, device_id: &str) -> usize {
        self.shared
            .world()
            .device(device_id)
            .map_or(0, |d| d.effects_clients.len())
    }

    /// Change a device's state and notify endpoint clients.
    pub fn set_device_state(&self, device_id: &str, state: DeviceState) -> Vec<Status> {
        if let Some(device) = self.shared.world().device_mut(device_id) {
            device.state = state;
        }
        self.notify_device_state_changed(device_id, state.bits())
    }

    /// Install a device and notify endpoint clients.
    pub fn add_device(&self, device: FakeDevice) -> Vec<Status> {
        let id = device.id.clone();
        self.shared.world().devices.push(device.into());
        self.notify_device_added(&id)
    }

    /// Remove a device and notify endpoint clients. Objects already handed
    /// out for it report `AUDCLNT_E_DEVICE_INVALIDATED` from then on.
    pub fn remove_device(&self, device_id: &str) -> Vec<Status> {
        {
            let mut world = self.shared.world();
            world.devices.retain(|d| d.id != device_id);
            world.defaults.retain(|_, id| id != device_id);
        }
        self.notify_device_removed(device_id)
    }

    /// Deliver a raw `OnDeviceStateChanged` to every endpoint client.
    pub fn notify_device_state_changed(&self, device_id: &str, new_state: u32) -> Vec<Status> {
        self.shared.notify_device_state_changed(device_id, new_state)
    }

    pub fn notify_device_added(&self, device_id: &str) -> Vec<Status> {
        let id = to_wide(device_id);
        self.shared
            .dispatch_endpoint("OnDeviceAdded", |client| unsafe { client.OnDeviceAdded(id.as_ptr()) })
    }

    pub fn notify_device_removed(&self, device_id: &str) -> Vec<Status> {
        let id = to_wide(device_id);
        self.shared
            .dispatch_endpoint("OnDeviceRemoved", |client| unsafe { client.OnDeviceRemoved(id.as_ptr()) })
    }

    /// Deliver a raw `OnDefaultDeviceChanged`. `flow` and `role` are passed
    /// through unchecked; `None` passes a null ID.
    pub fn notify_default_device_changed(&self, flow: i32, role: i32, device_id: Option<&str>) -> Vec<Status> {
        self.shared.notify_default_device_changed(flow, role, device_id)
    }

    pub fn notify_property_value_changed(&self, device_id: &str, key: PropertyKey) -> Vec<Status> {
        let id = to_wide(device_id);
        self.shared.dispatch_endpoint("OnPropertyValueChanged", |client| unsafe {
            client.OnPropertyValueChanged(id.as_ptr(), key)
        })
    }

    /// Deliver a raw `OnPropertyChanged` to every effects client on
    /// `device_id`. `store_type` is passed through unchecked.
    pub fn notify_effects_property_changed(&self, device_id: &str, store_type: i32, key: PropertyKey) -> Vec<Status> {
        self.shared.dispatch_effects(device_id, None, store_type, key)
    }
}

impl std::fmt::Debug for FakeAudioSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeAudioSystem")
            .field("live_objects", &self.live_objects())
            .field("endpoint_clients", &self.endpoint_client_count())
            .finish()
    }
}
