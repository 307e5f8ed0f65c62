//! The fake subsystem's objects, one `#[implement]` type per coclass.

use super::{upsert, Properties, Shared, StoredValue, Tracked, VolumeModel, INCREMENT_DB, MAX_DB, MIN_DB, STEP_COUNT};
use crate::audio::interfaces::{
    AudioVolumeNotificationData, IAudioEndpointVolume, IAudioEndpointVolumeCallback, IAudioEndpointVolumeEx,
    IAudioEndpointVolumeEx_Impl, IAudioEndpointVolumeEx_Vtbl, IAudioEndpointVolume_Impl, IAudioMeterInformation,
    IAudioMeterInformation_Impl, IAudioMeterInformation_Vtbl, IAudioSystemEffectsPropertyChangeNotificationClient,
    IAudioSystemEffectsPropertyStore, IAudioSystemEffectsPropertyStore_Impl, IAudioSystemEffectsPropertyStore_Vtbl,
    IMMDevice, IMMDeviceCollection, IMMDeviceCollection_Impl, IMMDeviceCollection_Vtbl, IMMDeviceEnumerator,
    IMMDeviceEnumerator_Impl, IMMDeviceEnumerator_Vtbl, IMMDevice_Impl, IMMDevice_Vtbl, IMMEndpoint,
    IMMEndpoint_Impl, IMMEndpoint_Vtbl, IMMNotificationClient, IPolicyConfig, IPolicyConfig_Impl, IPolicyConfig_Vtbl,
    IPropertyStore, IPropertyStore_Impl, IPropertyStore_Vtbl,
};
use crate::audio::property_store::{PropertyKey, RawPropVariant};
use crate::audio::{DataFlow, DeviceState, EffectsPropertyStoreType, HardwareSupport, Role};
use crate::interop::memory::{alloc_wide, wide_to_string};
use crate::interop::{Handle, Status};
use std::ffi::c_void;
use std::mem;
use std::ptr;
use std::sync::Arc;
use windows_core::{implement, Interface, GUID, HRESULT};

const HARDWARE_SUPPORT: HardwareSupport = HardwareSupport::all();

unsafe fn hand_out<I: Interface>(object: I, out: *mut *mut c_void) -> HRESULT {
    out.write(object.into_raw());
    Status::S_OK.into()
}

/// STGM access bits to "may write". `None` for anything else.
fn writable(access: u32) -> Option<bool> {
    match access {
        0 => Some(false),
        1 | 2 => Some(true),
        _ => None,
    }
}

// ---- IMMDeviceEnumerator ----

#[implement(IMMDeviceEnumerator)]
struct EnumeratorObject {
    state: Tracked<()>,
}

pub(crate) fn enumerator(shared: &Arc<Shared>) -> Handle<IMMDeviceEnumerator> {
    let object: IMMDeviceEnumerator = EnumeratorObject {
        state: Tracked::new(shared, ()),
    }
    .into();
    Handle::new(object)
}

impl IMMDeviceEnumerator_Impl for EnumeratorObject_Impl {
    unsafe fn EnumAudioEndpoints(&self, flow: i32, state_mask: u32, out: *mut *mut c_void) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        *out = ptr::null_mut();
        let Some(flow) = DataFlow::from_raw(flow) else {
            return Status::E_INVALIDARG.into();
        };
        let Some(mask) = DeviceState::from_bits(state_mask) else {
            return Status::E_INVALIDARG.into();
        };

        let shared = &self.state.shared;
        let ids = shared
            .world()
            .devices
            .iter()
            .filter(|d| (flow == DataFlow::All || d.flow == flow) && d.state.intersects(mask))
            .map(|d| d.id.clone())
            .collect();
        hand_out(collection(shared, ids), out)
    }

    unsafe fn GetDefaultAudioEndpoint(&self, flow: i32, role: i32, out: *mut *mut c_void) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        *out = ptr::null_mut();
        let (Some(flow), Some(role)) = (DataFlow::from_raw(flow), Role::from_raw(role)) else {
            return Status::E_INVALIDARG.into();
        };
        if flow == DataFlow::All {
            return Status::E_INVALIDARG.into();
        }

        let shared = &self.state.shared;
        let id = shared.world().defaults.get(&(flow, role)).cloned();
        match id {
            Some(id) => hand_out(device(shared, id), out),
            None => Status::E_NOTFOUND.into(),
        }
    }

    unsafe fn GetDevice(&self, id: *const u16, out: *mut *mut c_void) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        *out = ptr::null_mut();
        let Some(id) = wide_to_string(id) else {
            return Status::E_POINTER.into();
        };

        let shared = &self.state.shared;
        let exists = shared.world().device(&id).is_some();
        if exists {
            hand_out(device(shared, id), out)
        } else {
            Status::E_NOTFOUND.into()
        }
    }

    unsafe fn RegisterEndpointNotificationCallback(&self, client: *mut c_void) -> HRESULT {
        let Some(client) = Handle::<IMMNotificationClient>::from_raw_borrowed(client) else {
            return Status::E_POINTER.into();
        };
        self.state.shared.world().endpoint_clients.push(client);
        Status::S_OK.into()
    }

    unsafe fn UnregisterEndpointNotificationCallback(&self, client: *mut c_void) -> HRESULT {
        if client.is_null() {
            return Status::E_POINTER.into();
        }
        let removed = {
            let mut world = self.state.shared.world();
            let position = world.endpoint_clients.iter().position(|c| c.as_raw() == client);
            position.map(|i| world.endpoint_clients.remove(i))
        };
        // Released outside the lock; the bridge may run arbitrary drop code.
        match removed {
            Some(_) => Status::S_OK.into(),
            None => Status::E_NOTFOUND.into(),
        }
    }
}

// ---- IMMDeviceCollection ----

#[implement(IMMDeviceCollection)]
struct CollectionObject {
    state: Tracked<Vec<String>>,
}

fn collection(shared: &Arc<Shared>, ids: Vec<String>) -> IMMDeviceCollection {
    CollectionObject {
        state: Tracked::new(shared, ids),
    }
    .into()
}

impl IMMDeviceCollection_Impl for CollectionObject_Impl {
    unsafe fn GetCount(&self, count: *mut u32) -> HRESULT {
        if count.is_null() {
            return Status::E_POINTER.into();
        }
        *count = self.state.inner.len() as u32;
        Status::S_OK.into()
    }

    unsafe fn Item(&self, index: u32, out: *mut *mut c_void) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        *out = ptr::null_mut();
        match self.state.inner.get(index as usize) {
            Some(id) => hand_out(device(&self.state.shared, id.clone()), out),
            None => Status::E_INVALIDARG.into(),
        }
    }
}

// ---- IMMDevice + IMMEndpoint ----

#[implement(IMMDevice, IMMEndpoint)]
struct DeviceObject {
    state: Tracked<String>,
}

fn device(shared: &Arc<Shared>, id: String) -> IMMDevice {
    DeviceObject {
        state: Tracked::new(shared, id),
    }
    .into()
}

impl DeviceObject {
    fn exists(&self) -> bool {
        self.state.shared.world().device(&self.state.inner).is_some()
    }
}

impl IMMDevice_Impl for DeviceObject_Impl {
    /// Volume, meter and effects-store objects are created per call. The
    /// effects store needs a `VT_CLSID` context in `params`.
    unsafe fn Activate(
        &self,
        iid: *const GUID,
        _clsctx: u32,
        params: *const RawPropVariant,
        out: *mut *mut c_void,
    ) -> HRESULT {
        if out.is_null() || iid.is_null() {
            return Status::E_POINTER.into();
        }
        *out = ptr::null_mut();
        if !self.exists() {
            return Status::AUDCLNT_E_DEVICE_INVALIDATED.into();
        }

        let shared = &self.state.shared;
        let id = self.state.inner.clone();
        let requested = *iid;
        if requested == IAudioEndpointVolume::IID || requested == IAudioEndpointVolumeEx::IID {
            let object: IAudioEndpointVolumeEx = VolumeObject {
                state: Tracked::new(shared, id),
            }
            .into();
            object.query(iid, out)
        } else if requested == IAudioMeterInformation::IID {
            let object: IAudioMeterInformation = MeterObject {
                state: Tracked::new(shared, id),
            }
            .into();
            object.query(iid, out)
        } else if requested == IAudioSystemEffectsPropertyStore::IID {
            let Some(context) = params.as_ref().and_then(RawPropVariant::clsid) else {
                return Status::E_INVALIDARG.into();
            };
            let object: IAudioSystemEffectsPropertyStore = EffectsStoreObject {
                state: Tracked::new(shared, id),
                context,
            }
            .into();
            object.query(iid, out)
        } else {
            Status::E_NOINTERFACE.into()
        }
    }

    unsafe fn OpenPropertyStore(&self, access: u32, out: *mut *mut c_void) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        *out = ptr::null_mut();
        if writable(access).is_none() {
            return Status::E_INVALIDARG.into();
        }
        let store: IPropertyStore = PropertyStoreObject {
            state: Tracked::new(&self.state.shared, self.state.inner.clone()),
            source: StoreSource::Device,
            writable: false,
        }
        .into();
        hand_out(store, out)
    }

    unsafe fn GetId(&self, out: *mut *mut u16) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        let id = alloc_wide(&self.state.inner);
        *out = id;
        if id.is_null() {
            Status::E_OUTOFMEMORY.into()
        } else {
            Status::S_OK.into()
        }
    }

    unsafe fn GetState(&self, out: *mut u32) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        *out = self
            .state
            .shared
            .world()
            .device(&self.state.inner)
            .map_or(DeviceState::NOT_PRESENT, |d| d.state)
            .bits();
        Status::S_OK.into()
    }
}

impl IMMEndpoint_Impl for DeviceObject_Impl {
    unsafe fn GetDataFlow(&self, out: *mut i32) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        match self.state.shared.world().device(&self.state.inner) {
            Some(device) => {
                *out = device.flow as i32;
                Status::S_OK.into()
            }
            None => Status::AUDCLNT_E_DEVICE_INVALIDATED.into(),
        }
    }
}

// ---- IPropertyStore ----

#[derive(Debug, Clone, Copy)]
enum StoreSource {
    Device,
    Effects {
        context: GUID,
        store_type: EffectsPropertyStoreType,
    },
}

/// The device store and the three effects stores share one object type;
/// `source` picks which contents it serves.
#[implement(IPropertyStore)]
struct PropertyStoreObject {
    state: Tracked<String>,
    source: StoreSource,
    writable: bool,
}

impl PropertyStoreObject {
    fn entries(&self) -> Result<Properties, Status> {
        let world = self.state.shared.world();
        let device = world
            .device(&self.state.inner)
            .ok_or(Status::AUDCLNT_E_DEVICE_INVALIDATED)?;
        Ok(match self.source {
            StoreSource::Device => device.properties(),
            StoreSource::Effects { context, store_type } => device.effects_store(context, store_type),
        })
    }
}

impl IPropertyStore_Impl for PropertyStoreObject_Impl {
    unsafe fn GetCount(&self, count: *mut u32) -> HRESULT {
        if count.is_null() {
            return Status::E_POINTER.into();
        }
        match self.entries() {
            Ok(entries) => {
                *count = entries.len() as u32;
                Status::S_OK.into()
            }
            Err(status) => status.into(),
        }
    }

    unsafe fn GetAt(&self, index: u32, key: *mut PropertyKey) -> HRESULT {
        if key.is_null() {
            return Status::E_POINTER.into();
        }
        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(status) => return status.into(),
        };
        match entries.get(index as usize) {
            Some((found, _)) => {
                *key = *found;
                Status::S_OK.into()
            }
            None => Status::E_INVALIDARG.into(),
        }
    }

    /// Unknown keys read as `VT_EMPTY`, as the real store does.
    unsafe fn GetValue(&self, key: *const PropertyKey, value: *mut RawPropVariant) -> HRESULT {
        if key.is_null() || value.is_null() {
            return Status::E_POINTER.into();
        }
        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(status) => return status.into(),
        };
        let found = entries
            .iter()
            .find(|(k, _)| *k == *key)
            .map_or_else(RawPropVariant::default, |(_, stored)| stored.to_variant());
        value.write(found);
        Status::S_OK.into()
    }

    /// Stores the value, then tells the effects clients registered for
    /// the same context, outside the lock.
    unsafe fn SetValue(&self, key: *const PropertyKey, value: *const RawPropVariant) -> HRESULT {
        if key.is_null() || value.is_null() {
            return Status::E_POINTER.into();
        }
        let StoreSource::Effects { context, store_type } = self.source else {
            return Status::STG_E_ACCESSDENIED.into();
        };
        if !self.writable {
            return Status::STG_E_ACCESSDENIED.into();
        }
        let Some(stored) = StoredValue::from_variant(&*value) else {
            return Status::E_INVALIDARG.into();
        };

        let key = *key;
        let shared = &self.state.shared;
        {
            let mut world = shared.world();
            let Some(device) = world.device_mut(&self.state.inner) else {
                return Status::AUDCLNT_E_DEVICE_INVALIDATED.into();
            };
            upsert(device.effects.entry((context, store_type)).or_default(), key, stored);
        }
        shared.dispatch_effects(&self.state.inner, Some(context), store_type as i32, key);
        Status::S_OK.into()
    }

    unsafe fn Commit(&self) -> HRESULT {
        if self.writable {
            Status::S_OK.into()
        } else {
            Status::STG_E_ACCESSDENIED.into()
        }
    }
}

// ---- IAudioSystemEffectsPropertyStore ----

#[implement(IAudioSystemEffectsPropertyStore)]
struct EffectsStoreObject {
    state: Tracked<String>,
    context: GUID,
}

impl EffectsStoreObject {
    /// The default store is never writable.
    unsafe fn open(&self, store_type: EffectsPropertyStoreType, access: u32, out: *mut *mut c_void) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        *out = ptr::null_mut();
        let Some(writable) = writable(access) else {
            return Status::E_INVALIDARG.into();
        };
        if self.state.shared.world().device(&self.state.inner).is_none() {
            return Status::AUDCLNT_E_DEVICE_INVALIDATED.into();
        }
        let store: IPropertyStore = PropertyStoreObject {
            state: Tracked::new(&self.state.shared, self.state.inner.clone()),
            source: StoreSource::Effects {
                context: self.context,
                store_type,
            },
            writable: writable && store_type != EffectsPropertyStoreType::Default,
        }
        .into();
        hand_out(store, out)
    }

    fn reset(&self, store_type: EffectsPropertyStoreType) -> HRESULT {
        let mut world = self.state.shared.world();
        match world.device_mut(&self.state.inner) {
            Some(device) => {
                device.effects.remove(&(self.context, store_type));
                Status::S_OK.into()
            }
            None => Status::AUDCLNT_E_DEVICE_INVALIDATED.into(),
        }
    }
}

impl IAudioSystemEffectsPropertyStore_Impl for EffectsStoreObject_Impl {
    unsafe fn OpenDefaultPropertyStore(&self, access: u32, out: *mut *mut c_void) -> HRESULT {
        self.open(EffectsPropertyStoreType::Default, access, out)
    }

    unsafe fn OpenUserPropertyStore(&self, access: u32, out: *mut *mut c_void) -> HRESULT {
        self.open(EffectsPropertyStoreType::User, access, out)
    }

    unsafe fn OpenVolatilePropertyStore(&self, access: u32, out: *mut *mut c_void) -> HRESULT {
        self.open(EffectsPropertyStoreType::Volatile, access, out)
    }

    unsafe fn ResetUserPropertyStore(&self) -> HRESULT {
        self.reset(EffectsPropertyStoreType::User)
    }

    unsafe fn ResetVolatilePropertyStore(&self) -> HRESULT {
        self.reset(EffectsPropertyStoreType::Volatile)
    }

    unsafe fn RegisterPropertyChangeNotification(&self, client: *mut c_void) -> HRESULT {
        let Some(client) = Handle::<IAudioSystemEffectsPropertyChangeNotificationClient>::from_raw_borrowed(client)
        else {
            return Status::E_POINTER.into();
        };
        let mut world = self.state.shared.world();
        match world.device_mut(&self.state.inner) {
            Some(device) => {
                device.effects_clients.push((self.context, client));
                Status::S_OK.into()
            }
            None => Status::AUDCLNT_E_DEVICE_INVALIDATED.into(),
        }
    }

    unsafe fn UnregisterPropertyChangeNotification(&self, client: *mut c_void) -> HRESULT {
        if client.is_null() {
            return Status::E_POINTER.into();
        }
        let removed = {
            let mut world = self.state.shared.world();
            world.device_mut(&self.state.inner).and_then(|device| {
                let position = device.effects_clients.iter().position(|(_, c)| c.as_raw() == client);
                position.map(|i| device.effects_clients.remove(i))
            })
        };
        match removed {
            Some(_) => Status::S_OK.into(),
            None => Status::E_NOTFOUND.into(),
        }
    }
}

// ---- IAudioEndpointVolume(Ex) ----

#[implement(IAudioEndpointVolumeEx)]
struct VolumeObject {
    state: Tracked<String>,
}

fn scalar_to_db(scalar: f32) -> f32 {
    MIN_DB + scalar * (MAX_DB - MIN_DB)
}

fn db_to_scalar(db: f32) -> Option<f32> {
    (MIN_DB..=MAX_DB)
        .contains(&db)
        .then(|| (db - MIN_DB) / (MAX_DB - MIN_DB))
}

fn valid_scalar(level: f32) -> Option<f32> {
    (0.0..=1.0).contains(&level).then_some(level)
}

unsafe fn write_range(min_db: *mut f32, max_db: *mut f32, increment_db: *mut f32) -> HRESULT {
    if min_db.is_null() || max_db.is_null() || increment_db.is_null() {
        return Status::E_POINTER.into();
    }
    *min_db = MIN_DB;
    *max_db = MAX_DB;
    *increment_db = INCREMENT_DB;
    Status::S_OK.into()
}

impl VolumeObject {
    /// Read from the device's volume model into `out`.
    unsafe fn read_volume<T>(&self, out: *mut T, read: impl FnOnce(&VolumeModel) -> Result<T, Status>) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        let world = self.state.shared.world();
        let Some(device) = world.device(&self.state.inner) else {
            return Status::AUDCLNT_E_DEVICE_INVALIDATED.into();
        };
        match read(&device.volume) {
            Ok(value) => {
                out.write(value);
                Status::S_OK.into()
            }
            Err(status) => status.into(),
        }
    }

    /// Apply a change to the device's volume model, then notify its volume
    /// callbacks with `context` outside the lock.
    unsafe fn change_volume(&self, context: *const GUID, change: impl FnOnce(&mut VolumeModel) -> Status) -> HRESULT {
        let (status, snapshot, clients) = {
            let mut world = self.state.shared.world();
            let Some(device) = world.device_mut(&self.state.inner) else {
                return Status::AUDCLNT_E_DEVICE_INVALIDATED.into();
            };
            let status = change(&mut device.volume);
            (status, device.volume.clone(), device.volume_clients.clone())
        };
        if status.is_success() {
            let context = context.as_ref().copied().unwrap_or_else(GUID::zeroed);
            notify_volume(&clients, context, &snapshot);
        }
        status.into()
    }
}

/// Build an `AUDIO_VOLUME_NOTIFICATION_DATA` block with its trailing
/// channel array and deliver it to every client.
fn notify_volume(clients: &[Handle<IAudioEndpointVolumeCallback>], context: GUID, volume: &VolumeModel) {
    if clients.is_empty() {
        return;
    }
    let offset = mem::offset_of!(AudioVolumeNotificationData, channel_volumes);
    let bytes = offset + mem::size_of::<f32>() * volume.channels.len().max(1);
    let mut block = vec![0u64; bytes.div_ceil(mem::size_of::<u64>())];
    let base = block.as_mut_ptr() as *mut u8;
    unsafe {
        (base as *mut AudioVolumeNotificationData).write(AudioVolumeNotificationData {
            event_context: context,
            muted: i32::from(volume.muted),
            master_volume: volume.master,
            channels: volume.channels.len() as u32,
            channel_volumes: [0.0],
        });
        let channels = base.add(offset) as *mut f32;
        ptr::copy_nonoverlapping(volume.channels.as_ptr(), channels, volume.channels.len());
    }

    let data = base as *const AudioVolumeNotificationData;
    for client in clients {
        let _ = unsafe { client.OnNotify(data) };
    }
}

impl IAudioEndpointVolume_Impl for VolumeObject_Impl {
    unsafe fn RegisterControlChangeNotify(&self, client: *mut c_void) -> HRESULT {
        let Some(client) = Handle::<IAudioEndpointVolumeCallback>::from_raw_borrowed(client) else {
            return Status::E_POINTER.into();
        };
        let mut world = self.state.shared.world();
        match world.device_mut(&self.state.inner) {
            Some(device) => {
                device.volume_clients.push(client);
                Status::S_OK.into()
            }
            None => Status::AUDCLNT_E_DEVICE_INVALIDATED.into(),
        }
    }

    unsafe fn UnregisterControlChangeNotify(&self, client: *mut c_void) -> HRESULT {
        if client.is_null() {
            return Status::E_POINTER.into();
        }
        let removed = {
            let mut world = self.state.shared.world();
            world.device_mut(&self.state.inner).and_then(|device| {
                let position = device.volume_clients.iter().position(|c| c.as_raw() == client);
                position.map(|i| device.volume_clients.remove(i))
            })
        };
        match removed {
            Some(_) => Status::S_OK.into(),
            None => Status::E_NOTFOUND.into(),
        }
    }

    unsafe fn GetChannelCount(&self, count: *mut u32) -> HRESULT {
        self.read_volume(count, |v| Ok(v.channels.len() as u32))
    }

    unsafe fn SetMasterVolumeLevel(&self, level_db: f32, context: *const GUID) -> HRESULT {
        self.change_volume(context, |v| match db_to_scalar(level_db) {
            Some(scalar) => {
                v.master = scalar;
                Status::S_OK
            }
            None => Status::E_INVALIDARG,
        })
    }

    unsafe fn SetMasterVolumeLevelScalar(&self, level: f32, context: *const GUID) -> HRESULT {
        self.change_volume(context, |v| match valid_scalar(level) {
            Some(level) => {
                v.master = level;
                Status::S_OK
            }
            None => Status::E_INVALIDARG,
        })
    }

    unsafe fn GetMasterVolumeLevel(&self, level_db: *mut f32) -> HRESULT {
        self.read_volume(level_db, |v| Ok(scalar_to_db(v.master)))
    }

    unsafe fn GetMasterVolumeLevelScalar(&self, level: *mut f32) -> HRESULT {
        self.read_volume(level, |v| Ok(v.master))
    }

    unsafe fn SetChannelVolumeLevel(&self, channel: u32, level_db: f32, context: *const GUID) -> HRESULT {
        self.change_volume(context, |v| {
            match (v.channels.get_mut(channel as usize), db_to_scalar(level_db)) {
                (Some(slot), Some(scalar)) => {
                    *slot = scalar;
                    Status::S_OK
                }
                _ => Status::E_INVALIDARG,
            }
        })
    }

    unsafe fn SetChannelVolumeLevelScalar(&self, channel: u32, level: f32, context: *const GUID) -> HRESULT {
        self.change_volume(context, |v| {
            match (v.channels.get_mut(channel as usize), valid_scalar(level)) {
                (Some(slot), Some(level)) => {
                    *slot = level;
                    Status::S_OK
                }
                _ => Status::E_INVALIDARG,
            }
        })
    }

    unsafe fn GetChannelVolumeLevel(&self, channel: u32, level_db: *mut f32) -> HRESULT {
        self.read_volume(level_db, |v| {
            v.channels
                .get(channel as usize)
                .map(|&scalar| scalar_to_db(scalar))
                .ok_or(Status::E_INVALIDARG)
        })
    }

    unsafe fn GetChannelVolumeLevelScalar(&self, channel: u32, level: *mut f32) -> HRESULT {
        self.read_volume(level, |v| {
            v.channels.get(channel as usize).copied().ok_or(Status::E_INVALIDARG)
        })
    }

    unsafe fn SetMute(&self, mute: i32, context: *const GUID) -> HRESULT {
        self.change_volume(context, |v| {
            v.muted = mute != 0;
            Status::S_OK
        })
    }

    unsafe fn GetMute(&self, mute: *mut i32) -> HRESULT {
        self.read_volume(mute, |v| Ok(i32::from(v.muted)))
    }

    unsafe fn GetVolumeStepInfo(&self, step: *mut u32, step_count: *mut u32) -> HRESULT {
        if step_count.is_null() {
            return Status::E_POINTER.into();
        }
        let status = self.read_volume(step, |v| Ok(v.step()));
        if status.is_ok() {
            *step_count = STEP_COUNT;
        }
        status
    }

    unsafe fn VolumeStepUp(&self, context: *const GUID) -> HRESULT {
        self.change_volume(context, |v| {
            v.set_step(v.step() + 1);
            Status::S_OK
        })
    }

    unsafe fn VolumeStepDown(&self, context: *const GUID) -> HRESULT {
        self.change_volume(context, |v| {
            v.set_step(v.step().saturating_sub(1));
            Status::S_OK
        })
    }

    unsafe fn QueryHardwareSupport(&self, mask: *mut u32) -> HRESULT {
        if mask.is_null() {
            return Status::E_POINTER.into();
        }
        *mask = HARDWARE_SUPPORT.bits();
        Status::S_OK.into()
    }

    unsafe fn GetVolumeRange(&self, min_db: *mut f32, max_db: *mut f32, increment_db: *mut f32) -> HRESULT {
        write_range(min_db, max_db, increment_db)
    }
}

impl IAudioEndpointVolumeEx_Impl for VolumeObject_Impl {
    unsafe fn GetVolumeRangeChannel(
        &self,
        channel: u32,
        min_db: *mut f32,
        max_db: *mut f32,
        increment_db: *mut f32,
    ) -> HRESULT {
        let mut channels = 0u32;
        let status = self.read_volume(&mut channels, |v| Ok(v.channels.len() as u32));
        if status.is_err() {
            return status;
        }
        if channel >= channels {
            return Status::E_INVALIDARG.into();
        }
        write_range(min_db, max_db, increment_db)
    }
}

// ---- IAudioMeterInformation ----

#[implement(IAudioMeterInformation)]
struct MeterObject {
    state: Tracked<String>,
}

impl MeterObject {
    unsafe fn read_peaks<T>(&self, out: *mut T, read: impl FnOnce(&[f32]) -> Result<T, Status>) -> HRESULT {
        if out.is_null() {
            return Status::E_POINTER.into();
        }
        let world = self.state.shared.world();
        let Some(device) = world.device(&self.state.inner) else {
            return Status::AUDCLNT_E_DEVICE_INVALIDATED.into();
        };
        match read(&device.peaks) {
            Ok(value) => {
                out.write(value);
                Status::S_OK.into()
            }
            Err(status) => status.into(),
        }
    }
}

impl IAudioMeterInformation_Impl for MeterObject_Impl {
    unsafe fn GetPeakValue(&self, peak: *mut f32) -> HRESULT {
        self.read_peaks(peak, |peaks| Ok(peaks.iter().copied().fold(0.0, f32::max)))
    }

    unsafe fn GetMeteringChannelCount(&self, count: *mut u32) -> HRESULT {
        self.read_peaks(count, |peaks| Ok(peaks.len() as u32))
    }

    unsafe fn GetChannelsPeakValues(&self, count: u32, peaks: *mut f32) -> HRESULT {
        if count == 0 {
            return Status::S_OK.into();
        }
        if peaks.is_null() {
            return Status::E_POINTER.into();
        }
        let world = self.state.shared.world();
        let Some(device) = world.device(&self.state.inner) else {
            return Status::AUDCLNT_E_DEVICE_INVALIDATED.into();
        };
        if count as usize != device.peaks.len() {
            return Status::E_INVALIDARG.into();
        }
        ptr::copy_nonoverlapping(device.peaks.as_ptr(), peaks, device.peaks.len());
        Status::S_OK.into()
    }

    unsafe fn QueryHardwareSupport(&self, mask: *mut u32) -> HRESULT {
        if mask.is_null() {
            return Status::E_POINTER.into();
        }
        *mask = HARDWARE_SUPPORT.bits();
        Status::S_OK.into()
    }
}

// ---- IPolicyConfig ----

#[implement(IPolicyConfig)]
struct PolicyConfigObject {
    state: Tracked<()>,
}

pub(crate) fn policy_config(shared: &Arc<Shared>) -> Handle<IPolicyConfig> {
    let object: IPolicyConfig = PolicyConfigObject {
        state: Tracked::new(shared, ()),
    }
    .into();
    Handle::new(object)
}

impl IPolicyConfig_Impl for PolicyConfigObject_Impl {
    unsafe fn GetMixFormat(&self) -> HRESULT {
        Status::E_NOTIMPL.into()
    }

    unsafe fn GetDeviceFormat(&self) -> HRESULT {
        Status::E_NOTIMPL.into()
    }

    unsafe fn ResetDeviceFormat(&self) -> HRESULT {
        Status::E_NOTIMPL.into()
    }

    unsafe fn SetDeviceFormat(&self) -> HRESULT {
        Status::E_NOTIMPL.into()
    }

    unsafe fn GetProcessingPeriod(&self) -> HRESULT {
        Status::E_NOTIMPL.into()
    }

    unsafe fn SetProcessingPeriod(&self) -> HRESULT {
        Status::E_NOTIMPL.into()
    }

    unsafe fn GetShareMode(&self) -> HRESULT {
        Status::E_NOTIMPL.into()
    }

    unsafe fn SetShareMode(&self) -> HRESULT {
        Status::E_NOTIMPL.into()
    }

    unsafe fn GetPropertyValue(&self) -> HRESULT {
        Status::E_NOTIMPL.into()
    }

    unsafe fn SetPropertyValue(&self) -> HRESULT {
        Status::E_NOTIMPL.into()
    }

    /// Records the new default, then reports it to endpoint clients.
    unsafe fn SetDefaultEndpoint(&self, id: *const u16, role: i32) -> HRESULT {
        let Some(id) = wide_to_string(id) else {
            return Status::E_POINTER.into();
        };
        let Some(role) = Role::from_raw(role) else {
            return Status::E_INVALIDARG.into();
        };

        let shared = &self.state.shared;
        let flow = {
            let mut world = shared.world();
            let Some(flow) = world.device(&id).map(|d| d.flow) else {
                return Status::E_NOTFOUND.into();
            };
            world.defaults.insert((flow, role), id.clone());
            flow
        };
        shared.notify_default_device_changed(flow as i32, role as i32, Some(&id));
        Status::S_OK.into()
    }

    /// Hidden endpoints read as disabled; showing one makes it active.
    unsafe fn SetEndpointVisibility(&self, id: *const u16, visible: i32) -> HRESULT {
        let Some(id) = wide_to_string(id) else {
            return Status::E_POINTER.into();
        };
        let state = if visible != 0 {
            DeviceState::ACTIVE
        } else {
            DeviceState::DISABLED
        };

        let shared = &self.state.shared;
        {
            let mut world = shared.world();
            let Some(device) = world.device_mut(&id) else {
                return Status::E_NOTFOUND.into();
            };
            device.state = state;
        }
        shared.notify_device_state_changed(&id, state.bits());
        Status::S_OK.into()
    }
}
