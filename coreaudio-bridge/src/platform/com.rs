//! COM initialization and object creation.

use crate::audio::ClsCtx;
use crate::interop::{Braced, BridgeError, ForeignCallFailed, Handle, IUnknown, Interface, Status, GUID};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX, COINIT, COINIT_APARTMENTTHREADED,
    COINIT_MULTITHREADED,
};

/// MMDeviceEnumerator coclass.
pub const CLSID_MM_DEVICE_ENUMERATOR: GUID = GUID::from_u128(0xBCDE0395_E52F_467C_8E3D_C4579291692E);

/// PolicyConfigClient coclass.
pub const CLSID_POLICY_CONFIG_CLIENT: GUID = GUID::from_u128(0x870af99c_171d_4f9e_af0d_e63df40c2bc9);

/// COM initialization guard that uninitializes COM on drop.
///
/// Not `Send`: COM must be uninitialized on the thread that initialized it.
pub struct ComGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ComGuard {
    /// Initialize COM for the current thread (apartment-threaded).
    pub fn new() -> Result<Self, BridgeError> {
        Self::init(COINIT_APARTMENTTHREADED)
    }

    /// Initialize COM for the current thread in the multithreaded apartment.
    pub fn multithreaded() -> Result<Self, BridgeError> {
        Self::init(COINIT_MULTITHREADED)
    }

    fn init(model: COINIT) -> Result<Self, BridgeError> {
        let hr = unsafe { CoInitializeEx(None, model) };
        let status = Status::from(hr);
        if status.is_failure() {
            tracing::error!(%status, "COM initialization failed");
            return Err(BridgeError::ComInitFailed(status));
        }
        tracing::debug!(model = model.0, "COM initialized");
        Ok(Self {
            _not_send: std::marker::PhantomData,
        })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}

/// Create an instance of `clsid` and return it viewed as `I`.
///
/// The object is created as `IUnknown` and then upgraded, so a class that
/// lacks `I` fails with [`BridgeError::NotSupported`].
pub fn create_instance<I: Interface>(clsid: &GUID, clsctx: ClsCtx) -> Result<Handle<I>, BridgeError> {
    let unknown: IUnknown = unsafe { CoCreateInstance(clsid, None, CLSCTX(clsctx.bits())) }.map_err(|e| {
        let status = Status::from(e);
        tracing::warn!(clsid = %Braced(clsid), %status, "CoCreateInstance failed");
        BridgeError::CallFailed(ForeignCallFailed::new(status))
    })?;
    Handle::new(unknown).upgrade::<I>()
}
