//! Default endpoint selection and endpoint visibility through the
//! undocumented `IPolicyConfig`.

use super::device::Role;
use super::interfaces::IPolicyConfig;
use crate::interop::memory::to_wide;
use crate::interop::{Handle, StatusOutcome};

/// Wrapper around `IPolicyConfig`.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    handle: Handle<IPolicyConfig>,
}

impl PolicyConfig {
    /// Create the system policy config client. COM must be initialized.
    #[cfg(windows)]
    pub fn create() -> Result<Self, crate::interop::BridgeError> {
        use super::device::ClsCtx;
        use crate::platform::{create_instance, CLSID_POLICY_CONFIG_CLIENT};

        let handle = create_instance::<IPolicyConfig>(&CLSID_POLICY_CONFIG_CLIENT, ClsCtx::ALL)?;
        Ok(Self::from_handle(handle))
    }

    pub fn from_handle(handle: Handle<IPolicyConfig>) -> Self {
        Self { handle }
    }

    /// Make `device_id` the default endpoint for `role`.
    pub fn set_default_endpoint(&self, device_id: &str, role: Role) -> StatusOutcome<()> {
        let wide = to_wide(device_id);
        self.handle
            .call_status(|policy| unsafe { policy.SetDefaultEndpoint(wide.as_ptr(), role as i32) })
    }

    /// Show or hide an endpoint. A hidden endpoint reads as disabled and
    /// drops out of active-only enumerations.
    pub fn set_endpoint_visibility(&self, device_id: &str, visible: bool) -> StatusOutcome<()> {
        let wide = to_wide(device_id);
        self.handle
            .call_status(|policy| unsafe { policy.SetEndpointVisibility(wide.as_ptr(), i32::from(visible)) })
    }

    /// Sets the device as the default for every role. Stops at the first
    /// failing role.
    pub fn set_default_endpoint_for_all_roles(&self, device_id: &str) -> StatusOutcome<()> {
        for role in Role::ALL {
            let outcome = self.set_default_endpoint(device_id, role);
            if outcome.is_failure() {
                tracing::warn!(device_id, %role, status = %outcome.status(), "Failed to set default endpoint");
                return outcome;
            }
        }
        StatusOutcome::success(())
    }
}
