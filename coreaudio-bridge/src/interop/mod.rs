//! The interop bridging layer.
//!
//! Everything that crosses the interface boundary goes through these
//! pieces: [`StatusOutcome`] for results, [`Handle`] for object lifetimes
//! and capability upgrades, [`CollectionAdapter`] for indexed collections,
//! and the [`bridge`] helpers for inbound callbacks. The interface and
//! object machinery underneath is `windows-core`'s `#[interface]` and
//! `#[implement]`.

pub mod bridge;
pub mod collection;
pub mod error;
pub mod guid;
pub mod handle;
pub mod memory;
pub mod status;

pub use bridge::{guard, NotificationSource, Registration};
pub use collection::{CollectionAdapter, CollectionIter, IndexedCollection};
pub use error::{BridgeError, ForeignCallFailed};
pub use guid::{parse_guid, Braced, GuidParseError, GUID};
pub use handle::{interface_name, Handle};
pub use memory::TaskString;
pub use status::{Status, StatusOutcome};
pub use windows_core::{IUnknown, Interface, HRESULT};
