// Domain Layer - Pure business logic and entities

pub mod asset;
pub mod error;
pub mod invite;
pub mod status;
pub mod task;
pub mod transfer;

// Re-exports
pub use asset::{relocate_path, Asset, AssetUid, FileKind, Relocation, StoredFile, Username};
pub use error::DomainError;
pub use invite::{Invite, InviteStatus, InviteUid};
pub use status::{derive_global, StatusType, TransferState, TransferStatus};
pub use task::TaskMessage;
pub use transfer::{NewTransfer, Transfer, TransferId};
