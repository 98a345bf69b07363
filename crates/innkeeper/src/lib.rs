#![doc = include_str!("../README.md")]

pub mod batch;
pub mod cache;
pub mod config;
pub mod enums;
pub mod error;
pub mod model;
pub mod port;
pub mod resolve;
pub mod users;

pub use batch::{CommandSeq, LookupPlan, MAX_BATCH_COMMANDS, UserPlan};
pub use cache::TtlCache;
pub use config::ResolverConfig;
pub use enums::{EnumOutcome, EnumResolver};
pub use error::{Error, Result};
pub use model::{
    ColorEnumEntry, CompanyMatch, DebugEcho, Resolution, ResolutionItem, ResolutionRequest,
    ResolutionWarning, UserDisplayName, WarningCode,
};
pub use port::{BatchCommands, BatchPort, BatchResults, TransportError};
pub use resolve::OwnershipResolver;
pub use users::UserNameResolver;
