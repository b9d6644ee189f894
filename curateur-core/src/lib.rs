pub mod error;
pub mod hasher;
pub mod name_parser;
pub mod platform;
pub mod region;
pub mod rom;
pub mod systems;

pub use error::CoreError;
pub use hasher::{HashAlgorithm, RomIdentity};
pub use name_parser::ParsedName;
pub use platform::{Platform, PlatformIndex};
pub use region::{Language, Region};
pub use rom::{RomEntity, RomKind};
pub use systems::provider_system_id;
