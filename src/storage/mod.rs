mod file_identifier;
mod identifier_index;
mod identifier_registry;
mod metadata_store;

pub use self::file_identifier::read_file_identifier;
pub use self::identifier_index::IdentifierIndex;
pub use self::identifier_registry::{IdentifierRegistry, ParentIdentifier, RegistryError};
pub use self::metadata_store::MetadataStore;
