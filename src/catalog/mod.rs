mod entity;
mod loader;
mod registry;

pub use entity::{is_identifier, EntitySchema, FieldDef, FieldType};
pub use loader::CatalogLoader;
pub use registry::{Catalog, RawCatalog};
