pub mod descriptors;
pub mod loader;
pub mod ordering;

// Re-export commonly used types
pub use descriptors::{ClassDescriptor, ClassKind, PropertyAnnotations, PropertyDescriptor};
pub use loader::MetadataSource;
pub use ordering::order_hierarchically;
