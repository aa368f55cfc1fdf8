mod registry;

pub use registry::{TypeRegistry, DEFAULT_MUTATION_TYPE_NAME, DEFAULT_QUERY_TYPE_NAME};
