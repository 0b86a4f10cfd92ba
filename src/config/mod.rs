pub mod loader;
pub mod schema;

pub use loader::{discover_configs, load_from_path, load_from_str, ConfigError, THREADS_DIR};
pub use schema::{
    Callee, ChainSpec, ConstructorSpec, EntrySpec, FileSet, LinkSpec, Metadata, Param, RepairFix,
    ThreaderConfig, ValidationError, ValidationIssue,
};
