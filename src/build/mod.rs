mod clean;
mod compile;
mod core;
mod link;
mod patch;
mod sources;
mod staging;

pub use clean::clean;
pub use compile::{CompileStage, CompiledObject};
pub use self::core::{BuildDriver, BuildReport, write_compile_commands};
pub use link::{LinkStage, link_invocation};
pub use patch::{SymbolRename, TestPatchStage, rename_invocation};
pub use sources::{Role, SourceFile, SourceSet, base_name, discover};
pub use staging::StagingArea;
