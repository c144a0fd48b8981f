pub mod compiler;
pub mod config;
pub mod log;
pub mod lsp;
pub mod resolver;
pub mod vfs;
