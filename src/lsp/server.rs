use tokio::io::BufReader;
use tracing::info;

use crate::compiler::engine::CompilerEngine;
use crate::log::init;
use crate::lsp::backend::Backend;
use crate::lsp::session::Session;
use crate::lsp::transport::StdioTransport;

/// Serves `engine` over stdin/stdout until the client exits.
///
/// Returns whether the client shut the server down before exiting.
pub async fn run_server<E: CompilerEngine>(engine: E) -> anyhow::Result<bool> {
    let _guard = init()?;

    info!(
        "Starting compiler-lsp {} with {} {}",
        env!("CARGO_PKG_VERSION"),
        engine.name(),
        engine.version()
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();

    let mut session = Session::new(Backend::new(engine), StdioTransport::new(stdin, stdout));
    let orderly = session.run().await;

    info!("compiler-lsp server stopped (orderly: {})", orderly);
    Ok(orderly)
}
