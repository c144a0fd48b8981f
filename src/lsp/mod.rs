// LSP protocol layer
// - transport.rs: message framing behind the Transport trait
// - method.rs: method table and lifecycle rules
// - session.rs: run loop and dispatch
// - client.rs: queued outbound notifications
// - language_server.rs: capability interface
// - backend.rs: compiler-backed implementation
// - server.rs: stdio entry point
pub mod backend;
pub mod client;
pub mod error;
pub mod language_server;
pub mod method;
pub mod server;
pub mod session;
pub mod transport;
