//! Debug tools for voxgi - TCP debug server for remote inspection of a
//! running voxelizer
//!
//! Start the debug server in your app:
//! ```ignore
//! let handler = Arc::new(Mutex::new(MyHandler::new()));
//! let _server = DebugServer::start(handler, DEFAULT_PORT);
//! ```
//!
//! Clients send one JSON command per line and get one JSON response per
//! line, e.g. `{"cmd":"GetVoxel","params":{"x":1,"y":2,"z":3,"level":0}}`.

pub mod png;
pub mod protocol;
pub mod server;

pub use png::{encode_png, encode_png_base64, EncodeError};
pub use protocol::*;
pub use server::{DebugHandler, DebugServer};

/// Default debug server port
pub const DEFAULT_PORT: u16 = 9743;
