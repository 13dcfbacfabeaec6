pub mod alert;
pub mod engine;
pub mod feed;
pub mod state;
pub mod util;

pub use engine::{Dashboard, Snapshot};
pub use feed::Conn;
