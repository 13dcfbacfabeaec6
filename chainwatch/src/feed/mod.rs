pub mod conn;
pub mod proto;
pub mod ws;

pub use conn::{Conn, FeedEvent, Status};
pub use proto::Frame;
