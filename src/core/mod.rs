pub mod annotate;
pub mod backend;
pub mod config;
pub mod session;
pub mod storage;
pub mod timestamp;
pub mod video;

pub use backend::*;
pub use config::*;
pub use session::*;
pub use storage::*;
pub use video::*;
