pub mod error;
pub mod market_phase;
pub mod noise;
pub mod pool;
pub mod scoring;
pub mod taxonomy;
pub mod traits;
pub mod types;

pub use error::*;
pub use market_phase::*;
pub use noise::*;
pub use pool::*;
pub use scoring::*;
pub use taxonomy::*;
pub use traits::*;
pub use types::*;
