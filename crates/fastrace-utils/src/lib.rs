pub mod future;

pub use future::FutureExt;
