pub mod collect;
mod dispatch;

pub use dispatch::dispatch;
