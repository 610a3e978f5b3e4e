//! Single-owner GPU object handles.

mod handle;

pub use handle::ResourceHandle;
