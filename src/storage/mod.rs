pub mod local_store;
pub mod session;

pub use local_store::LocalStore;
pub use session::SessionCache;
