pub mod format;
pub mod hash;
pub mod keyed_mutex;
pub mod naming;
