//! Pure order-lifecycle core: status enumerations, transition tables,
//! settlement decisions and the read-side timeline. No I/O lives here.

pub mod order;
pub mod settlement;
pub mod status;
pub mod timeline;
pub mod transitions;
