mod interface;
#[cfg(feature = "memory")]
mod memory;
mod record;

pub use interface::*;
#[cfg_attr(docsrs, doc(cfg(feature = "memory")))]
#[cfg(feature = "memory")]
pub use memory::*;
pub use record::*;
