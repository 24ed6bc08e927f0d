mod daily;
mod interface;
mod invoice;
mod roll;

pub use daily::*;
pub use interface::*;
pub use invoice::*;
pub use roll::*;
