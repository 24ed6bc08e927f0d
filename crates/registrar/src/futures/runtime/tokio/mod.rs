mod sleep;

pub use sleep::*;
