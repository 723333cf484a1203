mod group;
mod product;

pub use group::*;
pub use product::*;
