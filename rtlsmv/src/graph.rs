mod cell;
mod constant;
mod context;
mod memory;
mod module;
mod sig;
mod sigmap;
mod wire;

pub use cell::*;
pub use constant::*;
pub use context::*;
pub use memory::*;
pub use module::*;
pub use sig::*;
pub use sigmap::*;
pub use wire::*;
