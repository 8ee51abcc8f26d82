mod group;
mod membership;
mod profile;
mod user;

pub use group::*;
pub use membership::*;
pub use profile::*;
pub use user::*;
