//! Entity states, type descriptors and identities.

mod descriptor;
mod identity;
mod state;

pub use descriptor::{EntityDescriptor, EntityModel, PropertyDescriptor};
pub use identity::{IdentityGenerator, SequentialIdentityGenerator, UuidIdentityGenerator};
pub use state::{EntityState, EntityStatus, NamedReferences};
