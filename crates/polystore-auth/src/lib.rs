//! # Polystore Auth - Role-Based Access Control
//!
//! Permission catalog, role registry and the access resolver. Token
//! verification and password handling happen outside this workspace; this
//! crate answers one question: may this principal perform this operation?

pub mod permissions;
pub mod resolver;
pub mod roles;

pub use permissions::PermissionRegistry;
pub use resolver::AccessResolver;
pub use roles::RoleManager;
