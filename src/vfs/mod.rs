pub mod node;
pub mod path;
pub mod resolver;

pub use node::{Resource, ResourceKind};
pub use path::VirtualPath;
pub use resolver::{ObjectKey, PathResolver, UserId, user_root};
