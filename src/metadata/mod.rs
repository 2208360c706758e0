mod resolver;
mod template;

pub use self::resolver::{FieldResolver, ResolvedFields};
pub use self::template::{DocumentKind, FieldMap, Placeholder, Template, TemplateError};
