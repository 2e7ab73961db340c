//! YAML front matter handling for item documents

pub mod diagnostics;
pub mod frontmatter;

pub use diagnostics::YamlSyntaxError;
pub use frontmatter::{FrontMatter, FrontMatterError};
