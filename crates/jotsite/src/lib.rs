pub mod ast;
pub mod blogroll;
pub mod build;
pub mod error;
pub mod feeds;
pub mod highlight;
pub mod html;
pub mod parsing;
pub mod publish;
pub mod render;
pub mod site;
pub mod theme;
pub mod types;
pub mod watch;
pub mod xml;

pub use ast::*;
pub use build::*;
pub use error::*;
pub use highlight::Highlighter;
pub use parsing::*;
pub use publish::*;
pub use render::*;
pub use site::*;
pub use theme::ThemeEngine;
pub use types::*;
pub use watch::*;
