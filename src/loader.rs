//! Template loading and parsing, the analyzer's front end.
//!
//! The analyzer only needs something implementing [`TemplateParser`]: a way
//! to turn a logical template name into a tree of [`SyntaxNode`]s.
//! [`Environment`] is the bundled implementation, pairing a [`Loader`] with
//! [`crate::parser::Parser`].

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::ast::Template;
use crate::error::{Error, LoadError};
use crate::parser::Parser;
use crate::syntax::SyntaxNode;

/// Resolves a logical template name to its source text.
pub trait Loader {
    fn source(&self, name: &str) -> Result<String, LoadError>;
}

/// Produces the syntax tree of a named template.
pub trait TemplateParser {
    type Node: SyntaxNode;
    type Error: std::error::Error;

    fn parse(&self, name: &str) -> Result<Self::Node, Self::Error>;
}

/// Templates held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.add(name, source);
        self
    }
}

impl Loader for MemoryLoader {
    fn source(&self, name: &str) -> Result<String, LoadError> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Loads templates from files below a root directory. Names are relative
/// paths such as `emails/welcome.html.twig`.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    root: PathBuf,
}

impl FileSystemLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        // Names may not escape the root.
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        contained.then(|| self.root.join(relative))
    }
}

impl Loader for FileSystemLoader {
    fn source(&self, name: &str) -> Result<String, LoadError> {
        let not_found = || LoadError::NotFound {
            name: name.to_string(),
        };
        let path = self.resolve(name).ok_or_else(not_found)?;
        if !path.is_file() {
            return Err(not_found());
        }
        debug!("Loading template '{}' from {}", name, path.display());
        std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
            name: name.to_string(),
            path,
            source,
        })
    }
}

/// A [`Loader`] plus the bundled parser.
#[derive(Debug, Clone)]
pub struct Environment<L> {
    loader: L,
}

impl<L: Loader> Environment<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }
}

impl<L: Loader> TemplateParser for Environment<L> {
    type Node = Template;
    type Error = Error;

    fn parse(&self, name: &str) -> Result<Template, Error> {
        let source = self.loader.source(name)?;
        Parser::new(&source).parse().map_err(|source| Error::Parse {
            name: name.to_string(),
            source,
        })
    }
}
