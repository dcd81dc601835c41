use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of capability a handler exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Tool,
    Retriever,
    Plugin,
}

impl HandlerKind {
    /// Search order for multi-action decisions: retrievers shadow tools,
    /// tools shadow plugins.
    pub const SEARCH_ORDER: [HandlerKind; 3] =
        [HandlerKind::Retriever, HandlerKind::Tool, HandlerKind::Plugin];
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Tool => write!(f, "tool"),
            HandlerKind::Retriever => write!(f, "retriever"),
            HandlerKind::Plugin => write!(f, "plugin"),
        }
    }
}
