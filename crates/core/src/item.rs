use std::fmt;

use serde::{Deserialize, Serialize};

use crate::slug::slug;

/// The two board collections exported from the monitoring API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BoardKind {
    Dash,
    Screen,
}

impl BoardKind {
    pub const ALL: [BoardKind; 2] = [BoardKind::Dash, BoardKind::Screen];

    /// Subdirectory of the backup repository, also the API resource path.
    pub fn dir_name(self) -> &'static str {
        match self {
            BoardKind::Dash => "dash",
            BoardKind::Screen => "screen",
        }
    }

    pub fn api_path(self) -> &'static str {
        self.dir_name()
    }

    /// Field of the list response holding the board summaries.
    pub fn list_field(self) -> &'static str {
        match self {
            BoardKind::Dash => "dashes",
            BoardKind::Screen => "screenboards",
        }
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Identifier of a remote object. Dashboards use numbers, newer APIs use strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ItemId {
    Number(i64),
    Text(String),
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Number(n) => write!(f, "{n}"),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

/// Summary entry from a board list response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportItem {
    pub id: ItemId,
    #[serde(default)]
    pub title: Option<String>,
}

impl ExportItem {
    pub fn file_name(&self) -> String {
        let title = self.title.as_deref().unwrap_or("untitled");
        format!("{}-{}.json", self.id, slug(title))
    }
}
