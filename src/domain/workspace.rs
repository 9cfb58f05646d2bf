//! Workspace and run source types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: i64,
    pub name: String,
}

impl Workspace {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Where a run was triggered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSources {
    Playground,
    Api,
    Evaluation,
    User,
}

impl LogSources {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playground => "playground",
            Self::Api => "api",
            Self::Evaluation => "evaluation",
            Self::User => "user",
        }
    }
}
