use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown team {0:?}")]
pub struct UnknownTeam(pub String);

/// Maps team names to dense ids. Classes are kept sorted so the id of a team
/// depends only on the set of names seen at fit time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamEncoder {
    classes: Vec<String>,
}

impl TeamEncoder {
    pub fn fit<'a>(teams: impl IntoIterator<Item = &'a str>) -> Self {
        let mut classes: Vec<String> = teams
            .into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
            .collect();
        classes.sort_unstable();
        classes.dedup();
        Self { classes }
    }

    pub fn encode(&self, team: &str) -> Result<u32, UnknownTeam> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(team.trim()))
            .map(|idx| idx as u32)
            .map_err(|_| UnknownTeam(team.to_string()))
    }

    pub fn contains(&self, team: &str) -> bool {
        self.encode(team).is_ok()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
