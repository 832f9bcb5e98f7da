use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Ordered list of transport file references, stored as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct FileIds(pub Vec<String>);

impl FileIds {
    pub fn with(mut self, file_id: impl Into<String>) -> Self {
        self.0.push(file_id.into());
        self
    }
}

impl Deref for FileIds {
    type Target = Vec<String>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
