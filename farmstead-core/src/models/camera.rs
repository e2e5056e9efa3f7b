use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    pub id: Uuid,
    pub name: String,
    pub stream_url: String,
    pub farm_id: Uuid,
    pub owner_id: Uuid,
}

impl Camera {
    pub fn new(
        name: impl Into<String>,
        stream_url: impl Into<String>,
        farm_id: Uuid,
        owner_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            stream_url: stream_url.into(),
            farm_id,
            owner_id,
        }
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}  [{}]", self.name, self.stream_url, self.id)
    }
}
