use serde::{Deserialize, Serialize};

use crate::model::ids::LearnerId;

/// The authenticated principal as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub learner_id: LearnerId,
    pub display_name: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn new(learner_id: LearnerId) -> Self {
        Self {
            learner_id,
            display_name: None,
        }
    }

    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.display_name = (!name.trim().is_empty()).then(|| name.trim().to_owned());
        self
    }
}
