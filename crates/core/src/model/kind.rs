use serde::{Deserialize, Serialize};

/// Flavor of a session. Only comprehensive tests survive an app restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Quiz,
    ComprehensiveTest,
}

impl SessionKind {
    #[must_use]
    pub fn is_persisted(self) -> bool {
        matches!(self, Self::ComprehensiveTest)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quiz => "quiz",
            Self::ComprehensiveTest => "comprehensive_test",
        }
    }
}
