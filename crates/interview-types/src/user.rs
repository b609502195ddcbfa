use serde::{Deserialize, Serialize};

/// Opaque identity of an authenticated caller, as issued by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub String);

impl Identity {
    pub fn new(subject: impl Into<String>) -> Self {
        Identity(subject.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A user record in the directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub identity: Identity,
    pub name: String,
    #[serde(default)]
    pub skills: Vec<String>,
    pub industry: Option<String>,
}

impl User {
    pub fn new(identity: Identity, name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            identity,
            name: name.into(),
            skills: Vec::new(),
            industry: None,
        }
    }
}
