use serde::{Deserialize, Deserializer, Serialize};

/// Platform role of a user.
///
/// The profile endpoint may omit the role or send one this client does not
/// know about; both cases fall back to `Student`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Instructor,
    Admin,
    #[default]
    #[serde(other)]
    Student,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Instructor => "Instructor",
            Role::Admin => "Administrator",
        }
    }

    /// Whether this role may see the statistics pages.
    pub fn can_view_statistics(&self) -> bool {
        matches!(self, Role::Instructor | Role::Admin)
    }
}

/// Snapshot of the signed-in user, fetched once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "role_or_default")]
    pub role: Role,
}

impl UserProfile {
    /// First word of the display name, used for greetings.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

fn role_or_default<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Role>::deserialize(deserializer)?.unwrap_or_default())
}
