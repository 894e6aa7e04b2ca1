//! User record returned by the downstream directory.

use serde::{Deserialize, Serialize};

/// Canonical user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Login name.
    pub username: String,
    /// Given name.
    #[serde(rename = "firstname")]
    pub first_name: String,
    /// Family name.
    #[serde(rename = "lastname")]
    pub last_name: String,
    /// Role label, passed through verbatim.
    pub role: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_directory_field_names() -> anyhow::Result<()> {
        let user: User = serde_json::from_value(json!({
            "username": "admin",
            "firstname": "Foo",
            "lastname": "Bar",
            "role": "admin",
            "id": 7
        }))?;
        assert_eq!(user.first_name, "Foo");
        assert_eq!(user.last_name, "Bar");
        Ok(())
    }
}
