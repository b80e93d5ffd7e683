use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static USER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\-]+$").expect("user id pattern compiles"));

// The WHATWG "valid email address" production.
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern compiles")
});

/// Whether `id` is a valid path segment for `GET /api/v1/user/{id}`.
pub fn is_valid_user_id(id: &str) -> bool {
    USER_ID.is_match(id)
}

/// Payload of `POST /api/v1/user/`. Missing fields deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub address: String,
}

impl User {
    /// Checks every field and reports all violations at once, as
    /// `<field>: <reason>` joined by `;`.
    pub fn validate(&self) -> Result<(), String> {
        let mut violations = Vec::new();
        if self.id.is_empty() {
            violations.push("id: non zero value required");
        }
        if self.name.is_empty() {
            violations.push("name: non zero value required");
        }
        if !self.email.is_empty() && !EMAIL.is_match(&self.email) {
            violations.push("email: does not validate as email");
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations.join(";"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, name: &str, email: &str) -> User {
        User {
            id: id.to_owned(),
            name: name.to_owned(),
            email: email.to_owned(),
            address: String::new(),
        }
    }

    #[test]
    fn accepts_complete_users() {
        assert!(user("42", "Ada", "ada@example.com").validate().is_ok());
        assert!(user("42", "Ada", "").validate().is_ok());
    }

    #[test]
    fn reports_every_violation() {
        let err = user("", "", "not-an-email").validate().unwrap_err();
        assert_eq!(
            err,
            "id: non zero value required;name: non zero value required;email: does not validate as email"
        );
    }

    #[test]
    fn user_ids_are_alphanumeric_with_dashes() {
        assert!(is_valid_user_id("abc-123"));
        assert!(!is_valid_user_id("abc_123"));
        assert!(!is_valid_user_id("a.b"));
        assert!(!is_valid_user_id(""));
    }
}
