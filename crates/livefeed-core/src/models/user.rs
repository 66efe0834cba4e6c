//! Account models exchanged with the backend.

use serde::{Deserialize, Serialize};

/// A backend user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub phone: String,
    /// ISO-8601 date string as sent by the app
    #[serde(default)]
    pub date_of_birth: String,
    /// Base64 image or URL
    #[serde(default)]
    pub image: String,
}

impl User {
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.username.is_empty() {
            &self.username
        } else {
            &self.email
        }
    }
}

/// Email/password pair for `POST /login`.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Both fields must be non-blank
    pub fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err("Email and password required".to_string());
        }
        Ok(())
    }
}

// Keeps the password out of logs
impl std::fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// New account details for `POST /signup`.
#[derive(Clone, Serialize)]
pub struct SignupProfile {
    #[serde(flatten)]
    pub user: User,
    pub password: String,
}

impl SignupProfile {
    /// Every field is required, matching the signup form
    pub fn validate(&self) -> Result<(), String> {
        let u = &self.user;
        let required = [
            ("email", u.email.as_str()),
            ("password", self.password.as_str()),
            ("name", u.name.as_str()),
            ("username", u.username.as_str()),
            ("phone", u.phone.as_str()),
            ("dateOfBirth", u.date_of_birth.as_str()),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(k, _)| *k)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("Please fill in all fields (missing: {})", missing.join(", ")))
        }
    }

    pub fn credentials(&self) -> LoginCredentials {
        LoginCredentials::new(self.user.email.clone(), self.password.clone())
    }
}

impl std::fmt::Debug for SignupProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupProfile")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SignupProfile {
        SignupProfile {
            user: User {
                email: "ada@example.com".to_string(),
                name: "Ada".to_string(),
                username: "ada".to_string(),
                phone: "555-0100".to_string(),
                date_of_birth: "1990-12-10T00:00:00.000Z".to_string(),
                image: String::new(),
            },
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_signup_body_is_flat() {
        let value = serde_json::to_value(profile()).unwrap();
        assert_eq!(value["email"], "ada@example.com");
        assert_eq!(value["dateOfBirth"], "1990-12-10T00:00:00.000Z");
        assert_eq!(value["password"], "hunter2");
    }

    #[test]
    fn test_signup_validation_lists_missing_fields() {
        assert!(profile().validate().is_ok());

        let mut p = profile();
        p.user.phone.clear();
        p.password.clear();
        let err = p.validate().unwrap_err();
        assert!(err.contains("password"));
        assert!(err.contains("phone"));
    }

    #[test]
    fn test_debug_hides_password() {
        let creds = LoginCredentials::new("a@b.c", "secret");
        assert!(!format!("{:?}", creds).contains("secret"));
        assert!(!format!("{:?}", profile()).contains("hunter2"));
    }

    #[test]
    fn test_user_tolerates_sparse_records() {
        let user: User = serde_json::from_str(r#"{"email":"x@y.z"}"#).unwrap();
        assert_eq!(user.display_name(), "x@y.z");
    }
}
