use super::{optional_text, required_text, Collector, ValidationError, NAME_MAX_LEN, USERNAME_MAX_LEN};
use crate::domain::Role;
use serde::Deserialize;
use std::str::FromStr;

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

fn validate_password(field: &'static str, value: Option<&str>) -> Result<String, ValidationError> {
    let value = value.unwrap_or_default();
    if value.is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    let len = value.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(ValidationError::new(
            field,
            format!(
                "must be between {} and {} characters",
                PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
            ),
        ));
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Username, email or phone.
    #[serde(alias = "username", alias = "email", alias = "phone")]
    pub login: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<Credentials, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let login = errors.check(required_text("login", self.login.as_deref(), NAME_MAX_LEN));
        let password = self.password.clone().filter(|p| !p.is_empty());
        if password.is_none() {
            errors.push("password", "is required");
        }
        errors.finish()?;

        match (login, password) {
            (Some(login), Some(password)) => Ok(Credentials { login, password }),
            _ => Err(vec![ValidationError::new("login", "is required")]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

impl RefreshRequest {
    pub fn validate(&self) -> Result<String, Vec<ValidationError>> {
        match self.refresh_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(vec![ValidationError::new("refreshToken", "is required")]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<ChangePassword, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let current_password = self.current_password.clone().filter(|p| !p.is_empty());
        if current_password.is_none() {
            errors.push("currentPassword", "is required");
        }
        let new_password = errors.check(validate_password("newPassword", self.new_password.as_deref()));
        if let (Some(current), Some(new)) = (&current_password, &new_password) {
            if current == new {
                errors.push("newPassword", "must differ from the current password");
            }
        }
        errors.finish()?;

        match (current_password, new_password) {
            (Some(current_password), Some(new_password)) => Ok(ChangePassword {
                current_password,
                new_password,
            }),
            _ => Err(vec![ValidationError::new("newPassword", "is required")]),
        }
    }
}

/// Operator account creation, used by the `users create` command.
#[derive(Debug, Clone, Default)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUser {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub role: Role,
    pub display_name: Option<String>,
    pub phone: Option<String>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<CreateUser, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let username = errors.check(required_text("username", self.username.as_deref(), USERNAME_MAX_LEN));
        let email = errors
            .check(optional_text("email", self.email.as_deref(), NAME_MAX_LEN))
            .flatten();
        if email.as_deref().map_or(false, |e| !e.contains('@')) {
            errors.push("email", "must be a valid email address");
        }
        let password = errors.check(validate_password("password", self.password.as_deref()));
        let role = match Role::from_str(self.role.as_deref().unwrap_or("")) {
            Ok(role) => Some(role),
            Err(_) => {
                errors.push("role", "must be one of: admin, agent, player");
                None
            }
        };
        let display_name = errors
            .check(optional_text("displayName", self.display_name.as_deref(), NAME_MAX_LEN))
            .flatten();
        let phone = errors
            .check(optional_text("phone", self.phone.as_deref(), 32))
            .flatten();
        errors.finish()?;

        match (username, password, role) {
            (Some(username), Some(password), Some(role)) => Ok(CreateUser {
                username,
                email: email.map(|e| e.to_ascii_lowercase()),
                password,
                role,
                display_name,
                phone,
            }),
            _ => Err(vec![ValidationError::new("username", "is required")]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_accepts_username_alias() {
        let request: LoginRequest = serde_json::from_value(serde_json::json!({
            "username": "ops1",
            "password": "secret"
        }))
        .unwrap();
        let creds = request.validate().unwrap();
        assert_eq!(creds.login, "ops1");
    }

    #[test]
    fn change_password_rules() {
        let same = ChangePasswordRequest {
            current_password: Some("longenough".into()),
            new_password: Some("longenough".into()),
        }
        .validate()
        .unwrap_err();
        assert_eq!(same[0].field, "newPassword");

        let short = ChangePasswordRequest {
            current_password: Some("old".into()),
            new_password: Some("short".into()),
        }
        .validate()
        .unwrap_err();
        assert!(short[0].message.contains("between"));
    }

    #[test]
    fn create_user_validates_role_and_email() {
        let errors = CreateUserRequest {
            username: Some("ops".into()),
            email: Some("not-an-email".into()),
            password: Some("password123".into()),
            role: Some("superuser".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["email", "role"]);
    }
}
