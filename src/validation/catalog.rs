use super::{optional_text, required_text, validate_url, Collector, ValidationError, NAME_MAX_LEN, NOTES_MAX_LEN};
use crate::domain::catalog::{NewBettingSite, NewDepositBank, NewWithdrawalBank};
use serde::Deserialize;
use serde_json::Value;

const ACCOUNT_MAX_LEN: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositBankRequest {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

impl DepositBankRequest {
    pub fn validate(&self) -> Result<NewDepositBank, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let bank_name = errors.check(required_text("bankName", self.bank_name.as_deref(), NAME_MAX_LEN));
        let account_number = errors.check(required_text(
            "accountNumber",
            self.account_number.as_deref(),
            ACCOUNT_MAX_LEN,
        ));
        let account_name = errors.check(required_text(
            "accountName",
            self.account_name.as_deref(),
            NAME_MAX_LEN,
        ));
        let notes = errors
            .check(optional_text("notes", self.notes.as_deref(), NOTES_MAX_LEN))
            .flatten();
        errors.finish()?;

        match (bank_name, account_number, account_name) {
            (Some(bank_name), Some(account_number), Some(account_name)) => Ok(NewDepositBank {
                bank_name,
                account_number,
                account_name,
                notes,
                is_active: self.is_active.unwrap_or(true),
            }),
            _ => Err(vec![ValidationError::new("bankName", "is required")]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalBankRequest {
    pub bank_name: Option<String>,
    /// Field descriptors the player must fill in for this bank.
    pub required_fields: Option<Value>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

impl WithdrawalBankRequest {
    pub fn validate(&self) -> Result<NewWithdrawalBank, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let bank_name = errors.check(required_text("bankName", self.bank_name.as_deref(), NAME_MAX_LEN));
        let required_fields = match &self.required_fields {
            None | Some(Value::Null) => Value::Array(Vec::new()),
            Some(value @ (Value::Array(_) | Value::Object(_))) => value.clone(),
            Some(_) => {
                errors.push("requiredFields", "must be a JSON array or object");
                Value::Null
            }
        };
        let notes = errors
            .check(optional_text("notes", self.notes.as_deref(), NOTES_MAX_LEN))
            .flatten();
        errors.finish()?;

        match bank_name {
            Some(bank_name) => Ok(NewWithdrawalBank {
                bank_name,
                required_fields,
                notes,
                is_active: self.is_active.unwrap_or(true),
            }),
            None => Err(vec![ValidationError::new("bankName", "is required")]),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingSiteRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub is_active: Option<bool>,
}

impl BettingSiteRequest {
    pub fn validate(&self) -> Result<NewBettingSite, Vec<ValidationError>> {
        let mut errors = Collector::default();
        let name = errors.check(required_text("name", self.name.as_deref(), NAME_MAX_LEN));
        let description = errors
            .check(optional_text("description", self.description.as_deref(), NOTES_MAX_LEN))
            .flatten();
        let website = match self.website.as_deref().filter(|w| !w.trim().is_empty()) {
            Some(website) => errors.check(validate_url("website", website)),
            None => None,
        };
        errors.finish()?;

        match name {
            Some(name) => Ok(NewBettingSite {
                name,
                description,
                website,
                is_active: self.is_active.unwrap_or(true),
            }),
            None => Err(vec![ValidationError::new("name", "is required")]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_bank_reports_all_missing_fields() {
        let errors = DepositBankRequest::default().validate().unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["bankName", "accountNumber", "accountName"]);
    }

    #[test]
    fn withdrawal_bank_required_fields_shape() {
        let ok = WithdrawalBankRequest {
            bank_name: Some("CBE".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(ok.required_fields, serde_json::json!([]));
        assert!(ok.is_active);

        let bad = WithdrawalBankRequest {
            bank_name: Some("CBE".into()),
            required_fields: Some(serde_json::json!("account")),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(bad[0].field, "requiredFields");
    }

    #[test]
    fn betting_site_website_must_be_http() {
        let errors = BettingSiteRequest {
            name: Some("Acme Bet".into()),
            website: Some("ftp://acme.example".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors[0].field, "website");
    }
}
