//! Core domain types for calcboard
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Operation** | One of addition, subtraction, multiplication, division |
//! | **Calculation** | A persisted operation over an ordered list of inputs, with its result |
//! | **Owner** | The user a calculation belongs to; every query is scoped by owner |
//! | **User** | A registered account that owns calculations |
//!
//! A [`Calculation`]'s `result` is never set directly. It is always derived from
//! `(type, inputs)` by the arithmetic engine, at construction and on every update.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::arithmetic;
use crate::error::{Error, Result};

// ============================================
// Operation
// ============================================

/// Arithmetic operation applied left-to-right over a calculation's inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Addition,
    Subtraction,
    Multiplication,
    Division,
}

impl OperationType {
    /// Every supported operation, in tag order.
    pub const ALL: [OperationType; 4] = [
        OperationType::Addition,
        OperationType::Division,
        OperationType::Multiplication,
        OperationType::Subtraction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Addition => "addition",
            OperationType::Subtraction => "subtraction",
            OperationType::Multiplication => "multiplication",
            OperationType::Division => "division",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OperationType {
    type Err = Error;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "addition" => Ok(OperationType::Addition),
            "subtraction" => Ok(OperationType::Subtraction),
            "multiplication" => Ok(OperationType::Multiplication),
            "division" => Ok(OperationType::Division),
            _ => Err(Error::UnsupportedOperation(s.to_string())),
        }
    }
}

// ============================================
// Calculation
// ============================================

/// A user's arithmetic operation and its computed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    /// Unique identifier (UUID v4), immutable once created
    pub id: String,
    /// Owning user's ID
    pub user_id: String,
    /// Operation applied to the inputs
    #[serde(rename = "type")]
    pub operation: OperationType,
    /// Ordered inputs, always at least two
    pub inputs: Vec<f64>,
    /// Result of applying `operation` to `inputs`
    pub result: f64,
    /// When the calculation was created
    pub created_at: DateTime<Utc>,
    /// When the calculation was last modified
    pub updated_at: DateTime<Utc>,
}

impl Calculation {
    /// Validate and build a new calculation, computing its result.
    pub fn new(user_id: &str, operation: OperationType, inputs: Vec<f64>) -> Result<Self> {
        Self::new_at(user_id, operation, inputs, Utc::now())
    }

    /// Same as [`Calculation::new`] with an explicit creation time.
    pub fn new_at(
        user_id: &str,
        operation: OperationType,
        inputs: Vec<f64>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let result = arithmetic::compute(operation, &inputs)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            operation,
            inputs,
            result,
            created_at: now,
            updated_at: now,
        })
    }

    /// Build a calculation from an untyped request payload.
    pub fn from_request(user_id: &str, request: &NewCalculation) -> Result<Self> {
        if request.inputs.len() < 2 {
            return Err(arithmetic::too_few_inputs());
        }
        let operation = request.operation.parse()?;
        Self::new(user_id, operation, request.inputs.clone())
    }

    /// Re-derive the result from the current type and inputs.
    pub fn recompute(&self) -> Result<f64> {
        arithmetic::compute(self.operation, &self.inputs)
    }

    /// Replace type and/or inputs, recompute the result and refresh `updated_at`.
    ///
    /// Nothing is modified unless the new combination validates.
    pub fn apply(&mut self, update: &CalculationUpdate, now: DateTime<Utc>) -> Result<()> {
        let operation = match &update.operation {
            Some(tag) => tag.parse()?,
            None => self.operation,
        };
        let inputs = match &update.inputs {
            Some(inputs) => inputs.clone(),
            None => self.inputs.clone(),
        };

        let result = arithmetic::compute(operation, &inputs)?;

        self.operation = operation;
        self.inputs = inputs;
        self.result = result;
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        };
        Ok(())
    }
}

/// Payload for creating a calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCalculation {
    /// Operation tag (case-insensitive)
    #[serde(rename = "type")]
    pub operation: String,
    pub inputs: Vec<f64>,
}

/// Payload for editing a calculation. Omitted fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalculationUpdate {
    #[serde(rename = "type", default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub inputs: Option<Vec<f64>>,
}

// ============================================
// Users
// ============================================

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Registration payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub confirm_password: String,
}

/// Salted password digest as stored alongside a user.
#[derive(Debug, Clone)]
pub struct PasswordHash {
    pub salt: String,
    pub digest: String,
}

/// Bearer token purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Short-lived token accepted on API calls
    Access,
    /// Long-lived token exchanged for a new pair
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::str::FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenKind::Access),
            "refresh" => Ok(TokenKind::Refresh),
            _ => Err(format!("unknown token kind: {}", s)),
        }
    }
}

/// A stored bearer token. Only the SHA-256 of the token is persisted.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub token_hash: String,
    pub user_id: String,
    pub kind: TokenKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse_case_insensitive() {
        assert_eq!(
            "Addition".parse::<OperationType>().unwrap(),
            OperationType::Addition
        );
        assert_eq!(
            " DIVISION ".parse::<OperationType>().unwrap(),
            OperationType::Division
        );
        assert!(matches!(
            "modulo".parse::<OperationType>(),
            Err(Error::UnsupportedOperation(tag)) if tag == "modulo"
        ));
    }

    #[test]
    fn test_operation_serializes_lowercase() {
        let json = serde_json::to_string(&OperationType::Multiplication).unwrap();
        assert_eq!(json, "\"multiplication\"");
    }

    #[test]
    fn test_new_calculation_computes_result() {
        let calc = Calculation::new("user-1", OperationType::Subtraction, vec![10.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(calc.result, 5.0);
        assert_eq!(calc.created_at, calc.updated_at);
        assert!(uuid::Uuid::parse_str(&calc.id).is_ok());
    }

    #[test]
    fn test_new_calculation_rejects_bad_inputs() {
        assert!(matches!(
            Calculation::new("u", OperationType::Addition, vec![5.0]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            Calculation::new("u", OperationType::Division, vec![1.0, 0.0]),
            Err(Error::DivisionByZero)
        ));
    }

    #[test]
    fn test_from_request_checks_inputs_before_tag() {
        let request = NewCalculation {
            operation: "bogus".to_string(),
            inputs: vec![1.0],
        };
        assert!(matches!(
            Calculation::from_request("u", &request),
            Err(Error::InvalidInput(_))
        ));

        let request = NewCalculation {
            operation: "bogus".to_string(),
            inputs: vec![1.0, 2.0],
        };
        assert!(matches!(
            Calculation::from_request("u", &request),
            Err(Error::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_apply_recomputes_and_bumps_updated_at() {
        let created = Utc::now() - Duration::minutes(5);
        let mut calc =
            Calculation::new_at("u", OperationType::Addition, vec![1.0, 2.0], created).unwrap();

        let update = CalculationUpdate {
            operation: Some("Multiplication".to_string()),
            inputs: Some(vec![2.0, 3.0, 4.0]),
        };
        calc.apply(&update, Utc::now()).unwrap();

        assert_eq!(calc.operation, OperationType::Multiplication);
        assert_eq!(calc.result, 24.0);
        assert_eq!(calc.result, calc.recompute().unwrap());
        assert!(calc.updated_at > created);
        assert_eq!(calc.created_at, created);
    }

    #[test]
    fn test_apply_updated_at_strictly_increases_with_stalled_clock() {
        let now = Utc::now();
        let mut calc = Calculation::new_at("u", OperationType::Addition, vec![1.0, 2.0], now)
            .unwrap();

        calc.apply(&CalculationUpdate::default(), now).unwrap();
        assert!(calc.updated_at > now);

        let previous = calc.updated_at;
        calc.apply(&CalculationUpdate::default(), now).unwrap();
        assert!(calc.updated_at > previous);
    }

    #[test]
    fn test_apply_failure_leaves_record_untouched() {
        let mut calc =
            Calculation::new("u", OperationType::Addition, vec![10.0, 0.0]).unwrap();
        let before = calc.clone();

        // Switching to division makes the existing zero a divisor.
        let update = CalculationUpdate {
            operation: Some("division".to_string()),
            inputs: None,
        };
        assert!(matches!(
            calc.apply(&update, Utc::now()),
            Err(Error::DivisionByZero)
        ));
        assert_eq!(calc, before);

        let update = CalculationUpdate {
            operation: None,
            inputs: Some(vec![1.0]),
        };
        assert!(calc.apply(&update, Utc::now()).is_err());
        assert_eq!(calc, before);
    }

    #[test]
    fn test_calculation_wire_shape() {
        let calc = Calculation::new("u", OperationType::Division, vec![100.0, 2.0, 5.0]).unwrap();
        let value = serde_json::to_value(&calc).unwrap();
        assert_eq!(value["type"], "division");
        assert_eq!(value["result"], 10.0);
        assert_eq!(value["user_id"], "u");
        assert!(value["created_at"].is_string());
    }

    #[test]
    fn test_update_payload_fields_optional() {
        let update: CalculationUpdate = serde_json::from_str(r#"{"inputs": [1, 2]}"#).unwrap();
        assert!(update.operation.is_none());
        assert_eq!(update.inputs, Some(vec![1.0, 2.0]));
    }
}
