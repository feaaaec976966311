use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use sqlx::{
    decode::Decode,
    encode::{Encode, IsNull},
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
    FromRow, Postgres, Type, TypeInfo,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Owner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Owner => "owner",
            Role::Admin => "admin",
        }
    }

    fn parse_normalized(value: &str) -> Result<Self, ParseEnumError> {
        match value {
            "staff" => Ok(Role::Staff),
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            _ => Err(ParseEnumError::new("role", value)),
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = ParseEnumError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Role::parse_normalized(&normalized)
    }
}

impl Type<Postgres> for Role {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("text")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        matches!(ty.name(), "text" | "varchar" | "bpchar")
    }
}

impl<'q> Encode<'q, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        let value = self.as_str();
        <&str as Encode<Postgres>>::encode_by_ref(&value, buf)
    }

    fn size_hint(&self) -> usize {
        let value = self.as_str();
        <&str as Encode<Postgres>>::size_hint(&value)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let raw = <&str as Decode<Postgres>>::decode(value)?;
        Role::try_from(raw).map_err(|err| Box::new(err) as BoxDynError)
    }
}

#[derive(Debug, Clone)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported {} value: {}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// Billing tier of a pharmacy. Determines how many distinct reverse
/// distributors it may ship to in one calendar month.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    #[default]
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Free => "free",
            SubscriptionPlan::Basic => "basic",
            SubscriptionPlan::Premium => "premium",
            SubscriptionPlan::Enterprise => "enterprise",
        }
    }
}

impl FromStr for SubscriptionPlan {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(SubscriptionPlan::Free),
            "basic" => Ok(SubscriptionPlan::Basic),
            "premium" => Ok(SubscriptionPlan::Premium),
            "enterprise" => Ok(SubscriptionPlan::Enterprise),
            _ => Err(ParseEnumError::new("subscription plan", value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PharmacyUser {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub pharmacy_id: Uuid,
    pub plan: SubscriptionPlan,
    pub status: String,
}

impl Subscription {
    /// Plan currently in force. Lapsed subscriptions fall back to the free tier.
    pub fn effective_plan(&self) -> SubscriptionPlan {
        match self.status.as_str() {
            "active" | "trialing" => self.plan,
            _ => SubscriptionPlan::Free,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Distributor {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
}

/// Unit price a distributor paid for an NDC at a point in time. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PriceObservation {
    pub ndc: String,
    pub distributor_id: Uuid,
    pub unit_price: f64,
    pub observed_at: DateTime<Utc>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductListItem {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub ndc: String,
    pub product_name: String,
    pub quantity: i32,
    pub lot_number: Option<String>,
    pub expiration_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CreditReport {
    pub id: Uuid,
    pub pharmacy_id: Uuid,
    pub distributor_id: Uuid,
    pub report_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CreditReportLine {
    pub id: Uuid,
    pub report_id: Uuid,
    pub ndc: String,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub unit_price: f64,
}

/// A credit report line joined with the report header, as consumed by the
/// earnings aggregation.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct CreditedLine {
    pub distributor_id: Uuid,
    pub report_date: NaiveDate,
    pub quantity: i32,
    pub unit_price: f64,
}
