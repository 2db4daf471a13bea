use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cpq::pricing::{round_amount, CostBreakdown};
use crate::domain::catalog::{MaterialFamily, ProductGrade};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuoteId(pub String);

impl QuoteId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuoteItemId(pub String);

impl QuoteItemId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for QuoteItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Confirmed,
    Sent,
    Accepted,
    Rejected,
    Expired,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Confirmed => "confirmed",
            Self::Sent => "sent",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "confirmed" => Some(Self::Confirmed),
            "sent" => Some(Self::Sent),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostType {
    Labor,
    Material,
    Composite,
}

impl CostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Labor => "labor",
            Self::Material => "material",
            Self::Composite => "composite",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "labor" => Some(Self::Labor),
            "material" => Some(Self::Material),
            "composite" => Some(Self::Composite),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub id: QuoteItemId,
    pub category: String,
    pub sub_category: Option<String>,
    pub item_name: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub cost_type: CostType,
    /// Only read for composite items.
    pub labor_ratio: Option<Decimal>,
    pub family: Option<MaterialFamily>,
    pub sort_order: i32,
    pub is_optional: bool,
    pub is_included: bool,
    pub notes: Option<String>,
}

impl QuoteItem {
    pub fn new(
        category: impl Into<String>,
        item_name: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
        unit_price: Decimal,
        cost_type: CostType,
    ) -> Self {
        let mut item = Self {
            id: QuoteItemId::generate(),
            category: category.into(),
            sub_category: None,
            item_name: item_name.into(),
            quantity,
            unit: unit.into(),
            unit_price,
            total_price: Decimal::ZERO,
            cost_type,
            labor_ratio: None,
            family: None,
            sort_order: 0,
            is_optional: false,
            is_included: true,
            notes: None,
        };
        item.reprice();
        item
    }

    /// Presentation order: `sort_order`, ties broken by item id.
    pub fn presentation_cmp(&self, other: &Self) -> Ordering {
        self.sort_order.cmp(&other.sort_order).then_with(|| self.id.cmp(&other.id))
    }

    /// Recomputes `total_price` as `round(quantity * unit_price)`.
    pub fn reprice(&mut self) {
        self.total_price = round_amount(self.quantity * self.unit_price);
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.item_name.trim().is_empty() {
            return Err(DomainError::validation(format!("item `{}` has an empty name", self.id)));
        }
        if self.quantity < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "item `{}` has a negative quantity",
                self.item_name
            )));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "item `{}` has a negative unit price",
                self.item_name
            )));
        }
        if let Some(ratio) = self.labor_ratio {
            if ratio < Decimal::ZERO || ratio > Decimal::ONE {
                return Err(DomainError::validation(format!(
                    "item `{}` has labor_ratio {ratio} outside 0..=1",
                    self.item_name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub address: Option<String>,
    pub property_type: Option<String>,
    /// Exclusive area in ㎡.
    pub size: Option<Decimal>,
}

/// Every restorable quote field except identity, timestamps and items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteScalars {
    pub estimate_id: Option<String>,
    pub floorplan_id: Option<String>,
    pub customer: CustomerInfo,
    pub property: PropertyInfo,
    pub grade: ProductGrade,
    pub labor_cost: Decimal,
    pub material_cost: Decimal,
    pub other_cost: Decimal,
    pub discount_amount: Decimal,
    pub discount_reason: Option<String>,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
    pub final_amount: Decimal,
    pub status: QuoteStatus,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub quote_number: String,
    pub estimate_id: Option<String>,
    pub floorplan_id: Option<String>,
    pub customer: CustomerInfo,
    pub property: PropertyInfo,
    pub grade: ProductGrade,
    pub items: Vec<QuoteItem>,
    pub labor_cost: Decimal,
    pub material_cost: Decimal,
    pub other_cost: Decimal,
    pub discount_amount: Decimal,
    pub discount_reason: Option<String>,
    pub vat_amount: Decimal,
    pub total_amount: Decimal,
    pub final_amount: Decimal,
    pub status: QuoteStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn draft(quote_number: impl Into<String>, customer: CustomerInfo) -> Self {
        let now = Utc::now();
        Self {
            id: QuoteId::generate(),
            quote_number: quote_number.into(),
            estimate_id: None,
            floorplan_id: None,
            customer,
            property: PropertyInfo::default(),
            grade: ProductGrade::Standard,
            items: Vec::new(),
            labor_cost: Decimal::ZERO,
            material_cost: Decimal::ZERO,
            other_cost: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            discount_reason: None,
            vat_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            final_amount: Decimal::ZERO,
            status: QuoteStatus::Draft,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// VAT opt-in is not stored; a quote carrying VAT is treated as opted in.
    pub fn vat_enabled(&self) -> bool {
        !self.vat_amount.is_zero()
    }

    pub fn scalars(&self) -> QuoteScalars {
        QuoteScalars {
            estimate_id: self.estimate_id.clone(),
            floorplan_id: self.floorplan_id.clone(),
            customer: self.customer.clone(),
            property: self.property.clone(),
            grade: self.grade,
            labor_cost: self.labor_cost,
            material_cost: self.material_cost,
            other_cost: self.other_cost,
            discount_amount: self.discount_amount,
            discount_reason: self.discount_reason.clone(),
            vat_amount: self.vat_amount,
            total_amount: self.total_amount,
            final_amount: self.final_amount,
            status: self.status,
            notes: self.notes.clone(),
        }
    }

    pub fn apply_scalars(&mut self, scalars: QuoteScalars) {
        self.estimate_id = scalars.estimate_id;
        self.floorplan_id = scalars.floorplan_id;
        self.customer = scalars.customer;
        self.property = scalars.property;
        self.grade = scalars.grade;
        self.labor_cost = scalars.labor_cost;
        self.material_cost = scalars.material_cost;
        self.other_cost = scalars.other_cost;
        self.discount_amount = scalars.discount_amount;
        self.discount_reason = scalars.discount_reason;
        self.vat_amount = scalars.vat_amount;
        self.total_amount = scalars.total_amount;
        self.final_amount = scalars.final_amount;
        self.status = scalars.status;
        self.notes = scalars.notes;
    }

    pub fn apply_breakdown(&mut self, breakdown: &CostBreakdown) {
        self.labor_cost = breakdown.labor_cost;
        self.material_cost = breakdown.material_cost;
        self.other_cost = breakdown.other_cost;
        self.total_amount = breakdown.total_amount;
        self.discount_amount = breakdown.discount_amount;
        self.vat_amount = breakdown.vat_amount;
        self.final_amount = breakdown.final_amount;
    }

    pub fn cost_invariants_hold(&self) -> bool {
        self.total_amount == self.labor_cost + self.material_cost + self.other_cost
            && self.final_amount == self.total_amount - self.discount_amount + self.vat_amount
    }

    /// Items in presentation order.
    pub fn sorted_items(&self) -> Vec<&QuoteItem> {
        let mut items = self.items.iter().collect::<Vec<_>>();
        items.sort_by(|left, right| left.presentation_cmp(right));
        items
    }

    pub fn can_transition_to(&self, next: QuoteStatus) -> bool {
        matches!(
            (self.status, next),
            (QuoteStatus::Draft, QuoteStatus::Confirmed)
                | (QuoteStatus::Confirmed, QuoteStatus::Draft)
                | (QuoteStatus::Confirmed, QuoteStatus::Sent)
                | (QuoteStatus::Sent, QuoteStatus::Accepted)
                | (QuoteStatus::Sent, QuoteStatus::Rejected)
                | (QuoteStatus::Rejected, QuoteStatus::Draft)
                | (QuoteStatus::Draft, QuoteStatus::Expired)
                | (QuoteStatus::Confirmed, QuoteStatus::Expired)
                | (QuoteStatus::Sent, QuoteStatus::Expired)
                | (QuoteStatus::Rejected, QuoteStatus::Expired)
        )
    }

    pub fn transition_to(&mut self, next: QuoteStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidQuoteTransition { from: self.status, to: next })
    }
}
