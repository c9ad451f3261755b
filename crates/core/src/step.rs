//! Step model - one manufacturing operation within a product's process.

use serde::{Deserialize, Serialize};
use crate::dependency::DependencyType;
use crate::id::{ProductId, StepId};
use crate::Time;

/// A step is a unit of manufacturing work belonging to one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique identifier
    pub id: StepId,

    /// Owning product
    pub product_id: ProductId,

    /// Display name
    pub name: String,

    /// Short shop code (e.g. "CFA1")
    pub code: Option<String>,

    /// Work category
    pub category: StepCategory,

    /// Standard time per piece in seconds, always > 0
    pub time_per_piece_seconds: u32,

    /// Advisory ordering within the product
    pub sequence: u32,

    /// Equipment the step needs, if any
    pub equipment_code: Option<String>,

    /// Skill category a worker must hold, if any
    pub required_skill: Option<String>,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,
}

/// Input for creating a step.
#[derive(Debug, Clone)]
pub struct NewStep {
    /// Owning product
    pub product_id: ProductId,
    /// Display name; must not be blank
    pub name: String,
    /// Short code, unique within the product
    pub code: Option<String>,
    /// Work category
    pub category: StepCategory,
    /// Standard time per piece; must be positive
    pub time_per_piece_seconds: u32,
    /// Advisory ordering hint
    pub sequence: u32,
    /// Required equipment
    pub equipment_code: Option<String>,
    /// Required worker skill
    pub required_skill: Option<String>,
}

impl NewStep {
    /// Minimal step definition; everything optional is left empty.
    pub fn new(product_id: ProductId, name: impl Into<String>, time_per_piece_seconds: u32) -> Self {
        Self {
            product_id,
            name: name.into(),
            code: None,
            category: StepCategory::Uncategorized,
            time_per_piece_seconds,
            sequence: 0,
            equipment_code: None,
            required_skill: None,
        }
    }

    /// Set the shop code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the category.
    pub fn with_category(mut self, category: StepCategory) -> Self {
        self.category = category;
        self
    }

    /// Set the sequence number.
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Set the required equipment.
    pub fn with_equipment(mut self, equipment_code: impl Into<String>) -> Self {
        self.equipment_code = Some(equipment_code.into());
        self
    }

    /// Set the required skill category.
    pub fn with_required_skill(mut self, skill: impl Into<String>) -> Self {
        self.required_skill = Some(skill.into());
        self
    }
}

/// Manufacturing work category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepCategory {
    /// Fabric cutting
    Cutting,
    /// Screen printing
    Silkscreen,
    /// Preparation before sewing
    Prep,
    /// Sewing
    Sewing,
    /// Quality inspection
    Inspection,
    /// No category recorded
    Uncategorized,
}

impl StepCategory {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepCategory::Cutting => "CUTTING",
            StepCategory::Silkscreen => "SILKSCREEN",
            StepCategory::Prep => "PREP",
            StepCategory::Sewing => "SEWING",
            StepCategory::Inspection => "INSPECTION",
            StepCategory::Uncategorized => "UNCATEGORIZED",
        }
    }
}

impl std::fmt::Display for StepCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepCategory {
    type Err = crate::Error;

    /// Case-insensitive; blank text means uncategorized.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CUTTING" => Ok(StepCategory::Cutting),
            "SILKSCREEN" => Ok(StepCategory::Silkscreen),
            "PREP" => Ok(StepCategory::Prep),
            "SEWING" => Ok(StepCategory::Sewing),
            "INSPECTION" => Ok(StepCategory::Inspection),
            "" | "UNCATEGORIZED" => Ok(StepCategory::Uncategorized),
            other => Err(crate::Error::validation(format!("unknown step category '{}'", other))),
        }
    }
}

/// A step as returned to external callers, with its incoming dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepWithDependencies {
    /// The step record
    #[serde(flatten)]
    pub step: Step,

    /// Steps this step depends on
    pub dependencies: Vec<DependencyRef>,
}

/// An incoming dependency as seen from the dependent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRef {
    /// The predecessor step
    pub step_id: StepId,

    /// Edge semantics
    #[serde(rename = "type")]
    pub dep_type: DependencyType,

    /// Lag after the predecessor finishes
    pub lag_seconds: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parses_case_insensitively() {
        assert_eq!("Cutting".parse::<StepCategory>().unwrap(), StepCategory::Cutting);
        assert_eq!(" sewing ".parse::<StepCategory>().unwrap(), StepCategory::Sewing);
        assert_eq!("".parse::<StepCategory>().unwrap(), StepCategory::Uncategorized);
    }

    #[test]
    fn test_unknown_category_is_validation_error() {
        let err = "Welding".parse::<StepCategory>().unwrap_err();
        assert!(matches!(err, crate::Error::Validation(_)));
    }

    #[test]
    fn test_category_serializes_uppercase() {
        let json = serde_json::to_string(&StepCategory::Silkscreen).unwrap();
        assert_eq!(json, "\"SILKSCREEN\"");
    }
}
