use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Design family requested from the staging service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
pub enum DesignType {
    Interior,
    Exterior,
}

/// Style parameters sent as multipart form fields alongside the image.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StyleParams {
    #[garde(skip)]
    pub design_type: DesignType,

    /// Intervention strength label understood by the service (e.g. "Mid").
    #[garde(length(min = 1, max = 50))]
    pub ai_intervention: String,

    /// Number of variants to generate.
    #[garde(range(min = 1, max = 4))]
    pub no_design: u8,

    #[garde(length(min = 1, max = 100))]
    pub design_style: String,

    /// Required when `design_type` is `Interior`.
    #[garde(length(min = 1, max = 100))]
    pub room_type: Option<String>,

    #[garde(length(max = 1000))]
    pub custom_instruction: Option<String>,
}

impl StyleParams {
    /// Name of the first style-specific field the chosen design type needs but lacks.
    pub fn missing_required_field(&self) -> Option<&'static str> {
        match self.design_type {
            DesignType::Interior if self.room_type.is_none() => Some("room_type"),
            _ => None,
        }
    }

    /// Form fields in the order the service documents them.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("design_type", self.design_type.to_string()),
            ("ai_intervention", self.ai_intervention.clone()),
            ("no_design", self.no_design.to_string()),
            ("design_style", self.design_style.clone()),
        ];
        if let Some(room_type) = &self.room_type {
            fields.push(("room_type", room_type.clone()));
        }
        if let Some(instruction) = &self.custom_instruction {
            fields.push(("custom_instruction", instruction.clone()));
        }
        fields
    }
}
