use serde::{Deserialize, Serialize};

use crate::api::{response::api_response, ApiStatus, Payload, Result};

use super::Endpoint;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UnitConversionInput {
    pub value: f64,
    pub from_unit: String,
    pub to_unit: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UnitConversionResponse {
    #[serde(flatten)]
    pub status: ApiStatus,
    pub converted_value: Option<f64>,
    pub converted_unit: Option<String>,
    pub original_value: Option<f64>,
    #[serde(alias = "from_unit")]
    pub original_unit: Option<String>,
    pub conversion_formula: Option<String>,
}

api_response!(UnitConversionResponse);

pub struct ConvertUnits;

impl Endpoint for ConvertUnits {
    type Input = UnitConversionInput;
    type Output = UnitConversionResponse;

    const PATH: &'static str = "units/convert";

    fn payload(input: &Self::Input) -> Result<Payload> {
        Payload::json(input)
    }

    fn is_ready(input: &Self::Input) -> bool {
        input.value.is_finite()
            && !input.from_unit.trim().is_empty()
            && !input.to_unit.trim().is_empty()
    }
}
