//! Public types for the model catalog API
use serde::Serialize;

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
    pub selected_default: Option<String>,
    pub problem: Option<String>,
}
