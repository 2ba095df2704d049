//! Gemini-backed listing extraction: send a car photo, get a best-effort
//! structured guess back, then coerce the free-text fields into the
//! listing vocabulary.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const EXTRACTION_PROMPT: &str = "\
Analyze this car image and extract the following information:
1. Make (manufacturer)
2. Model
3. Year (approximately)
4. Color
5. Body type (SUV, Sedan, Hatchback, etc.)
6. Mileage (estimate)
7. Fuel type (your best guess)
8. Transmission type (your best guess)
9. Price (your best guess in USD)
10. Short Description as to be added to a car listing

Format your response as a clean JSON object with these fields:
{
  \"make\": \"\",
  \"model\": \"\",
  \"year\": 0000,
  \"color\": \"\",
  \"price\": \"\",
  \"mileage\": \"\",
  \"bodyType\": \"\",
  \"fuelType\": \"\",
  \"transmission\": \"\",
  \"description\": \"\",
  \"confidence\": 0.0
}

For confidence, provide a value between 0 and 1 representing how confident you are in your overall identification.
Only respond with the JSON object, nothing else.";

/// Listing vocabularies the AI guess is normalized into.
pub const BODY_TYPES: &[&str] = &[
    "SUV", "Sedan", "Hatchback", "Coupe", "Convertible", "Wagon", "Pickup", "Minivan",
];
pub const FUEL_TYPES: &[&str] = &["Petrol", "Diesel", "Electric", "Hybrid", "Plug-in Hybrid"];
pub const TRANSMISSIONS: &[&str] = &["Automatic", "Manual", "Semi-Automatic"];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarScan {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub color: String,
    pub price: String,
    pub mileage: String,
    pub body_type: String,
    pub fuel_type: String,
    pub transmission: String,
    pub description: String,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

/// Ask Gemini to describe the car on the image. `image_base64` is the raw
/// base64 payload (no data-URL prefix). Failures are surfaced directly;
/// there are no retries.
pub async fn scan_car_image(
    client: &reqwest::Client,
    api_key: &str,
    model: &str,
    mime_type: &str,
    image_base64: String,
) -> AppResult<CarScan> {
    let url = format!("{}/{}:generateContent?key={}", GEMINI_ENDPOINT, model, api_key);

    let body = GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part {
                    inline_data: Some(InlineData {
                        mime_type: mime_type.to_string(),
                        data: image_base64,
                    }),
                    text: None,
                },
                Part {
                    inline_data: None,
                    text: Some(EXTRACTION_PROMPT.to_string()),
                },
            ],
        }],
    };

    let response = client
        .post(&url)
        .json(&body)
        .send()
        .await
        .map_err(|e| AppError::Internal(format!("Gemini request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        return Err(AppError::Internal(format!(
            "Gemini API error ({}): {}",
            status, detail
        )));
    }

    let parsed: GenerateResponse = response
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("Gemini response unreadable: {}", e)))?;

    let text = parsed
        .candidates
        .first()
        .and_then(|c| c.content.parts.first())
        .map(|p| p.text.as_str())
        .ok_or_else(|| AppError::Internal("Gemini returned no candidates".to_string()))?;

    let mut scan: CarScan = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| AppError::Internal(format!("Failed to parse AI response: {}", e)))?;

    scan.body_type = normalize_label(&scan.body_type, BODY_TYPES);
    scan.fuel_type = normalize_fuel_type(&scan.fuel_type);
    scan.transmission = normalize_label(&scan.transmission, TRANSMISSIONS);

    Ok(scan)
}

/// Models wrap their JSON in markdown fences more often than not.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Match a free-text AI guess against a closed vocabulary: exact
/// case-insensitive first, then substring either way. Unmatched guesses
/// pass through trimmed so the admin can correct them in the form.
pub fn normalize_label(raw: &str, options: &[&str]) -> String {
    let guess = raw.trim();
    let lower = guess.to_lowercase();
    if lower.is_empty() {
        return guess.to_string();
    }

    for option in options {
        if option.to_lowercase() == lower {
            return (*option).to_string();
        }
    }

    for option in options {
        let option_lower = option.to_lowercase();
        if lower.contains(&option_lower) || option_lower.contains(&lower) {
            return (*option).to_string();
        }
    }

    guess.to_string()
}

/// Fuel type needs extra aliases before the generic matching kicks in.
pub fn normalize_fuel_type(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();

    if lower.contains("plug") {
        return "Plug-in Hybrid".to_string();
    }
    if lower.contains("gasoline") || lower.contains("gas ") || lower == "gas" {
        return "Petrol".to_string();
    }
    if lower == "ev" || lower.contains("electric") {
        return "Electric".to_string();
    }

    normalize_label(raw, FUEL_TYPES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_plain_fences() {
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_unfenced_text_untouched() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn test_normalize_exact_case_insensitive() {
        assert_eq!(normalize_label("sedan", BODY_TYPES), "Sedan");
        assert_eq!(normalize_label("SUV", BODY_TYPES), "SUV");
    }

    #[test]
    fn test_normalize_substring_match() {
        assert_eq!(normalize_label("Compact SUV", BODY_TYPES), "SUV");
        assert_eq!(normalize_label("automatic (CVT)", TRANSMISSIONS), "Automatic");
    }

    #[test]
    fn test_normalize_unknown_passes_through() {
        assert_eq!(normalize_label("Rocket Ship", BODY_TYPES), "Rocket Ship");
    }

    #[test]
    fn test_fuel_type_aliases() {
        assert_eq!(normalize_fuel_type("Gasoline"), "Petrol");
        assert_eq!(normalize_fuel_type("EV"), "Electric");
        assert_eq!(normalize_fuel_type("plug-in hybrid"), "Plug-in Hybrid");
        assert_eq!(normalize_fuel_type("diesel"), "Diesel");
    }

    #[test]
    fn test_scan_deserializes_camel_case() {
        let json = r#"{
            "make": "Toyota", "model": "Corolla", "year": 2020,
            "color": "Blue", "price": "18000", "mileage": "42000",
            "bodyType": "Sedan", "fuelType": "Petrol",
            "transmission": "Automatic", "description": "Clean sedan",
            "confidence": 0.92
        }"#;

        let scan: CarScan = serde_json::from_str(json).unwrap();
        assert_eq!(scan.body_type, "Sedan");
        assert_eq!(scan.year, 2020);
        assert!((scan.confidence - 0.92).abs() < f64::EPSILON);
    }
}
