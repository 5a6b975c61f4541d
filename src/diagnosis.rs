use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::AppConfig;
use crate::error::DiagnosisError;

pub const SYSTEM_PROMPT: &str = r#"
You are an expert botanist and plant pathologist. Your task is to analyze an image of a plant leaf and identify any diseases.
Respond ONLY with a valid JSON object. Do not include any other text or markdown formatting like ```json.
The JSON object must conform to the following schema:
{
  "diseaseName": "string", // Name of the disease, or "Healthy" if no disease is found, or "Unknown" if not identifiable.
  "description": "string", // A detailed description of the disease, its symptoms, and its impact on the plant.
  "possibleCauses": ["string"], // An array of strings describing common causes.
  "suggestedTreatments": ["string"], // An array of strings with actionable treatment advice.
  "confidenceScore": "number" // A number between 0 and 1 indicating your confidence in the diagnosis.
}
If the image is not a leaf or the quality is too poor to analyze, set diseaseName to "Not a Leaf" or "Poor Quality" respectively and provide an explanation in the description.
"#;

pub const HEALTHY: &str = "Healthy";
pub const ANALYSIS_FAILED: &str = "Analysis Failed";
const INCONCLUSIVE: [&str; 3] = ["Unknown", "Not a Leaf", "Poor Quality"];

// ---- wire format ----

#[derive(Debug, Serialize)]
pub struct DiagnosisRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl DiagnosisRequest {
    pub fn new(mime_type: &str, encoded_payload: &str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text {
                        text: SYSTEM_PROMPT.to_string(),
                    },
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type: mime_type.to_string(),
                            data: encoded_payload.to_string(),
                        },
                    },
                ],
            }],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// First candidate, first part, text. Anything missing or empty is a
/// structural failure rather than a parse failure.
pub fn extract_text(response: &GenerateContentResponse) -> Result<&str, DiagnosisError> {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .and_then(|c| c.parts.first())
        .and_then(|p| p.text.as_deref())
        .filter(|text| !text.is_empty())
        .ok_or(DiagnosisError::InvalidResponseStructure)
}

// ---- diagnosis payload ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    #[serde(default = "unknown_disease")]
    pub disease_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possible_causes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_treatments: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "lenient_score",
        skip_serializing_if = "Option::is_none"
    )]
    pub confidence_score: Option<f64>,
}

fn unknown_disease() -> String {
    "Unknown".to_string()
}

// Models sometimes quote the number, mirroring the "number" in the prompt schema.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accent classification of a diagnosis card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Healthy,
    Inconclusive,
    Diseased,
}

impl DiagnosisResult {
    /// Synthetic card shown when an analysis attempt fails.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            disease_name: ANALYSIS_FAILED.to_string(),
            description: Some(message.into()),
            possible_causes: Some(Vec::new()),
            suggested_treatments: Some(Vec::new()),
            confidence_score: None,
        }
    }

    pub fn verdict(&self) -> Verdict {
        let name = self.disease_name.as_str();
        if name == HEALTHY {
            Verdict::Healthy
        } else if INCONCLUSIVE.contains(&name) {
            Verdict::Inconclusive
        } else {
            Verdict::Diseased
        }
    }

    /// `Some("90.0%")`; `None` when the score is absent or zero.
    pub fn confidence_label(&self) -> Option<String> {
        match self.confidence_score {
            Some(score) if score != 0.0 && !score.is_nan() => {
                Some(format!("{:.1}%", score * 100.0))
            }
            _ => None,
        }
    }
}

/// Removes every literal "```json" and "```" marker, then trims.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

pub fn parse_diagnosis(text: &str) -> Result<DiagnosisResult, DiagnosisError> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(&cleaned).map_err(DiagnosisError::InvalidJson)
}

// ---- client ----

#[async_trait]
pub trait Diagnoser: Send + Sync {
    async fn analyze(
        &self,
        encoded_payload: &str,
        mime_type: &str,
    ) -> Result<DiagnosisResult, DiagnosisError>;
}

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &AppConfig) -> Self {
        if config.api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY is not set; analysis requests will be rejected by the API");
        }
        Self {
            http: reqwest::Client::new(),
            endpoint: format!(
                "{}/models/{}:generateContent",
                config.base_url, config.model
            ),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl Diagnoser for GeminiClient {
    async fn analyze(
        &self,
        encoded_payload: &str,
        mime_type: &str,
    ) -> Result<DiagnosisResult, DiagnosisError> {
        let body = DiagnosisRequest::new(mime_type, encoded_payload);

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        tracing::info!(mime_type, bytes = encoded_payload.len(), "Sending diagnosis request to Gemini");

        let response = request.send().await?;
        let status = response.status();
        let response_text = response.text().await?;

        tracing::debug!(
            %status,
            body = %response_text.chars().take(500).collect::<String>(),
            "Gemini response"
        );

        if !status.is_success() {
            return Err(DiagnosisError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let envelope: GenerateContentResponse = serde_json::from_str(&response_text)
            .map_err(|_| DiagnosisError::InvalidResponseStructure)?;
        let text = extract_text(&envelope)?;
        let result = parse_diagnosis(text)?;

        tracing::info!(disease = %result.disease_name, "Diagnosis received");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const HEALTHY_FENCED: &str = "```json\n{\"diseaseName\":\"Healthy\",\"description\":\"...\",\"possibleCauses\":[],\"suggestedTreatments\":[],\"confidenceScore\":0.9}\n```";

    fn envelope(text: &str) -> String {
        json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
        .to_string()
    }

    fn client_for(server: &mockito::Server, api_key: Option<&str>) -> GeminiClient {
        let config = AppConfig {
            api_key: api_key.map(str::to_string),
            model: "test-model".to_string(),
            base_url: server.url(),
            host: "127.0.0.1".to_string(),
            port: 0,
            max_upload_bytes: 1024,
        };
        GeminiClient::new(&config)
    }

    #[test]
    fn request_body_matches_wire_format() {
        let body = serde_json::to_value(DiagnosisRequest::new("image/png", "AQID")).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], SYSTEM_PROMPT);
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
    }

    #[test]
    fn fence_stripping_is_idempotent() {
        let once = strip_code_fences(HEALTHY_FENCED);
        assert_eq!(strip_code_fences(&once), once);
        assert!(once.starts_with('{') && once.ends_with('}'));
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn fenced_healthy_response_parses() {
        let result = parse_diagnosis(HEALTHY_FENCED).unwrap();
        assert_eq!(result.disease_name, "Healthy");
        assert_eq!(result.description.as_deref(), Some("..."));
        assert_eq!(result.possible_causes, Some(vec![]));
        assert_eq!(result.confidence_label().as_deref(), Some("90.0%"));
        assert_eq!(result.verdict(), Verdict::Healthy);
    }

    #[test]
    fn absent_fields_are_tolerated() {
        let result = parse_diagnosis(r#"{"diseaseName":"Leaf Rust"}"#).unwrap();
        assert_eq!(result.disease_name, "Leaf Rust");
        assert!(result.description.is_none());
        assert!(result.suggested_treatments.is_none());
        assert!(result.confidence_label().is_none());

        let result = parse_diagnosis("{}").unwrap();
        assert_eq!(result.disease_name, "Unknown");
    }

    #[test]
    fn quoted_confidence_is_accepted() {
        let result = parse_diagnosis(r#"{"diseaseName":"Blight","confidenceScore":"0.75"}"#).unwrap();
        assert_eq!(result.confidence_label().as_deref(), Some("75.0%"));
    }

    #[test]
    fn zero_confidence_has_no_label() {
        let result = parse_diagnosis(r#"{"diseaseName":"Blight","confidenceScore":0}"#).unwrap();
        assert!(result.confidence_label().is_none());
    }

    #[test]
    fn not_json_is_a_parse_error() {
        let err = parse_diagnosis("not json").unwrap_err();
        assert!(matches!(err, DiagnosisError::InvalidJson(_)));
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn verdict_is_three_way() {
        let named = |name: &str| DiagnosisResult {
            disease_name: name.to_string(),
            ..DiagnosisResult::failed("")
        };
        assert_eq!(named("Healthy").verdict(), Verdict::Healthy);
        assert_eq!(named("Unknown").verdict(), Verdict::Inconclusive);
        assert_eq!(named("Not a Leaf").verdict(), Verdict::Inconclusive);
        assert_eq!(named("Poor Quality").verdict(), Verdict::Inconclusive);
        assert_eq!(named("Powdery Mildew").verdict(), Verdict::Diseased);
        assert_eq!(DiagnosisResult::failed("boom").verdict(), Verdict::Diseased);
    }

    #[test]
    fn missing_candidates_is_structural() {
        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            extract_text(&empty),
            Err(DiagnosisError::InvalidResponseStructure)
        ));

        let no_text: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{}]}}]}"#).unwrap();
        assert!(matches!(
            extract_text(&no_text),
            Err(DiagnosisError::InvalidResponseStructure)
        ));
    }

    #[tokio::test]
    async fn analyze_success_sends_key_and_parses_card() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/test-model:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "secret".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#""mimeType":"image/jpeg""#.to_string()),
                Matcher::Regex(r#""data":"AQID""#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(envelope(HEALTHY_FENCED))
            .create_async()
            .await;

        let client = client_for(&server, Some("secret"));
        let result = client.analyze("AQID", "image/jpeg").await.unwrap();

        assert_eq!(result.disease_name, "Healthy");
        assert_eq!(result.confidence_label().as_deref(), Some("90.0%"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn analyze_http_500_reports_status() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/test-model:generateContent")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client_for(&server, Some("secret"))
            .analyze("AQID", "image/png")
            .await
            .unwrap_err();

        assert!(matches!(err, DiagnosisError::Status { code: 500, .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn analyze_without_candidates_is_structural() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/test-model:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create_async()
            .await;

        let err = client_for(&server, Some("secret"))
            .analyze("AQID", "image/png")
            .await
            .unwrap_err();

        assert!(matches!(err, DiagnosisError::InvalidResponseStructure));
    }

    #[tokio::test]
    async fn analyze_non_json_text_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/test-model:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(envelope("not json"))
            .create_async()
            .await;

        let err = client_for(&server, Some("secret"))
            .analyze("AQID", "image/png")
            .await
            .unwrap_err();

        assert!(matches!(err, DiagnosisError::InvalidJson(_)));
    }

    #[tokio::test]
    async fn missing_key_is_an_ordinary_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/models/test-model:generateContent")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let err = client_for(&server, None)
            .analyze("AQID", "image/png")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "API error: 403 Forbidden");
    }
}
