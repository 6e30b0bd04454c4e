//! Request extraction for the inference endpoints.
//!
//! `/predict` and `/forecast` accept either a JSON object
//! (`{model, transform?, horizon?, data?}`) or a multipart form with the same
//! text fields plus an uploaded `file`.

use crate::application::parser::InputSource;
use crate::application::pipeline::DEFAULT_HORIZON;
use crate::domain::errors::PipelineError;
use crate::interfaces::http::error::ApiError;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Default, PartialEq)]
pub struct InferenceForm {
    pub model: Option<String>,
    pub transform: Option<String>,
    pub horizon: Option<Value>,
    pub source: Option<InputSource>,
}

impl<S: Send + Sync> FromRequest<S> for InferenceForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if multipart {
            let form = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::Rejected {
                    status: e.status(),
                    message: e.body_text(),
                })?;
            Self::from_multipart(form).await
        } else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| ApiError::Rejected {
                    status: e.status(),
                    message: e.body_text(),
                })?;
            Self::from_json(&body)
        }
    }
}

impl InferenceForm {
    pub fn from_json(body: &[u8]) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))?;
        let Value::Object(mut fields) = value else {
            return Err(ApiError::BadRequest(
                "Request body must be a JSON object".to_string(),
            ));
        };

        Ok(Self {
            model: text(fields.remove("model")),
            transform: text(fields.remove("transform")),
            horizon: fields.remove("horizon"),
            source: fields
                .remove("data")
                .filter(|v| !v.is_null())
                .map(InputSource::Inline),
        })
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::Rejected {
            status: e.status(),
            message: e.body_text(),
        })? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                if field.file_name().is_none() {
                    return Err(ApiError::BadRequest("Invalid file upload".to_string()));
                }
                let bytes = field.bytes().await.map_err(|e| ApiError::Rejected {
                    status: e.status(),
                    message: e.body_text(),
                })?;
                debug!("Received upload of {} bytes", bytes.len());
                form.source = Some(InputSource::Upload(bytes.to_vec()));
                continue;
            }

            let value = field.text().await.map_err(|e| ApiError::Rejected {
                status: e.status(),
                message: e.body_text(),
            })?;
            match name.as_str() {
                "model" => form.model = text(Some(Value::String(value))),
                "transform" => form.transform = text(Some(Value::String(value))),
                "horizon" => form.horizon = Some(Value::String(value)),
                other => debug!("Ignoring form field '{}'", other),
            }
        }
        Ok(form)
    }

    /// Requested horizon; absent, null or blank means the default.
    pub fn horizon(&self, max: usize) -> Result<usize, PipelineError> {
        parse_horizon(self.horizon.as_ref(), max)
    }
}

fn text(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

pub fn parse_horizon(raw: Option<&Value>, max: usize) -> Result<usize, PipelineError> {
    let invalid = |reason: &str| PipelineError::InvalidHorizon {
        reason: reason.to_string(),
    };

    let horizon = match raw {
        None | Some(Value::Null) => return Ok(DEFAULT_HORIZON),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(DEFAULT_HORIZON),
        Some(value) => integer(value).ok_or_else(|| invalid("Horizon must be an integer"))?,
    };

    if horizon < 0 {
        return Err(invalid("Horizon must not be negative"));
    }
    let horizon = usize::try_from(horizon).map_err(|_| invalid("Horizon is too large"))?;
    if horizon > max {
        return Err(invalid(&format!("Horizon must not exceed {}", max)));
    }
    Ok(horizon)
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_form_fields() {
        let form = InferenceForm::from_json(
            br#"{"model": "lstm", "transform": "", "horizon": 5, "data": [1, 2, 3]}"#,
        )
        .unwrap();

        assert_eq!(form.model.as_deref(), Some("lstm"));
        assert_eq!(form.transform, None);
        assert_eq!(form.horizon(1000).unwrap(), 5);
        assert_eq!(form.source, Some(InputSource::Inline(json!([1, 2, 3]))));
    }

    #[test]
    fn test_json_form_without_data() {
        let form = InferenceForm::from_json(br#"{"model": "lstm", "data": null}"#).unwrap();
        assert_eq!(form.source, None);
    }

    #[test]
    fn test_json_body_must_be_an_object() {
        assert!(matches!(
            InferenceForm::from_json(b"[1, 2]"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            InferenceForm::from_json(b"{not json"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_horizon_defaults() {
        assert_eq!(parse_horizon(None, 1000).unwrap(), DEFAULT_HORIZON);
        assert_eq!(parse_horizon(Some(&Value::Null), 1000).unwrap(), DEFAULT_HORIZON);
        assert_eq!(parse_horizon(Some(&json!("  ")), 1000).unwrap(), DEFAULT_HORIZON);
    }

    #[test]
    fn test_horizon_accepts_integers_and_integer_strings() {
        assert_eq!(parse_horizon(Some(&json!(0)), 1000).unwrap(), 0);
        assert_eq!(parse_horizon(Some(&json!("12")), 1000).unwrap(), 12);
        assert_eq!(parse_horizon(Some(&json!(7.0)), 1000).unwrap(), 7);
        assert_eq!(parse_horizon(Some(&json!(1000)), 1000).unwrap(), 1000);
    }

    #[test]
    fn test_horizon_rejections() {
        for raw in [
            json!(2.5),
            json!("2.5"),
            json!("ten"),
            json!(true),
            json!([3]),
            json!(-1),
            json!("-4"),
            json!(1001),
        ] {
            let err = parse_horizon(Some(&raw), 1000).unwrap_err();
            assert!(
                matches!(err, PipelineError::InvalidHorizon { .. }),
                "{:?} was accepted",
                raw
            );
        }
    }
}
