//! Multipart form parsing for the upload endpoints.
//!
//! Browsers submit an unchecked checkbox as nothing at all, so the page pairs
//! each checkbox with a hidden `false` input of the same name. The last value
//! of a field wins, which makes a checked box override the hidden default.

use axum::extract::Multipart;

use crate::domain::{FitConfig, ReadOptions};
use crate::error::AppError;

/// An uploaded file held in memory.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    /// Read and plot the data only.
    Preview,
    /// Read, plot and fit.
    Fit,
}

/// Parsed form state, echoed back into the page.
#[derive(Debug, Clone)]
pub struct FitForm {
    pub upload: Option<Upload>,
    /// Raw step-time text as typed.
    pub t0_text: String,
    pub fit_y0: bool,
    pub sheet: String,
    pub header: bool,
    pub action: FormAction,
}

impl Default for FitForm {
    fn default() -> Self {
        Self {
            upload: None,
            t0_text: "0.0".to_string(),
            fit_y0: true,
            sheet: String::new(),
            header: true,
            action: FormAction::Fit,
        }
    }
}

impl FitForm {
    /// Consume every field of a multipart body.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FitForm::default();

        while let Some(field) = multipart.next_field().await.map_err(form_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().unwrap_or("upload.xlsx").to_string();
                    let bytes = field.bytes().await.map_err(form_error)?;
                    // An empty file input still submits a part with no content.
                    if !bytes.is_empty() {
                        form.upload = Some(Upload {
                            name: file_name,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                "t0" => form.t0_text = field.text().await.map_err(form_error)?.trim().to_string(),
                "sheet" => form.sheet = field.text().await.map_err(form_error)?,
                "fit_y0" => {
                    let text = field.text().await.map_err(form_error)?;
                    form.fit_y0 = parse_flag(&text).ok_or_else(|| bad_flag("fit_y0", &text))?;
                }
                "header" => {
                    let text = field.text().await.map_err(form_error)?;
                    form.header = parse_flag(&text).ok_or_else(|| bad_flag("header", &text))?;
                }
                "action" => {
                    let text = field.text().await.map_err(form_error)?;
                    form.action = match text.trim() {
                        "preview" => FormAction::Preview,
                        _ => FormAction::Fit,
                    };
                }
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions::from_sheet_field(&self.sheet, self.header)
    }

    /// Step time; a blank field means `0`.
    pub fn t0(&self) -> Result<f64, AppError> {
        let text = self.t0_text.trim();
        if text.is_empty() {
            return Ok(0.0);
        }
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(AppError::new(2, format!("Invalid step time t₀: '{text}'."))),
        }
    }

    pub fn fit_config(&self) -> Result<FitConfig, AppError> {
        Ok(FitConfig {
            t0: self.t0()?,
            fit_y0: self.fit_y0,
            ..FitConfig::default()
        })
    }
}

/// Parse a checkbox/boolean form value.
pub fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Some(true),
        "false" | "off" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn bad_flag(name: &str, text: &str) -> AppError {
    AppError::new(2, format!("Invalid value for {name}: '{}'.", text.trim()))
}

fn form_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::new(2, format!("Invalid form data: {e}"))
}
