//! Presentation adapters.

use base64::Engine as _;
use quadscan_core::{encode_jpeg, Raster, RasterError};
use serde_json::{json, Value};

use crate::response::ItemResponse;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Encode(#[from] RasterError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Turns a verb result into whatever a front end displays.
pub trait Presenter {
    type Output;

    fn render(&self, response: &ItemResponse) -> Result<Self::Output, RenderError>;
}

/// Renders responses as JSON, optionally with images embedded as
/// `data:image/jpeg;base64,...` URIs.
#[derive(Clone, Debug)]
pub struct JsonPresenter {
    pub jpeg_quality: u8,
    pub include_images: bool,
    pub include_crops: bool,
}

impl Default for JsonPresenter {
    fn default() -> Self {
        Self {
            jpeg_quality: 85,
            include_images: true,
            include_crops: true,
        }
    }
}

impl JsonPresenter {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality,
            ..Self::default()
        }
    }

    pub fn metadata_only() -> Self {
        Self {
            include_images: false,
            include_crops: false,
            ..Self::default()
        }
    }

    pub fn data_uri(&self, raster: &Raster) -> Result<String, RenderError> {
        let bytes = encode_jpeg(raster, self.jpeg_quality)?;
        Ok(format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        ))
    }
}

impl Presenter for JsonPresenter {
    type Output = Value;

    fn render(&self, response: &ItemResponse) -> Result<Value, RenderError> {
        let mut out = serde_json::to_value(response)?;
        let Some(images) = response.images.as_ref() else {
            return Ok(out);
        };
        if let Value::Object(map) = &mut out {
            if self.include_images {
                map.insert("original_image".into(), json!(self.data_uri(&images.original)?));
                map.insert("final_image".into(), json!(self.data_uri(&images.annotated)?));
            }
            if self.include_crops {
                let crops = images
                    .crops
                    .iter()
                    .map(|c| self.data_uri(c))
                    .collect::<Result<Vec<_>, _>>()?;
                map.insert("crops".into(), json!(crops));
            }
        }
        Ok(out)
    }
}
