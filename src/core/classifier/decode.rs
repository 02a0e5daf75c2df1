//! Fast image decoding from in-memory payloads.
//!
//! Uses zune-jpeg for JPEG payloads (1.5-2x faster than image crate),
//! falls back to image crate for other formats.

use crate::error::ClassifyError;
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, Rgba};
use zune_core::colorspace::ColorSpace;
use zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

/// Fast image decoder that picks a decoder from the payload's magic bytes
pub struct FastDecoder;

impl FastDecoder {
    /// Decode encoded image bytes using the fastest available decoder.
    ///
    /// - JPEG: Uses zune-jpeg, retrying with the image crate on failure
    /// - Other formats: image crate
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ClassifyError> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Jpeg) => {
                Self::decode_jpeg(bytes).or_else(|_| Self::decode_fallback(bytes))
            }
            Ok(_) => Self::decode_fallback(bytes),
            Err(e) => Err(ClassifyError::Decode {
                reason: format!("Unrecognised image format: {}", e),
            }),
        }
    }

    /// Fast JPEG decoding using zune-jpeg
    fn decode_jpeg(bytes: &[u8]) -> Result<DynamicImage, ClassifyError> {
        let options = DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGB);
        let mut decoder = JpegDecoder::new_with_options(bytes, options);

        let pixels = decoder.decode().map_err(|e| ClassifyError::Decode {
            reason: format!("zune-jpeg decode failed: {:?}", e),
        })?;

        let info = decoder.info().ok_or_else(|| ClassifyError::Decode {
            reason: "Failed to get image info".to_string(),
        })?;

        let width = info.width as u32;
        let height = info.height as u32;

        let buffer_error = |kind: &str| ClassifyError::Decode {
            reason: format!("Failed to create {} buffer", kind),
        };

        // Convert based on the colorspace zune actually produced
        let image = match decoder.get_output_colorspace().unwrap_or(ColorSpace::RGB) {
            ColorSpace::RGB => {
                let buffer: ImageBuffer<Rgb<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| buffer_error("RGB"))?;
                DynamicImage::ImageRgb8(buffer)
            }
            ColorSpace::RGBA => {
                let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| buffer_error("RGBA"))?;
                DynamicImage::ImageRgba8(buffer)
            }
            ColorSpace::Luma => {
                let buffer: ImageBuffer<Luma<u8>, Vec<u8>> =
                    ImageBuffer::from_raw(width, height, pixels)
                        .ok_or_else(|| buffer_error("Luma"))?;
                DynamicImage::ImageLuma8(buffer)
            }
            _ => return Self::decode_fallback(bytes),
        };

        Ok(image)
    }

    /// Fallback to image crate for non-JPEG formats
    fn decode_fallback(bytes: &[u8]) -> Result<DynamicImage, ClassifyError> {
        image::load_from_memory(bytes).map_err(|e| ClassifyError::Decode {
            reason: e.to_string(),
        })
    }
}
