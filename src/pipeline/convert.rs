//! Format conversion: decode, resize, re-encode

use super::PipelineError;
use crate::file::SelectedFile;
use crate::rules::predicates::parse_int;
use crate::rules::Declaration;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

/// Output format of a conversion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversionTarget {
    WebP,
    Png,
    Jpeg,
}

impl ConversionTarget {
    /// Conversion rules in declaration order
    pub const ALL: [ConversionTarget; 3] = [
        ConversionTarget::WebP,
        ConversionTarget::Png,
        ConversionTarget::Jpeg,
    ];

    /// Attribute name without prefix
    pub fn rule_id(self) -> &'static str {
        match self {
            ConversionTarget::WebP => "image-to-webp",
            ConversionTarget::Png => "image-to-png",
            ConversionTarget::Jpeg => "image-to-jpg",
        }
    }

    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            ConversionTarget::WebP => "webp",
            ConversionTarget::Png => "png",
            ConversionTarget::Jpeg => "jpg",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            ConversionTarget::WebP => "image/webp",
            ConversionTarget::Png => "image/png",
            ConversionTarget::Jpeg => "image/jpeg",
        }
    }

    /// Whether a file name already carries this target's extension
    pub fn matches_name(self, name: &str) -> bool {
        name.strip_suffix(self.extension())
            .is_some_and(|rest| rest.ends_with('.'))
    }
}

/// Output raster size declarations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizingHints {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub min_width: Option<u32>,
    pub max_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_height: Option<u32>,
}

impl SizingHints {
    pub fn from_declaration(declaration: &Declaration<'_>) -> Self {
        let read = |rule: &str| {
            declaration
                .get(rule)
                .and_then(parse_int)
                .and_then(|value| u32::try_from(value).ok())
        };

        Self {
            width: read("image-to-width"),
            height: read("image-to-height"),
            min_width: read("image-to-min-width"),
            max_width: read("image-to-max-width"),
            min_height: read("image-to-min-height"),
            max_height: read("image-to-max-height"),
        }
    }

    /// Output size: natural size, overridden by explicit width/height, then clamped
    pub fn target_size(&self, natural_width: u32, natural_height: u32) -> (u32, u32) {
        let mut width = self.width.unwrap_or(natural_width);
        let mut height = self.height.unwrap_or(natural_height);

        if let Some(min) = self.min_width {
            width = width.max(min);
        }
        if let Some(max) = self.max_width {
            width = width.min(max);
        }
        if let Some(min) = self.min_height {
            height = height.max(min);
        }
        if let Some(max) = self.max_height {
            height = height.min(max);
        }

        (width, height)
    }
}

/// Re-encode an image file, returning the replacement file
///
/// The replacement is named `<stem>.<ext>` and declares the target media type.
pub fn convert(
    file: &SelectedFile,
    target: ConversionTarget,
    sizing: &SizingHints,
    jpeg_quality: u8,
) -> Result<SelectedFile, PipelineError> {
    let image = image::load_from_memory(file.bytes())?;
    let (natural_width, natural_height) = image.dimensions();
    let (width, height) = sizing.target_size(natural_width, natural_height);

    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyRaster { width, height });
    }

    let image = if (width, height) == (natural_width, natural_height) {
        image
    } else {
        image.resize_exact(width, height, FilterType::Lanczos3)
    };

    let bytes = encode(&image, target, jpeg_quality)?;
    let name = format!("{}.{}", file.stem(), target.extension());

    Ok(SelectedFile::new(name, target.media_type(), bytes))
}

fn encode(
    image: &DynamicImage,
    target: ConversionTarget,
    jpeg_quality: u8,
) -> Result<Vec<u8>, PipelineError> {
    let mut out = Cursor::new(Vec::new());

    match target {
        ConversionTarget::Png => image.write_to(&mut out, ImageFormat::Png)?,
        // lossless; the WebP encoder only takes 8-bit RGB(A)
        ConversionTarget::WebP => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_to(&mut out, ImageFormat::WebP)?
        }
        ConversionTarget::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut out, jpeg_quality);
            image.to_rgb8().write_with_encoder(encoder)?;
        }
    }

    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FormDocument;
    use image::{Rgba, RgbaImage};

    fn png_file(name: &str, width: u32, height: u32) -> SelectedFile {
        let mut out = Cursor::new(Vec::new());
        RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        SelectedFile::new(name, "image/png", out.into_inner())
    }

    #[test]
    fn test_target_metadata() {
        assert_eq!(ConversionTarget::WebP.rule_id(), "image-to-webp");
        assert_eq!(ConversionTarget::Jpeg.extension(), "jpg");
        assert_eq!(ConversionTarget::Jpeg.media_type(), "image/jpeg");
        assert!(ConversionTarget::Png.matches_name("a.png"));
        assert!(!ConversionTarget::Png.matches_name("apng"));
        assert!(!ConversionTarget::WebP.matches_name("a.png"));
    }

    #[test]
    fn test_target_size_overrides_then_clamps() {
        let hints = SizingHints {
            width: Some(50),
            min_width: Some(80),
            max_height: Some(30),
            ..Default::default()
        };
        assert_eq!(hints.target_size(200, 100), (80, 30));
        assert_eq!(SizingHints::default().target_size(200, 100), (200, 100));
    }

    #[test]
    fn test_sizing_from_declaration() {
        let doc = FormDocument::parse_str(
            r#"<input type="file" fv-image-to-width="64" fv-image-to-max-height="32" fv-image-to-height="-1">"#,
        );
        let id = doc.select_first("input").unwrap();
        let hints = SizingHints::from_declaration(&Declaration::new(doc.get(id).unwrap(), "fv-"));

        assert_eq!(hints.width, Some(64));
        assert_eq!(hints.height, None);
        assert_eq!(hints.max_height, Some(32));
    }

    #[test]
    fn test_convert_to_each_target() {
        let source = png_file("photo.final.png", 8, 6);

        for target in ConversionTarget::ALL {
            let converted = convert(&source, target, &SizingHints::default(), 90).unwrap();
            assert_eq!(
                converted.name(),
                format!("photo.final.{}", target.extension())
            );
            assert_eq!(converted.media_type(), target.media_type());
            assert_eq!(crate::pipeline::inspect::dimensions(converted.bytes()).unwrap(), (8, 6));
        }
    }

    #[test]
    fn test_webp_output_is_lossless() {
        let mut source = RgbaImage::new(3, 2);
        for (x, y, pixel) in source.enumerate_pixels_mut() {
            *pixel = Rgba([x as u8 * 80, y as u8 * 120, 7, 255]);
        }
        let mut out = Cursor::new(Vec::new());
        source.write_to(&mut out, ImageFormat::Png).unwrap();
        let file = SelectedFile::new("grid.png", "image/png", out.into_inner());

        let converted =
            convert(&file, ConversionTarget::WebP, &SizingHints::default(), 10).unwrap();
        let decoded = image::load_from_memory(converted.bytes()).unwrap().to_rgba8();

        assert_eq!(decoded, source);
    }

    #[test]
    fn test_convert_resizes() {
        let source = png_file("a.png", 40, 20);
        let hints = SizingHints {
            width: Some(10),
            height: Some(10),
            ..Default::default()
        };

        let converted = convert(&source, ConversionTarget::WebP, &hints, 90).unwrap();
        let decoded = image::load_from_memory(converted.bytes()).unwrap();
        assert_eq!(decoded.dimensions(), (10, 10));
    }

    #[test]
    fn test_zero_sized_raster_rejected() {
        let source = png_file("a.png", 4, 4);
        let hints = SizingHints {
            width: Some(0),
            ..Default::default()
        };

        assert!(matches!(
            convert(&source, ConversionTarget::Png, &hints, 90),
            Err(PipelineError::EmptyRaster { width: 0, .. })
        ));
    }

    #[test]
    fn test_undecodable_source() {
        let source = SelectedFile::new("a.png", "image/png", b"nope".to_vec());
        assert!(matches!(
            convert(&source, ConversionTarget::Jpeg, &SizingHints::default(), 90),
            Err(PipelineError::Image(_))
        ));
    }
}
