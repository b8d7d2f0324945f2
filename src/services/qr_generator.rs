use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageBuffer, Luma};
use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use url::Url;

use crate::models::AccountId;

#[derive(thiserror::Error, Debug)]
pub enum QrGenerationError {
    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),

    #[error("Invalid verification base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    #[error("Verification base URL cannot take a path: {0}")]
    CannotBeABase(String),

    #[error("PNG encoding failed: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Builds the URL a verifier opens when scanning an account's QR code.
///
/// The base is used as a prefix, so `https://verisite.io/verify/` and
/// `https://verisite.io/verify` both yield `https://verisite.io/verify/<account>`.
pub fn verification_url(base_url: &str, account: &AccountId) -> Result<Url, QrGenerationError> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|_| QrGenerationError::CannotBeABase(base_url.to_string()))?
        .pop_if_empty()
        .push(account.as_str());
    Ok(url)
}

fn encode(base_url: &str, account: &AccountId) -> Result<QrCode, QrGenerationError> {
    let url = verification_url(base_url, account)?;
    tracing::debug!(url = %url, "Encoding verification URL");
    Ok(QrCode::new(url.as_str().as_bytes())?)
}

/// Generates a QR code SVG for an account's verification URL
#[tracing::instrument(skip(base_url, account), fields(account = %account))]
pub fn generate_qr_svg(base_url: &str, account: &AccountId) -> Result<String, QrGenerationError> {
    let code = encode(base_url, account)?;
    let svg = code.render::<svg::Color>().min_dimensions(200, 200).build();
    Ok(svg)
}

/// Generates a QR code PNG; `module_size` is the pixel width of one module.
#[tracing::instrument(skip(base_url, account), fields(account = %account))]
pub fn generate_qr_png(
    base_url: &str,
    account: &AccountId,
    module_size: u32,
) -> Result<Vec<u8>, QrGenerationError> {
    let code = encode(base_url, account)?;

    let module_size = module_size.max(1);
    let width = code.width() as u32;
    let img_size = width * module_size;

    let mut img = ImageBuffer::<Luma<u8>, Vec<u8>>::new(img_size, img_size);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let module_x = (x / module_size) as usize;
        let module_y = (y / module_size) as usize;
        *pixel = match code[(module_x, module_y)] {
            qrcode::types::Color::Dark => Luma([0u8]),
            qrcode::types::Color::Light => Luma([255u8]),
        };
    }

    let mut png_data = Vec::new();
    image::DynamicImage::ImageLuma8(img).write_to(
        &mut std::io::Cursor::new(&mut png_data),
        image::ImageFormat::Png,
    )?;

    Ok(png_data)
}

/// PNG QR code as a `data:` URI for inline `<img>` tags.
pub fn generate_qr_data_uri(
    base_url: &str,
    account: &AccountId,
) -> Result<String, QrGenerationError> {
    let png = generate_qr_png(base_url, account, 8)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Terminal rendering using half-height block characters.
pub fn generate_qr_unicode(
    base_url: &str,
    account: &AccountId,
) -> Result<String, QrGenerationError> {
    let code = encode(base_url, account)?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}
