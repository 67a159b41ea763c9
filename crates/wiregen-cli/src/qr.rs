use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};

/// Byte capacity of the largest QR symbol. Longer configs are not encoded.
pub const MAX_QR_BYTES: usize = 2953;

/// Terminal rendering of a peer config as a QR code, for scanning into a
/// phone client. `None` when the config is too long to fit in any symbol.
pub fn render(config: &str) -> Result<Option<String>, QrError> {
    if config.len() > MAX_QR_BYTES {
        return Ok(None);
    }

    let code = QrCode::with_error_correction_level(config.as_bytes(), EcLevel::M)?;
    let image = code
        .render::<char>()
        .quiet_zone(true)
        .module_dimensions(2, 1)
        .build();
    Ok(Some(image))
}
