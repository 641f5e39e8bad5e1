/// Sniffs the MIME type of raw media bytes. HEIC containers are picked out
/// before falling back to `infer`, which misses some `ftyp` brands.
pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_png_magic_bytes() {
        let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&[0u8; 16]);
        assert_eq!(detect_mime_type(&data).as_deref(), Some("image/png"));
    }

    #[test]
    fn returns_none_for_unrecognized_bytes() {
        assert_eq!(detect_mime_type(b"definitely not an image"), None);
    }
}
