use std::path::Path;

use crate::prelude::*;

/// Every PDF file starts with this header.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// A document is accepted only with a `.pdf` extension and the PDF header.
pub fn is_pdf(path: &Path, bytes: &[u8]) -> bool {
    let has_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    has_extension && bytes.starts_with(PDF_SIGNATURE)
}

/// Read a PDF from disk, rejecting anything that is not one.
pub fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path).wrap_err_with(|| f!("Failed to read {}", path.display()))?;

    if !is_pdf(path, &bytes) {
        return Err(Error::NotPdf(path.display().to_string()).into());
    }

    log::debug!("read {} ({} bytes)", path.display(), bytes.len());
    Ok(bytes)
}
