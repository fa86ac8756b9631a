//! `multipart/form-data` decoding for the proxied upload endpoint

use bytes::Bytes;

/// The `file` part of an upload form
#[derive(Debug, Clone)]
pub struct FilePart {
    pub filename: String,
    /// Empty when the client sent no part content type
    pub content_type: String,
    pub data: Bytes,
}

/// Fields the upload endpoint reads; other parts are ignored
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<FilePart>,
    pub logical_type: Option<String>,
}

/// Boundary of a `multipart/form-data` content type
pub fn boundary(content_type: Option<&str>) -> Option<String> {
    content_type.and_then(|ct| multer::parse_boundary(ct).ok())
}

/// Decode an already-buffered form body
pub async fn parse_upload_form(body: Bytes, boundary: String) -> Result<UploadForm, multer::Error> {
    let stream = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") if form.file.is_none() => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .map(|mime| mime.essence_str().to_string())
                    .unwrap_or_default();
                let data = field.bytes().await?;
                form.file = Some(FilePart {
                    filename,
                    content_type,
                    data,
                });
            }
            Some("type") if form.logical_type.is_none() => {
                form.logical_type = Some(field.text().await?);
            }
            _ => {}
        }
    }

    Ok(form)
}
