use anyhow::Context;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::data_structures::texture::Texture;

/// Where the bytes of a glTF image live once the buffers are loaded.
pub enum ImageBytes<'a> {
    Resolved {
        bytes: std::borrow::Cow<'a, [u8]>,
        format: Option<String>,
    },
    /// An external file that still has to be fetched, relative to the asset.
    External { uri: String, format: Option<String> },
}

/// `image/png` -> `png`
fn format_from_mime(mime_type: &str) -> Option<String> {
    mime_type.split('/').next_back().map(str::to_string)
}

/// `textures/wood.jpg` -> `jpg`
fn format_from_uri(uri: &str) -> Option<String> {
    let (_, ext) = uri.rsplit_once('.')?;
    (!ext.contains('/')).then(|| ext.to_ascii_lowercase())
}

/// Decodes a `data:<mime>;base64,<payload>` URI.
pub fn decode_data_uri(uri: &str) -> anyhow::Result<Vec<u8>> {
    let (_, payload) = uri
        .split_once(',')
        .context("malformed data uri: missing payload separator")?;
    BASE64
        .decode(payload.as_bytes())
        .context("base64 decode of data uri")
}

pub fn locate_image<'a>(
    image: &gltf::Image,
    buf: &'a [Vec<u8>],
) -> anyhow::Result<ImageBytes<'a>> {
    match image.source() {
        gltf::image::Source::View { view, mime_type } => {
            let buffer = buf
                .get(view.buffer().index())
                .with_context(|| format!("image {} references a missing buffer", image.index()))?;
            let start = view.offset();
            let end = start + view.length();
            let bytes = buffer
                .get(start..end)
                .with_context(|| format!("image {} view is out of bounds", image.index()))?;
            Ok(ImageBytes::Resolved {
                bytes: std::borrow::Cow::Borrowed(bytes),
                format: format_from_mime(mime_type),
            })
        }
        gltf::image::Source::Uri { uri, mime_type } if uri.starts_with("data:") => {
            let format = mime_type
                .map(format_from_mime)
                .unwrap_or_else(|| {
                    uri.strip_prefix("data:")
                        .and_then(|rest| rest.split(';').next())
                        .and_then(format_from_mime)
                });
            Ok(ImageBytes::Resolved {
                bytes: std::borrow::Cow::Owned(decode_data_uri(uri)?),
                format,
            })
        }
        gltf::image::Source::Uri { uri, mime_type } => Ok(ImageBytes::External {
            uri: uri.to_string(),
            format: mime_type.and_then(format_from_mime).or_else(|| format_from_uri(uri)),
        }),
    }
}

pub fn decode(bytes: &[u8], label: &str, format: Option<&str>, is_normal_map: bool) -> anyhow::Result<Texture> {
    Texture::from_bytes(bytes, label, format, is_normal_map)
        .with_context(|| format!("failed to decode texture {label}"))
}
