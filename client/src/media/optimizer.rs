//! Display URLs for images stored on the media host.
//!
//! Pure string work against Cloudinary's delivery URL convention:
//! `https://res.cloudinary.com/<cloud>/image/upload/<transforms>/<public id>`.
//! Unrecognised input is returned unchanged rather than rejected; a broken
//! image is better than a failed page.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use url::Url;

const DELIVERY_HOST: &str = "res.cloudinary.com";
const PROVIDER_DOMAIN: &str = "cloudinary.com";
/// Format and quality negotiation, applied to every derived URL.
const AUTO_FORMAT: &str = "f_auto,q_auto";

/// Transformation parameter keys recognised in delivery URLs.
const TRANSFORM_KEYS: &[&str] = &[
    "a", "ac", "af", "ar", "b", "bo", "br", "c", "co", "cs", "d", "dl", "dn", "dpr", "du",
    "e", "eo", "f", "fl", "fn", "fps", "g", "h", "ki", "l", "o", "p", "pg", "q", "r", "so",
    "sp", "t", "u", "vc", "vs", "w", "x", "y", "z",
];

/// Default thumbnail edge length in pixels.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 150;

/// Requested bounds. Both optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeHint {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl SizeHint {
    pub fn square(size: u32) -> Self {
        Self {
            width: Some(size),
            height: Some(size),
        }
    }
}

/// Preset responsive variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSize {
    Small,
    Medium,
    Large,
}

impl ImageSize {
    pub fn pixels(&self) -> u32 {
        match self {
            ImageSize::Small => 300,
            ImageSize::Medium => 600,
            ImageSize::Large => 1200,
        }
    }
}

impl std::str::FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(ImageSize::Small),
            "medium" => Ok(ImageSize::Medium),
            "large" => Ok(ImageSize::Large),
            other => Err(format!("unknown image size '{other}' (small, medium, large)")),
        }
    }
}

/// Derives delivery URLs for one cloud account.
#[derive(Debug, Clone)]
pub struct MediaUrlOptimizer {
    cloud_name: String,
}

impl MediaUrlOptimizer {
    pub fn new(cloud_name: impl Into<String>) -> Self {
        Self {
            cloud_name: cloud_name.into(),
        }
    }

    pub fn cloud_name(&self) -> &str {
        &self.cloud_name
    }

    /// Whether `url` points at the media provider.
    pub fn is_hosted_url(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(is_provider_host))
            .unwrap_or(false)
    }

    /// Recover the public id from a hosted URL.
    ///
    /// Strips everything up to and including `upload/`, transformation and
    /// version segments, and the file extension. Folder segments are kept.
    pub fn extract_identifier(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        if !parsed.host_str().map(is_provider_host).unwrap_or(false) {
            return None;
        }

        let segments: Vec<Cow<'_, str>> = parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy())
            .collect();
        let upload = segments.iter().position(|s| s == "upload")?;

        // Transformations come first, then an optional version; everything
        // after the version is the public id. The last segment is always the
        // file name, even if it looks like a transformation.
        let mut rest = &segments[upload + 1..];
        while rest.len() > 1 && is_transformation(&rest[0]) {
            rest = &rest[1..];
        }
        if rest.len() > 1 && is_version(&rest[0]) {
            rest = &rest[1..];
        }

        let (last, folders) = rest.split_last()?;
        let last: &str = last;
        let name = match last.rfind('.') {
            Some(dot) if dot > 0 => &last[..dot],
            _ => last,
        };
        if name.is_empty() {
            return None;
        }

        let mut identifier = folders
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<&str>>()
            .join("/");
        if !identifier.is_empty() {
            identifier.push('/');
        }
        identifier.push_str(name);
        Some(identifier)
    }

    /// Build a delivery URL for `identifier` within the given bounds.
    ///
    /// A hosted URL is re-derived from its public id; any other absolute URL
    /// and the empty string are returned as-is.
    pub fn build_url(&self, identifier: &str, size: SizeHint) -> String {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return identifier.to_string();
        }

        let public_id = if looks_absolute(identifier) {
            match self.extract_identifier(identifier) {
                Some(id) => id,
                None => return identifier.to_string(),
            }
        } else {
            identifier.to_string()
        };

        let mut transforms = String::from(AUTO_FORMAT);
        if size.width.is_some() || size.height.is_some() {
            transforms.push_str(",c_fill,g_auto");
            if let Some(w) = size.width {
                transforms.push_str(&format!(",w_{w}"));
            }
            if let Some(h) = size.height {
                transforms.push_str(&format!(",h_{h}"));
            }
        }

        format!(
            "https://{DELIVERY_HOST}/{}/image/upload/{transforms}/{public_id}",
            self.cloud_name
        )
    }

    /// Square thumbnail, `DEFAULT_THUMBNAIL_SIZE` when `size` is `None`.
    pub fn build_thumbnail(&self, identifier: &str, size: Option<u32>) -> String {
        self.build_url(
            identifier,
            SizeHint::square(size.unwrap_or(DEFAULT_THUMBNAIL_SIZE)),
        )
    }

    pub fn build_sized_variant(&self, identifier: &str, size: ImageSize) -> String {
        self.build_url(identifier, SizeHint::square(size.pixels()))
    }
}

fn is_provider_host(host: &str) -> bool {
    host == PROVIDER_DOMAIN || host.ends_with(&format!(".{PROVIDER_DOMAIN}"))
}

fn looks_absolute(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("//")
}

fn is_version(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].bytes().all(|b| b.is_ascii_digit())
}

/// `w_300`, `c_fill,g_auto`, `f_auto,q_auto` and the like. Every part must
/// use a known parameter key, so folders such as `my_receipts` are kept.
fn is_transformation(segment: &str) -> bool {
    segment.split(',').all(|part| match part.split_once('_') {
        Some((key, value)) => TRANSFORM_KEYS.contains(&key) && !value.is_empty(),
        None => false,
    })
}
