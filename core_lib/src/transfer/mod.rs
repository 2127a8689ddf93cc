//! Outbound file streaming, ZIP packaging and inbound uploads.

pub mod archive;
pub mod response;
pub mod upload;

pub use archive::{archive_body, archive_name, write_archive};
pub use response::{file_response, parse_range};
pub use upload::{save_field, upload_destination, upload_file_name, UPLOAD_FIELD};

/// Download targets from a raw query string. A non-empty `path` wins;
/// otherwise every `paths` (or `paths[]`) value is used, in order.
pub fn download_paths(query: Option<&str>) -> Vec<String> {
    let Some(query) = query else {
        return Vec::new();
    };

    let mut single = None;
    let mut many = Vec::new();
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let Some(value) = form_decode(value).filter(|value| !value.is_empty()) else {
            continue;
        };
        match key {
            "path" if single.is_none() => single = Some(value),
            "paths" | "paths[]" | "paths%5B%5D" => many.push(value),
            _ => {}
        }
    }

    match single {
        Some(path) => vec![path],
        None => many,
    }
}

fn form_decode(value: &str) -> Option<String> {
    urlencoding::decode(&value.replace('+', " "))
        .ok()
        .map(|decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_paths() {
        assert!(download_paths(None).is_empty());
        assert_eq!(download_paths(Some("path=%2Fdata%2Fa.txt")), vec!["/data/a.txt"]);
        assert_eq!(
            download_paths(Some("paths=%2Fdata%2Fa&paths=%2Fdata%2Fmy+file&auth=x")),
            vec!["/data/a", "/data/my file"]
        );
        assert_eq!(
            download_paths(Some("paths%5B%5D=%2Fx&paths%5B%5D=%2Fy")),
            vec!["/x", "/y"]
        );
        assert!(download_paths(Some("path=")).is_empty());
        assert_eq!(
            download_paths(Some("paths=%2Fa&path=%2Fsingle")),
            vec!["/single"]
        );
    }
}
