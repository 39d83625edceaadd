use url::Url;

use super::VideoInfo;

/// Whether `url` points straight at an mp4 resource, either by path suffix
/// or by an `.mp4` marker ahead of the query string.
pub fn is_direct_mp4(url: &str) -> bool {
    let lower = url.to_lowercase();
    if lower.contains(".mp4?") {
        return true;
    }

    match Url::parse(&lower) {
        Ok(parsed) => parsed.path().ends_with(".mp4"),
        Err(_) => lower.ends_with(".mp4"),
    }
}

/// Last path segment of the URL, percent-decoded
pub fn title_from_url(url: &str) -> String {
    let basename = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string(),
        Err(_) => url.rsplit('/').next().unwrap_or(url).to_string(),
    };

    urlencoding::decode(&basename)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(basename)
}

/// Minimal metadata for a raw media link
pub fn synthesize_info(url: &str) -> VideoInfo {
    VideoInfo {
        title: Some(title_from_url(url)),
        description: Some(String::new()),
        channel: Some(String::new()),
        webpage_url: Some(url.to_string()),
        original_url: Some(url.to_string()),
        ..Default::default()
    }
}
