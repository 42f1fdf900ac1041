//! ffmpeg invocation and ingest target handling.

use std::path::Path;
use url::Url;

use crate::config::EncoderConfig;
use crate::{Error, Result};

const MASK: &str = "****";

/// Path fragments shorter than this are not scrubbed from output. The key
/// and the full URL are always scrubbed.
const MIN_FRAGMENT_LEN: usize = 4;

/// Where the encoder pushes media.
///
/// Holds the full URL for the process command line only. Everything that
/// leaves the supervisor goes through [`IngestTarget::redacted`] or a
/// [`Redactor`].
#[derive(Clone)]
pub struct IngestTarget {
    url: String,
    secrets: Vec<String>,
    redacted: String,
}

impl IngestTarget {
    /// `key_or_url` is either a full `rtmp://`/`rtmps://` URL or a stream
    /// key appended to `ingest_base`.
    pub fn resolve(key_or_url: &str, ingest_base: &str) -> Result<Self> {
        let value = key_or_url.trim();
        if value.is_empty() {
            return Err(Error::config("stream key or ingest URL is empty"));
        }

        if is_push_url(value) {
            let parsed = Url::parse(value)
                .map_err(|e| Error::config(format!("invalid ingest URL: {e}")))?;
            let host = parsed.host_str().unwrap_or_default();
            let redacted = match parsed.port() {
                Some(port) => format!("{}://{host}:{port}/{MASK}", parsed.scheme()),
                None => format!("{}://{host}/{MASK}", parsed.scheme()),
            };
            let mut secrets = vec![value.to_string()];
            let mut fragments = Vec::new();
            let path = parsed.path().trim_matches('/');
            // The last path segment is the key; `app/key` is masked as well.
            if let Some(key) = path.rsplit('/').next().filter(|k| !k.is_empty()) {
                secrets.push(key.to_string());
                if key.len() < path.len() {
                    fragments.push(path.to_string());
                }
            }
            return Ok(Self::new(value.to_string(), secrets, fragments, redacted));
        }

        if value.contains("://") {
            return Err(Error::config(
                "ingest URL must use the rtmp:// or rtmps:// scheme",
            ));
        }

        let base = ingest_base.trim_end_matches('/');
        let url = format!("{base}/{value}");
        Ok(Self::new(
            url.clone(),
            vec![url, value.to_string()],
            Vec::new(),
            format!("{base}/{MASK}"),
        ))
    }

    fn new(
        url: String,
        mut secrets: Vec<String>,
        fragments: Vec<String>,
        redacted: String,
    ) -> Self {
        secrets.extend(
            fragments
                .into_iter()
                .filter(|f| f.len() >= MIN_FRAGMENT_LEN),
        );
        // Longest first so a URL is masked whole before its key.
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        secrets.dedup();
        Self {
            url,
            secrets,
            redacted,
        }
    }

    /// Full push URL. Only for the process argument list.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Display form with the key masked, e.g. `rtmp://a.rtmp.youtube.com/live2/****`.
    pub fn redacted(&self) -> &str {
        &self.redacted
    }

    pub fn redactor(&self) -> Redactor {
        Redactor {
            secrets: self.secrets.clone(),
        }
    }
}

impl std::fmt::Debug for IngestTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("IngestTarget").field(&self.redacted).finish()
    }
}

fn is_push_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("rtmp://") || lower.starts_with("rtmps://")
}

/// Masks ingest secrets in encoder output lines.
#[derive(Debug, Clone)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    pub fn scrub(&self, line: &str) -> String {
        let mut out = line.to_string();
        for secret in &self.secrets {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), MASK);
            }
        }
        out
    }
}

/// ffmpeg arguments for a looping live push of `video` to `target_url`.
pub fn build_args(
    config: &EncoderConfig,
    video: &Path,
    target_url: &str,
    vertical: bool,
) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        // Read input at its native rate.
        "-re".to_string(),
        "-stream_loop".to_string(),
        "-1".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        config.preset.clone(),
        "-b:v".to_string(),
        config.video_bitrate.clone(),
        "-maxrate".to_string(),
        config.max_rate.clone(),
        "-bufsize".to_string(),
        config.buffer_size.clone(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-r".to_string(),
        config.frame_rate.to_string(),
        "-g".to_string(),
        config.keyframe_interval.to_string(),
        "-keyint_min".to_string(),
        config.keyframe_interval.to_string(),
        "-sc_threshold".to_string(),
        "0".to_string(),
    ];

    if vertical {
        args.push("-vf".to_string());
        args.push(format!(
            "crop=ih*9/16:ih,scale={}:{}",
            config.vertical_width, config.vertical_height
        ));
    }

    args.extend([
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        config.audio_bitrate.clone(),
        "-ar".to_string(),
        config.audio_sample_rate.to_string(),
        "-ac".to_string(),
        "2".to_string(),
        "-f".to_string(),
        "flv".to_string(),
        target_url.to_string(),
    ]);

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_INGEST_BASE;
    use rstest::rstest;
    use std::path::PathBuf;

    #[test]
    fn stream_key_is_appended_to_base() {
        let target = IngestTarget::resolve("abcd-1234", DEFAULT_INGEST_BASE).unwrap();
        assert_eq!(target.url(), "rtmp://a.rtmp.youtube.com/live2/abcd-1234");
        assert_eq!(target.redacted(), "rtmp://a.rtmp.youtube.com/live2/****");
        assert!(!format!("{target:?}").contains("abcd-1234"));
    }

    #[rstest]
    #[case("rtmp://ingest/abcd-1234", "rtmp://ingest/****")]
    #[case("rtmps://live.example.com:443/app/sk_9f8e7d", "rtmps://live.example.com:443/****")]
    fn push_urls_are_used_verbatim(#[case] input: &str, #[case] redacted: &str) {
        let target = IngestTarget::resolve(input, DEFAULT_INGEST_BASE).unwrap();
        assert_eq!(target.url(), input);
        assert_eq!(target.redacted(), redacted);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("http://example.com/live")]
    fn rejects_unusable_targets(#[case] input: &str) {
        assert!(matches!(
            IngestTarget::resolve(input, DEFAULT_INGEST_BASE),
            Err(Error::ConfigInvalid(_))
        ));
    }

    #[test]
    fn redactor_masks_url_and_key() {
        let target = IngestTarget::resolve("rtmp://ingest/abcd-1234", DEFAULT_INGEST_BASE).unwrap();
        let redactor = target.redactor();
        assert_eq!(
            redactor.scrub("Output #0, flv, to 'rtmp://ingest/abcd-1234':"),
            "Output #0, flv, to '****':"
        );
        assert_eq!(redactor.scrub("key abcd-1234 rejected"), "key **** rejected");
        assert_eq!(redactor.scrub("frame=1"), "frame=1");
    }

    #[rstest]
    #[case("k3y", "publishing with key k3y", "publishing with key ****")]
    #[case("rtmp://ingest/k3y", "key k3y rejected", "key **** rejected")]
    #[case("rtmp://ingest/app/k3y", "to rtmp://ingest/app/k3y", "to ****")]
    fn short_keys_are_still_masked(#[case] input: &str, #[case] line: &str, #[case] scrubbed: &str) {
        let target = IngestTarget::resolve(input, DEFAULT_INGEST_BASE).unwrap();
        assert_eq!(target.redactor().scrub(line), scrubbed);
    }

    #[rstest]
    #[case(false, None)]
    #[case(true, Some("crop=ih*9/16:ih,scale=720:1280"))]
    fn args_loop_input_and_target_flv(#[case] vertical: bool, #[case] filter: Option<&str>) {
        let config = EncoderConfig::default();
        let video = PathBuf::from("/videos/clip.mp4");
        let args = build_args(&config, &video, "rtmp://ingest/key", vertical);

        let pos = |flag: &str| args.iter().position(|a| a == flag);
        let value = |flag: &str| pos(flag).map(|i| args[i + 1].as_str());

        assert_eq!(value("-stream_loop"), Some("-1"));
        assert_eq!(value("-i"), Some("/videos/clip.mp4"));
        assert_eq!(value("-b:v"), Some("2500k"));
        assert_eq!(value("-g"), Some("60"));
        assert_eq!(value("-f"), Some("flv"));
        assert_eq!(value("-vf"), filter);
        assert_eq!(args.last().map(String::as_str), Some("rtmp://ingest/key"));
        // Input options precede the input.
        assert!(pos("-re") < pos("-i"));
    }
}
