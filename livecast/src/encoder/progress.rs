//! ffmpeg status line parsing.
//!
//! Status format: `frame=X fps=X q=X size=XkB time=HH:MM:SS.ms bitrate=Xkbits/s speed=Xx`

use serde::Serialize;

/// Latest encoder status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EncoderProgress {
    pub frame: u64,
    pub fps: f64,
    /// Output media time pushed so far, in seconds.
    pub media_time_secs: f64,
    pub bitrate_kbps: Option<f64>,
    /// Encoding speed relative to realtime; ~1.0 when `-re` keeps pace.
    pub speed: Option<f64>,
}

/// Value that follows `key=` up to the next whitespace, skipping padding.
fn field<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// `HH:MM:SS.ms` to seconds.
pub fn parse_time(value: &str) -> Option<f64> {
    let mut parts = value.split(':');
    let (h, m, s) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let hours: f64 = h.parse().ok()?;
    let minutes: f64 = m.parse().ok()?;
    let seconds: f64 = s.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Parse a status line; `None` for any other output.
pub fn parse_progress(line: &str) -> Option<EncoderProgress> {
    if !line.contains("frame=") || !line.contains("time=") {
        return None;
    }

    Some(EncoderProgress {
        frame: field(line, "frame=")?.parse().ok()?,
        fps: field(line, "fps=")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0),
        media_time_secs: field(line, "time=").and_then(parse_time).unwrap_or(0.0),
        bitrate_kbps: field(line, "bitrate=")
            .and_then(|v| v.strip_suffix("kbits/s"))
            .and_then(|v| v.parse().ok()),
        speed: field(line, "speed=")
            .and_then(|v| v.strip_suffix('x'))
            .and_then(|v| v.parse().ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_status_line() {
        let p = parse_progress(
            "frame=  912 fps= 30 q=23.0 size=   9216kB time=00:00:30.40 bitrate=2483.5kbits/s speed=1.01x",
        )
        .unwrap();
        assert_eq!(p.frame, 912);
        assert_eq!(p.fps, 30.0);
        assert_eq!(p.media_time_secs, 30.4);
        assert_eq!(p.bitrate_kbps, Some(2483.5));
        assert_eq!(p.speed, Some(1.01));
    }

    #[test]
    fn tolerates_na_fields() {
        let p = parse_progress("frame=    0 fps=0.0 q=0.0 size=0kB time=N/A bitrate=N/A speed=N/A")
            .unwrap();
        assert_eq!(p.frame, 0);
        assert_eq!(p.media_time_secs, 0.0);
        assert!(p.bitrate_kbps.is_none());
        assert!(p.speed.is_none());
    }

    #[test]
    fn ignores_other_lines() {
        assert!(parse_progress("Input #0, mov,mp4, from 'clip.mp4':").is_none());
        assert!(parse_progress("time=00:00:10.00").is_none());
    }

    #[test]
    fn time_needs_three_parts() {
        assert_eq!(parse_time("01:30:00.00"), Some(5400.0));
        assert_eq!(parse_time("00:10"), None);
        assert_eq!(parse_time("00:00:00:00"), None);
    }
}
