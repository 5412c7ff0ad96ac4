//! Encoder argument serialization.
//!
//! The only place a [`JobSpec`] becomes command-line text. Paths and values
//! are passed as separate argv entries; nothing is ever joined into a shell
//! string.

use std::path::Path;

use crate::spec::{AudioEncoding, JobSpec, RenditionSpec, SegmentFormat, VideoEncoding};

/// Init segment name for fragmented MP4 output.
pub const FMP4_INIT_FILENAME: &str = "init.mp4";

/// Serialize `spec` into the ffmpeg argument vector.
pub fn to_args(spec: &JobSpec) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    push(&mut args, ["-y", "-hide_banner", "-loglevel", "error", "-nostdin"]);
    args.push("-i".into());
    args.push(path_arg(&spec.input_path));

    for rendition in &spec.renditions {
        if rendition.video.is_some() {
            push(&mut args, ["-map", "0:v:0"]);
        }
        if let Some(stream) = rendition.audio_source {
            args.push("-map".into());
            args.push(format!("0:a:{stream}"));
        }
    }

    let keyframes = spec.keyframe_expr();
    for rendition in &spec.renditions {
        push_video(&mut args, rendition, &keyframes);
        push_audio(&mut args, rendition);
    }

    push(&mut args, ["-f", "hls"]);
    args.push("-hls_time".into());
    args.push(spec.segment_duration_seconds.to_string());
    push(&mut args, ["-hls_playlist_type", "vod"]);
    push(&mut args, ["-hls_flags", "independent_segments"]);
    args.push("-hls_segment_type".into());
    args.push(spec.segment_format.hls_segment_type().into());
    if spec.segment_format == SegmentFormat::Fmp4 {
        push(&mut args, ["-hls_fmp4_init_filename", FMP4_INIT_FILENAME]);
    }
    args.push("-hls_segment_filename".into());
    args.push(path_arg(&spec.output_dir.join("%v").join(format!(
        "seg_%05d.{}",
        spec.segment_format.extension()
    ))));
    push(&mut args, ["-master_pl_name", crate::paths::MASTER_PLAYLIST]);
    args.push("-var_stream_map".into());
    args.push(var_stream_map(spec));
    args.push(path_arg(
        &spec.output_dir.join("%v").join(crate::paths::VARIANT_PLAYLIST),
    ));

    args
}

/// The muxer's variant declaration, one space-separated group per rendition
/// in plan order, e.g. `v:0,a:0,name:1080p a:1,name:audio`.
pub fn var_stream_map(spec: &JobSpec) -> String {
    spec.renditions
        .iter()
        .map(|r| {
            let mut parts = Vec::with_capacity(3);
            if let Some(v) = r.video_ordinal {
                parts.push(format!("v:{v}"));
            }
            if let Some(a) = r.audio_ordinal {
                parts.push(format!("a:{a}"));
            }
            parts.push(format!("name:{}", r.name));
            parts.join(",")
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_video(args: &mut Vec<String>, r: &RenditionSpec, keyframes: &str) {
    let (Some(video), Some(n)) = (&r.video, r.video_ordinal) else {
        return;
    };

    match video {
        VideoEncoding::Copy => {
            args.push(format!("-c:v:{n}"));
            args.push("copy".into());
        }
        VideoEncoding::Encode(p) => {
            args.push(format!("-c:v:{n}"));
            args.push(p.encoder.clone());
            args.push(format!("-preset:v:{n}"));
            args.push(p.preset.clone());
            if let Some(profile) = &p.profile {
                args.push(format!("-profile:v:{n}"));
                args.push(profile.clone());
            }
            args.push(format!("-pix_fmt:v:{n}"));
            args.push(p.pix_fmt.clone());
            args.push(format!("-b:v:{n}"));
            args.push(p.bitrate.to_string());
            args.push(format!("-maxrate:v:{n}"));
            args.push(p.maxrate.to_string());
            args.push(format!("-bufsize:v:{n}"));
            args.push(p.bufsize.to_string());
            if let Some(filter) = &p.scale_filter {
                args.push(format!("-filter:v:{n}"));
                args.push(filter.clone());
            }
            args.push(format!("-force_key_frames:v:{n}"));
            args.push(keyframes.to_string());
            if p.hvc1_tag {
                args.push(format!("-tag:v:{n}"));
                args.push("hvc1".into());
            }
        }
    }
}

fn push_audio(args: &mut Vec<String>, r: &RenditionSpec) {
    let (Some(audio), Some(n)) = (&r.audio, r.audio_ordinal) else {
        return;
    };

    match audio {
        AudioEncoding::Copy => {
            args.push(format!("-c:a:{n}"));
            args.push("copy".into());
        }
        AudioEncoding::Encode {
            codec,
            bitrate,
            channels,
        } => {
            args.push(format!("-c:a:{n}"));
            args.push(codec.clone());
            args.push(format!("-b:a:{n}"));
            args.push(bitrate.to_string());
            args.push(format!("-ac:a:{n}"));
            args.push(channels.to_string());
        }
    }
}

fn push<const N: usize>(args: &mut Vec<String>, items: [&str; N]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{plan, PlanOptions};
    use crate::source::SourceCharacteristics;
    use crate::spec::{build, PackagingRequest};
    use abr_core::config::PackagingConfig;
    use abr_core::{ItemId, Ladder};

    fn spec_for(ladder: Ladder, codec: &str, config: &PackagingConfig) -> JobSpec {
        let src = SourceCharacteristics {
            height: 2160,
            audio_codec: Some(codec.into()),
            audio_channels: Some(6),
            audio_stream: 0,
            has_audio: true,
        };
        let planned = plan(&ladder, &src, &PlanOptions::from(config));
        let request = PackagingRequest {
            item_id: ItemId::new(),
            profile_name: "p".into(),
            ladder,
        };
        build(
            &request,
            Path::new("/media/My Film (2020).mkv"),
            Path::new("/out/p"),
            &planned,
            config,
        )
        .unwrap()
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn input_path_is_one_argument() {
        let args = to_args(&spec_for(Ladder::default_ladder(), "aac", &PackagingConfig::default()));
        assert_eq!(value_after(&args, "-i"), Some("/media/My Film (2020).mkv"));
        assert_eq!(args[0], "-y");
    }

    #[test]
    fn firetv_sdr_variant_map() {
        let spec = spec_for(Ladder::firetv_sdr(), "eac3", &PackagingConfig::default());
        assert_eq!(
            var_stream_map(&spec),
            "v:0,a:0,name:2160p v:1,a:1,name:1080p v:2,a:2,name:720p a:3,name:audio"
        );

        let args = to_args(&spec);
        assert_eq!(value_after(&args, "-c:a:0"), Some("copy"));
        assert_eq!(value_after(&args, "-c:a:3"), Some("aac"));
        assert_eq!(value_after(&args, "-ac:a:3"), Some("2"));
        assert_eq!(value_after(&args, "-tag:v:0"), Some("hvc1"));
        assert_eq!(value_after(&args, "-c:v:1"), Some("libx265"));
    }

    #[test]
    fn maps_match_renditions() {
        let spec = spec_for(Ladder::firetv_sdr(), "eac3", &PackagingConfig::default());
        let args = to_args(&spec);
        let maps: Vec<&str> = args
            .windows(2)
            .filter(|w| w[0] == "-map")
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(
            maps,
            vec!["0:v:0", "0:a:0", "0:v:0", "0:a:0", "0:v:0", "0:a:0", "0:a:0"]
        );
    }

    #[test]
    fn maps_the_default_audio_stream() {
        let streams = vec![
            abr_core::StreamInfo::video("hevc", 3840, 2160),
            abr_core::StreamInfo::audio("truehd", 8),
            abr_core::StreamInfo::audio("eac3", 6).with_default(true),
        ];
        let src = SourceCharacteristics::from_streams(&streams);
        let config = PackagingConfig::default();
        let ladder = Ladder::firetv_sdr();
        let planned = plan(&ladder, &src, &PlanOptions::from(&config));
        let request = PackagingRequest {
            item_id: ItemId::new(),
            profile_name: "firetv_sdr".into(),
            ladder,
        };
        let spec = build(
            &request,
            Path::new("/media/in.mkv"),
            Path::new("/out/firetv_sdr"),
            &planned,
            &config,
        )
        .unwrap();

        let args = to_args(&spec);
        let audio_maps: Vec<&str> = args
            .windows(2)
            .filter(|w| w[0] == "-map" && w[1].starts_with("0:a:"))
            .map(|w| w[1].as_str())
            .collect();
        assert_eq!(audio_maps, vec!["0:a:1"; 4]);
        assert_eq!(value_after(&args, "-c:a:0"), Some("copy"));
    }

    #[test]
    fn fmp4_output_layout() {
        let args = to_args(&spec_for(Ladder::default_ladder(), "aac", &PackagingConfig::default()));
        assert_eq!(value_after(&args, "-hls_segment_type"), Some("fmp4"));
        assert_eq!(value_after(&args, "-hls_fmp4_init_filename"), Some("init.mp4"));
        assert_eq!(
            value_after(&args, "-hls_segment_filename"),
            Some("/out/p/%v/seg_%05d.m4s")
        );
        assert_eq!(value_after(&args, "-master_pl_name"), Some("master.m3u8"));
        assert_eq!(args.last().map(String::as_str), Some("/out/p/%v/index.m3u8"));
    }

    #[test]
    fn transport_stream_output_layout() {
        let config = PackagingConfig {
            use_fmp4: false,
            ..PackagingConfig::default()
        };
        let args = to_args(&spec_for(Ladder::default_ladder(), "aac", &config));
        assert_eq!(value_after(&args, "-hls_segment_type"), Some("mpegts"));
        assert!(!args.iter().any(|a| a == "-hls_fmp4_init_filename"));
        assert_eq!(
            value_after(&args, "-hls_segment_filename"),
            Some("/out/p/%v/seg_%05d.ts")
        );
    }

    #[test]
    fn keyframes_follow_segment_duration() {
        let args = to_args(&spec_for(Ladder::default_ladder(), "aac", &PackagingConfig::default()));
        assert_eq!(value_after(&args, "-hls_time"), Some("4"));
        assert_eq!(
            value_after(&args, "-force_key_frames:v:0"),
            Some("expr:gte(t,n_forced*4)")
        );
        assert_eq!(value_after(&args, "-bufsize:v:1"), Some("24000000"));
    }

    #[test]
    fn dts_transcode_arguments() {
        let args = to_args(&spec_for(Ladder::default_ladder(), "dts", &PackagingConfig::default()));
        assert_eq!(value_after(&args, "-c:a:0"), Some("ac3"));
        assert_eq!(value_after(&args, "-b:a:0"), Some("384000"));
        assert_eq!(value_after(&args, "-ac:a:0"), Some("6"));
    }
}
