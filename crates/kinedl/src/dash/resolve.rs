use std::collections::HashSet;

use dash_mpd::{AdaptationSet, Representation, MPD};
use url::Url;

use super::url::merge_baseurls;
use crate::{
    error::{KinedlError, KinedlResult},
    job::Resolution,
    util::range::ByteRange,
};

/// One independently fetchable piece of a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub url: Url,
    pub byte_range: Option<ByteRange>,
}

/// Ordered segments of the selected video and audio representations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackSegments {
    pub video: Vec<Segment>,
    pub audio: Vec<Segment>,
}

impl TrackSegments {
    pub fn total(&self) -> usize {
        self.video.len() + self.audio.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackKind {
    Video,
    Audio,
    Other,
}

fn has_resolution_axis(adaptation: &AdaptationSet) -> bool {
    adaptation
        .representations
        .first()
        .and_then(|r| r.height)
        .is_some_and(|height| height > 0)
}

fn track_kind(adaptation: &AdaptationSet) -> TrackKind {
    let first = adaptation.representations.first();
    let mime_type = adaptation
        .contentType
        .as_deref()
        .or(adaptation.mimeType.as_deref())
        .or_else(|| first.and_then(|r| r.contentType.as_deref().or(r.mimeType.as_deref())));

    match mime_type {
        Some(mime_type) if mime_type.starts_with("video") => TrackKind::Video,
        Some(mime_type) if mime_type.starts_with("audio") => TrackKind::Audio,
        Some(_) => TrackKind::Other,
        None if has_resolution_axis(adaptation) => TrackKind::Video,
        None => TrackKind::Audio,
    }
}

/// Representations with a resolution axis must match exactly; the others (audio) have
/// nothing to choose from and use the first one.
fn select_representation(
    adaptation: &AdaptationSet,
    resolution: Resolution,
) -> KinedlResult<&Representation> {
    if has_resolution_axis(adaptation) {
        adaptation
            .representations
            .iter()
            .find(|r| r.width == Some(resolution.width) && r.height == Some(resolution.height))
            .ok_or(KinedlError::InvalidResolution(resolution))
    } else {
        adaptation
            .representations
            .first()
            .ok_or(KinedlError::MissingTrack("audio"))
    }
}

fn representation_segments(
    base_url: &Url,
    adaptation: &AdaptationSet,
    representation: &Representation,
) -> KinedlResult<Vec<Segment>> {
    let mut base_url = base_url.clone();
    for base in adaptation.BaseURL.iter().chain(representation.BaseURL.iter()) {
        base_url = merge_baseurls(&base_url, &base.base)?;
    }

    let segment_list = representation
        .SegmentList
        .as_ref()
        .or(adaptation.SegmentList.as_ref())
        .ok_or_else(|| {
            KinedlError::MissingSegmentList(representation.id.clone().unwrap_or_default())
        })?;

    let mut segments = Vec::with_capacity(segment_list.segment_urls.len() + 1);
    if let Some(initialization) = &segment_list.Initialization {
        let byte_range = initialization
            .range
            .as_deref()
            .map(ByteRange::parse)
            .transpose()?;
        if initialization.sourceURL.is_some() || byte_range.is_some() {
            let url = match &initialization.sourceURL {
                Some(source_url) => merge_baseurls(&base_url, source_url)?,
                None => base_url.clone(),
            };
            segments.push(Segment { url, byte_range });
        }
    }

    for segment_url in &segment_list.segment_urls {
        // a missing @media means the segment lives in the BaseURL itself
        let url = match &segment_url.media {
            Some(media) => merge_baseurls(&base_url, media)?,
            None => base_url.clone(),
        };
        let byte_range = segment_url
            .mediaRange
            .as_deref()
            .map(ByteRange::parse)
            .transpose()?;
        segments.push(Segment { url, byte_range });
    }

    Ok(dedup_segments(segments))
}

/// Drop repeated segments, keeping the first occurrence.
pub(crate) fn dedup_segments(segments: Vec<Segment>) -> Vec<Segment> {
    let mut seen = HashSet::with_capacity(segments.len());
    let before = segments.len();
    let segments: Vec<_> = segments
        .into_iter()
        .filter(|segment| seen.insert(segment.clone()))
        .collect();
    if segments.len() != before {
        tracing::warn!(
            "Manifest lists {} duplicated segment(s), ignoring them",
            before - segments.len()
        );
    }
    segments
}

/// Segment lists of the first period for the requested resolution.
///
/// `manifest_url` is the URL the manifest was fetched from; relative segment URLs are
/// resolved against it.
pub fn segments_for(
    mpd: &MPD,
    resolution: Resolution,
    manifest_url: &Url,
) -> KinedlResult<TrackSegments> {
    let period = mpd
        .periods
        .first()
        .ok_or(KinedlError::MissingTrack("video"))?;

    let mut base_url = manifest_url.clone();
    for base in mpd.base_url.iter().chain(period.BaseURL.iter()) {
        base_url = merge_baseurls(&base_url, &base.base)?;
    }

    let mut video = None;
    let mut audio = None;
    for adaptation in &period.adaptations {
        if adaptation.representations.is_empty() {
            continue;
        }

        let slot = match track_kind(adaptation) {
            TrackKind::Video => &mut video,
            TrackKind::Audio => &mut audio,
            TrackKind::Other => {
                tracing::debug!(
                    "Skipping adaptation set {:?} ({:?})",
                    adaptation.id,
                    adaptation.mimeType
                );
                continue;
            }
        };
        if slot.is_some() {
            tracing::debug!("Skipping additional adaptation set {:?}", adaptation.id);
            continue;
        }

        let representation = select_representation(adaptation, resolution)?;
        tracing::debug!(
            representation_id = ?representation.id,
            bandwidth = representation.bandwidth,
            "Selected representation"
        );
        *slot = Some(representation_segments(&base_url, adaptation, representation)?);
    }

    Ok(TrackSegments {
        video: video.ok_or(KinedlError::MissingTrack("video"))?,
        audio: audio.ok_or(KinedlError::MissingTrack("audio"))?,
    })
}

/// Resolutions offered by the first video adaptation set, lowest first.
pub fn available_resolutions(mpd: &MPD) -> Vec<Resolution> {
    let Some(adaptation) = mpd
        .periods
        .first()
        .and_then(|period| period.adaptations.iter().find(|a| has_resolution_axis(a)))
    else {
        return Vec::new();
    };

    let mut resolutions: Vec<_> = adaptation
        .representations
        .iter()
        .filter_map(|r| Some(Resolution::new(r.width?, r.height?)))
        .collect();
    resolutions.sort_by(|a, b| a.height.cmp(&b.height).then(a.width.cmp(&b.width)));
    resolutions.dedup();
    resolutions
}
