//! Reassembly of fragmented canvas video.
//!
//! Fragments are grouped by `(source id, profile id)`, the single init
//! fragment is placed first and media fragments follow in ascending index
//! order (ties broken by URL). Bytes are concatenated without separators.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capture::MediaCandidate;
use crate::config::SegmentConfig;
use crate::domain::host_matches;
use crate::resolver::ContentKind;
use crate::segment::{SegmentGroupKey, SegmentRole};

/// One reassembled stream. Immutable once built.
#[derive(Debug, Clone)]
pub struct AssembledStream {
    pub key: SegmentGroupKey,
    pub kind: ContentKind,
    pub bytes: Bytes,
    pub init_url: String,
    /// Media fragment URLs in concatenation order.
    pub media_urls: Vec<String>,
}

impl AssembledStream {
    /// `<prefix>_<source>_profile_<profile>.<ext>`
    pub fn filename(&self, prefix: &str) -> String {
        format!("{prefix}_{}{}", self.key, self.kind.extension())
    }
}

/// Why a group produced no stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum IncompleteReason {
    MissingInit,
    MissingMedia,
    ConflictingInits { count: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct IncompleteGroup {
    pub key: SegmentGroupKey,
    #[serde(flatten)]
    pub reason: IncompleteReason,
}

/// Everything `assemble` produced or skipped.
#[derive(Debug, Default)]
pub struct AssemblyReport {
    pub streams: Vec<AssembledStream>,
    /// Fragments without a source or profile identifier.
    pub missing_identifiers: usize,
    /// Fragments that are neither init nor recognized media.
    pub unknown_role: usize,
    pub incomplete: Vec<IncompleteGroup>,
}

#[derive(Default)]
struct SegmentGroup<'a> {
    inits: Vec<&'a MediaCandidate>,
    media: Vec<&'a MediaCandidate>,
}

pub struct SegmentAssembler {
    hosts: Vec<String>,
}

impl SegmentAssembler {
    pub fn new(config: &SegmentConfig) -> Self {
        Self {
            hosts: config.hosts.clone(),
        }
    }

    pub fn assemble(&self, candidates: &[MediaCandidate]) -> AssemblyReport {
        let mut report = AssemblyReport::default();
        let mut groups: BTreeMap<SegmentGroupKey, SegmentGroup<'_>> = BTreeMap::new();

        for candidate in candidates {
            let Some(info) = &candidate.segment else {
                continue;
            };
            if candidate.data().is_none() || !host_matches(&candidate.url, &self.hosts) {
                continue;
            }
            let Some(key) = &info.group else {
                warn!(url = %candidate.url, "Segment URL lacks source or profile id, skipping");
                report.missing_identifiers += 1;
                continue;
            };

            let group = groups.entry(key.clone()).or_default();
            match info.role {
                SegmentRole::Init => group.inits.push(candidate),
                SegmentRole::Media => group.media.push(candidate),
                SegmentRole::Unknown => {
                    warn!(
                        url = %candidate.url,
                        group = %key,
                        "Segment is neither init nor a recognized media fragment, excluding"
                    );
                    report.unknown_role += 1;
                }
            }
        }

        info!(groups = groups.len(), "Found video segment groups");

        for (key, group) in groups {
            match assemble_group(&key, group) {
                Ok(stream) => {
                    info!(
                        group = %key,
                        fragments = stream.media_urls.len(),
                        bytes = stream.bytes.len(),
                        "Combined video segments"
                    );
                    report.streams.push(stream);
                }
                Err(reason) => {
                    warn!(group = %key, ?reason, "Segment group incomplete, skipping");
                    report.incomplete.push(IncompleteGroup { key, reason });
                }
            }
        }

        report
    }
}

fn assemble_group(
    key: &SegmentGroupKey,
    mut group: SegmentGroup<'_>,
) -> Result<AssembledStream, IncompleteReason> {
    let init = single_init(&group.inits)?;
    if group.media.is_empty() {
        return Err(IncompleteReason::MissingMedia);
    }

    group.media.sort_by(|a, b| {
        let ia = a.segment.as_ref().map_or(0, |s| s.index);
        let ib = b.segment.as_ref().map_or(0, |s| s.index);
        ia.cmp(&ib).then_with(|| a.url.cmp(&b.url))
    });

    let init_bytes = init.data().cloned().unwrap_or_default();
    let total = init_bytes.len()
        + group
            .media
            .iter()
            .filter_map(|c| c.data())
            .map(Bytes::len)
            .sum::<usize>();

    let mut combined = BytesMut::with_capacity(total);
    combined.extend_from_slice(&init_bytes);
    for fragment in &group.media {
        if let Some(data) = fragment.data() {
            debug!(group = %key, url = %fragment.url, bytes = data.len(), "Appending fragment");
            combined.extend_from_slice(data);
        }
    }

    let kind = init
        .resolved
        .as_ref()
        .map(|r| r.kind)
        .filter(ContentKind::is_video)
        .unwrap_or(ContentKind::Webm);

    Ok(AssembledStream {
        key: key.clone(),
        kind,
        bytes: combined.freeze(),
        init_url: init.url.clone(),
        media_urls: group.media.iter().map(|c| c.url.clone()).collect(),
    })
}

/// Exactly one init is required. Byte-identical duplicates (the same init
/// captured twice) count as one.
fn single_init<'a>(inits: &[&'a MediaCandidate]) -> Result<&'a MediaCandidate, IncompleteReason> {
    let Some(first) = inits.first() else {
        return Err(IncompleteReason::MissingInit);
    };
    if inits.iter().all(|c| c.data() == first.data()) {
        Ok(first)
    } else {
        Err(IncompleteReason::ConflictingInits { count: inits.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CandidateSource;
    use crate::resolver::{MediaCategory, ResolvedMedia};
    use crate::segment::{SegmentOrdering, SegmentRules};
    use proptest::prelude::*;

    const BASE: &str = "https://video-akpcw.spotifycdn.com/segments/v1/sources/c0ffee/profiles/7/";

    fn fragment(url: &str, data: &[u8]) -> MediaCandidate {
        fragment_with(url, data, SegmentOrdering::TrailingToken)
    }

    fn fragment_with(url: &str, data: &[u8], ordering: SegmentOrdering) -> MediaCandidate {
        let rules = SegmentRules::new(&SegmentConfig {
            ordering,
            ..Default::default()
        });
        let mut candidate = MediaCandidate::discovered(url, "video/webm");
        candidate.source = CandidateSource::DirectVideo;
        candidate.resolved = Some(ResolvedMedia {
            bytes: Bytes::copy_from_slice(data),
            size: data.len(),
            kind: ContentKind::Webm,
            category: MediaCategory::Video,
            filename: "x.webm".to_string(),
            content_type: Some("video/webm".to_string()),
            fetched: true,
        });
        candidate.segment = rules.detect(url, ContentKind::Webm);
        candidate
    }

    fn assembler() -> SegmentAssembler {
        SegmentAssembler::new(&SegmentConfig::default())
    }

    #[test]
    fn scrambled_fragments_are_ordered() {
        let candidates = vec![
            fragment(&format!("{BASE}2.webm"), b"C"),
            fragment(&format!("{BASE}inits/init.webm"), b"INIT"),
            fragment(&format!("{BASE}0.webm"), b"A"),
            fragment(&format!("{BASE}1.webm"), b"B"),
        ];
        let report = assembler().assemble(&candidates);

        assert_eq!(report.streams.len(), 1);
        let stream = &report.streams[0];
        assert_eq!(stream.bytes.as_ref(), b"INITABC");
        assert_eq!(stream.filename("spotify_canvas"), "spotify_canvas_c0ffee_profile_7.webm");
        assert!(stream.media_urls[0].ends_with("/0.webm"));
    }

    #[test]
    fn group_without_init_is_incomplete() {
        let candidates = vec![fragment(&format!("{BASE}0.webm"), b"A")];
        let report = assembler().assemble(&candidates);
        assert!(report.streams.is_empty());
        assert_eq!(report.incomplete.len(), 1);
        assert_eq!(report.incomplete[0].reason, IncompleteReason::MissingInit);
    }

    #[test]
    fn group_without_media_is_incomplete() {
        let candidates = vec![fragment(&format!("{BASE}inits/init.webm"), b"INIT")];
        let report = assembler().assemble(&candidates);
        assert_eq!(report.incomplete[0].reason, IncompleteReason::MissingMedia);
    }

    #[test]
    fn conflicting_inits_are_rejected_but_duplicates_are_fine() {
        let init_url = format!("{BASE}inits/init.webm");
        let dup = vec![
            fragment(&init_url, b"INIT"),
            fragment(&init_url, b"INIT"),
            fragment(&format!("{BASE}0.webm"), b"A"),
        ];
        assert_eq!(assembler().assemble(&dup).streams[0].bytes.as_ref(), b"INITA");

        let conflict = vec![
            fragment(&init_url, b"INIT"),
            fragment(&format!("{BASE}inits/other.webm"), b"TINI"),
            fragment(&format!("{BASE}0.webm"), b"A"),
        ];
        let report = assembler().assemble(&conflict);
        assert!(report.streams.is_empty());
        assert_eq!(
            report.incomplete[0].reason,
            IncompleteReason::ConflictingInits { count: 2 }
        );
    }

    #[test]
    fn groups_are_kept_apart() {
        let other = "https://video-akpcw.spotifycdn.com/segments/v1/sources/c0ffee/profiles/8/";
        let candidates = vec![
            fragment(&format!("{BASE}inits/init.webm"), b"I7"),
            fragment(&format!("{other}inits/init.webm"), b"I8"),
            fragment(&format!("{other}0.webm"), b"b"),
            fragment(&format!("{BASE}0.webm"), b"a"),
        ];
        let report = assembler().assemble(&candidates);
        let bytes: Vec<&[u8]> = report.streams.iter().map(|s| s.bytes.as_ref()).collect();
        assert_eq!(bytes, vec![&b"I7a"[..], &b"I8b"[..]]);
    }

    #[test]
    fn fragments_without_ids_or_role_are_counted() {
        let candidates = vec![
            fragment("https://video-akpcw.spotifycdn.com/segments/v1/0.webm", b"x"),
            fragment_with(&format!("{BASE}9.webm"), b"y", SegmentOrdering::Legacy),
            fragment(&format!("{BASE}inits/init.webm"), b"INIT"),
        ];
        let report = assembler().assemble(&candidates);
        assert_eq!(report.missing_identifiers, 1);
        assert_eq!(report.unknown_role, 1);
        assert_eq!(report.incomplete[0].reason, IncompleteReason::MissingMedia);
    }

    #[test]
    fn unindexed_fragment_stays_out_of_the_stream() {
        let candidates = vec![
            fragment(&format!("{BASE}inits/init.webm"), b"I"),
            fragment(&format!("{BASE}0.webm"), b"A"),
            fragment(&format!("{BASE}stream.webm"), b"X"),
            fragment(&format!("{BASE}5.webm"), b"B"),
        ];
        let report = assembler().assemble(&candidates);
        assert_eq!(report.unknown_role, 1);
        assert_eq!(report.streams.len(), 1);
        assert_eq!(report.streams[0].bytes.as_ref(), b"IAB");
        assert_eq!(report.streams[0].media_urls.len(), 2);
    }

    #[test]
    fn other_hosts_are_ignored() {
        let candidates = vec![
            fragment("https://canvaz.scdn.co/sources/ab/profiles/1/inits/i.webm", b"I"),
            fragment("https://canvaz.scdn.co/sources/ab/profiles/1/0.webm", b"A"),
        ];
        let report = assembler().assemble(&candidates);
        assert!(report.streams.is_empty());
        assert!(report.incomplete.is_empty());
    }

    proptest! {
        #[test]
        fn output_is_init_then_sorted_media(indices in proptest::collection::btree_set(0u64..500, 1..12)) {
            let mut candidates: Vec<MediaCandidate> = indices
                .iter()
                .rev()
                .map(|i| fragment(&format!("{BASE}{i}.webm"), format!("[{i}]").as_bytes()))
                .collect();
            candidates.push(fragment(&format!("{BASE}inits/init.webm"), b"INIT"));

            let report = assembler().assemble(&candidates);
            let mut expected = b"INIT".to_vec();
            for i in &indices {
                expected.extend_from_slice(format!("[{i}]").as_bytes());
            }
            prop_assert_eq!(report.streams.len(), 1);
            prop_assert_eq!(report.streams[0].bytes.as_ref(), expected.as_slice());
        }
    }
}
