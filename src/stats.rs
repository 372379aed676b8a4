//! Textual statistics views over a profiling sample.

use crate::{
    ArtifactBody, ArtifactKind, HotpathResult, ProfileSample, ReportArtifact, StatKind, escape_html,
};

/// Relays the sample's native stats printer into report artifacts.
///
/// The report text is exactly what [`ProfileSample::print_stats`] emits for
/// the sort key; this component only captures it into a sink and escapes it
/// for HTML embedding.
#[derive(Debug)]
pub struct StatsReporter;

impl StatsReporter {
    pub fn artifact(sample: &ProfileSample, kind: StatKind) -> HotpathResult<ReportArtifact> {
        let mut text = String::new();
        sample.print_stats(&mut text, kind)?;
        Ok(ReportArtifact {
            kind: ArtifactKind::StatsText,
            label: kind.label().to_string(),
            title: kind.title().to_string(),
            body: ArtifactBody::Inline(escape_html(&text)),
        })
    }
}
