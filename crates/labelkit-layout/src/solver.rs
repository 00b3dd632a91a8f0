/// Layout solver
///
/// Coordinates detectors, rewrites and passes over a bounded number of
/// remeasure round-trips:
///
/// 1. Snapshot bounds (up to `bounds_retries` remeasures, else `missing-bounds`)
/// 2. Unless `force_rebuild` is set, stop early on an already clean layout
/// 3. Marker group rewrite, once, followed by a remeasure
/// 4. Up to `max_iterations` rounds of:
///    - the active structural pattern (sticky once detected), probing
///      boxed barcode, QR form and barcode photo in that order
///    - otherwise the generic placement pass
///    - stop when the round moved nothing, else remeasure and repeat
/// 5. Score confidence and emit warnings
///
/// The outer loop re-scans from scratch every round; overlap cascades are
/// only settled across rounds.
use crate::bounds::{ensure_bounds, BoundsIndex, LayoutHost};
use crate::config::{SolverConfig, Verbosity};
use crate::detectors::{
    BarcodePhotoDetector, BarcodePhotoRoles, BoxedBarcodeDetector, BoxedBarcodeRoles,
    MarkerEvidence, MarkerEvidenceKind, MarkerGroupDetector, QrFormDetector, QrFormRoles,
};
use crate::fidelity::{BarcodePhotoPass, BoxedBarcodePass, PassOutcome, QrFormPass};
use crate::geometry::compute_bounds_overlap;
use crate::placement::PlacementPass;
use crate::reason::{Detection, LayoutWarning, PatternKind, Reason};
use crate::rewriter::{rewrite_barcode_photo, rewrite_marker_group, RewriteOutcome};
use crate::types::{Item, PreviewSize};
use serde::{Deserialize, Serialize};

/// Per-run switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeOptions {
    /// Run the full pipeline even when the layout is already clean
    #[serde(default)]
    pub force_rebuild: bool,
}

impl NormalizeOptions {
    #[inline]
    #[must_use]
    pub const fn force_rebuild() -> Self {
        Self {
            force_rebuild: true,
        }
    }
}

/// Outcome of one normalization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeResult {
    /// A rewrite or pass ran (false for skips and missing bounds)
    pub applied: bool,
    /// The item list differs from the input
    pub did_mutate: bool,
    /// Heuristic score in `[0, 1]`, not a probability
    pub confidence: f64,
    pub reason: Reason,
    /// The last round moved nothing
    pub placement_resolved: bool,
    /// Outer rounds executed
    pub iterations: usize,
    /// Structural pattern the run settled on
    pub pattern: Option<PatternKind>,
    pub warnings: Vec<LayoutWarning>,
}

/// Detector verdict for one pattern, used by reporting tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternReport {
    pub pattern: PatternKind,
    pub matched: bool,
    /// Skip reason when not matched
    pub reason: Option<Reason>,
}

impl PatternReport {
    fn from_detection<R>(pattern: PatternKind, detection: &Detection<R>) -> Self {
        Self {
            pattern,
            matched: detection.is_matched(),
            reason: detection.reason(),
        }
    }
}

/// Structural pattern kept across rounds once detected
#[derive(Debug, Clone, PartialEq)]
enum ActivePattern {
    BarcodePhoto(BarcodePhotoRoles),
    QrForm(QrFormRoles),
    BoxedBarcode(BoxedBarcodeRoles),
}

impl ActivePattern {
    const fn kind(&self) -> PatternKind {
        match self {
            Self::BarcodePhoto(_) => PatternKind::BarcodePhoto,
            Self::QrForm(_) => PatternKind::QrForm,
            Self::BoxedBarcode(_) => PatternKind::BoxedBarcode,
        }
    }
}

/// Result of one outer round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Round {
    reason: Reason,
    mutated: bool,
}

/// Inputs of the confidence score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInputs {
    pub pattern: Option<PatternKind>,
    /// Evidence the marker group matched on, if it matched
    pub marker_evidence: Option<MarkerEvidenceKind>,
    /// Any marker shape or glyph on the label
    pub has_marker_evidence: bool,
    pub resolved: bool,
    pub iterations: usize,
    pub overlaps_left: bool,
}

/// Heuristic confidence for a finished run
///
/// | outcome | resolved | unresolved |
/// |---|---|---|
/// | marker group, glyph evidence | 0.82 | 0.75 |
/// | marker group, shape evidence | 0.74 | 0.67 |
/// | barcode photo | 0.78 | 0.72 |
/// | QR form | 0.80 | 0.74 |
/// | boxed barcode | 0.76 | 0.70 |
/// | generic, marker evidence | 0.72 | 0.52 |
/// | generic | 0.64 (0.5 after 3+ rounds) | 0.3 (0.18 with overlaps left) |
#[must_use]
pub fn score_confidence(inputs: &ConfidenceInputs) -> f64 {
    let resolved = inputs.resolved;
    let pick = |ok: f64, approximate: f64| if resolved { ok } else { approximate };
    match inputs.pattern {
        Some(PatternKind::BarcodePhoto) => pick(0.78, 0.72),
        Some(PatternKind::QrForm) => pick(0.80, 0.74),
        Some(PatternKind::BoxedBarcode) => pick(0.76, 0.70),
        Some(PatternKind::MarkerGroup) => {
            let base = match inputs.marker_evidence {
                Some(MarkerEvidenceKind::Glyph) => 0.82,
                _ => 0.74,
            };
            pick(base, base - 0.07)
        }
        None if inputs.has_marker_evidence => pick(0.72, 0.52),
        None if resolved => {
            if inputs.iterations <= 2 {
                0.64
            } else {
                0.5
            }
        }
        None if inputs.overlaps_left => 0.18,
        None => 0.3,
    }
}

/// Deterministic layout reconciliation for AI-proposed label items
#[derive(Debug, Clone)]
pub struct LayoutSolver {
    config: SolverConfig,
    marker_group: MarkerGroupDetector,
    barcode_photo: BarcodePhotoDetector,
    qr_form: QrFormDetector,
    boxed_barcode: BoxedBarcodeDetector,
    barcode_photo_pass: BarcodePhotoPass,
    qr_form_pass: QrFormPass,
    boxed_barcode_pass: BoxedBarcodePass,
    placement: PlacementPass,
}

impl Default for LayoutSolver {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutSolver {
    /// Create a solver with the default configuration
    #[inline]
    #[must_use = "solver is created but not used"]
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    /// Create a solver from a (validated) configuration
    #[must_use = "solver is created but not used"]
    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            marker_group: MarkerGroupDetector::with_config(config.marker_group),
            barcode_photo: BarcodePhotoDetector::with_config(config.barcode_photo),
            qr_form: QrFormDetector::with_config(config.qr_form),
            boxed_barcode: BoxedBarcodeDetector::with_config(config.boxed_barcode),
            barcode_photo_pass: BarcodePhotoPass::with_config(config.barcode_photo),
            qr_form_pass: QrFormPass::with_config(config.qr_form),
            boxed_barcode_pass: BoxedBarcodePass::with_config(config.boxed_barcode),
            placement: PlacementPass::with_config(config.placement),
            config,
        }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Normalize `items` in place against the host's renderer
    ///
    /// Never fails: every outcome, including a renderer that never produces
    /// bounds, is reported through [`NormalizeResult::reason`].
    pub async fn normalize<H: LayoutHost>(
        &self,
        items: &mut Vec<Item>,
        host: &mut H,
        options: NormalizeOptions,
    ) -> NormalizeResult {
        if items.is_empty() {
            return Self::skipped(Reason::SkipEmptyDocument);
        }
        let original = items.clone();
        let preview = host.preview_size().floored();

        let Some(mut index) = ensure_bounds(items, host, self.config.bounds_retries).await else {
            return self.missing_bounds(host, false);
        };
        let mut evidence = MarkerEvidence::collect(items);

        if !options.force_rebuild && self.placement.is_clean(items, &index, preview) {
            self.summary(format_args!("layout already clean, skipping"));
            return Self::skipped(Reason::SkipLayoutClean);
        }

        // Structural marker rewrite, once
        let mut pattern = None;
        let mut marker_evidence = None;
        let mut rewrite_reason = None;
        if self.config.enable_structural_rewrites {
            match self.marker_group.detect(items, &evidence, &index) {
                Detection::Matched(roles) => {
                    let rewrite = rewrite_marker_group(items, &roles, &index);
                    self.trace(format_args!("marker group: {}", rewrite.reason));
                    if rewrite.mutated() || rewrite.reason == Reason::SkipSameStructure {
                        pattern = Some(PatternKind::MarkerGroup);
                        marker_evidence = Some(roles.evidence);
                    }
                    if rewrite.mutated() {
                        rewrite_reason = Some(rewrite.reason);
                        host.remeasure(items).await;
                        let Some(fresh) =
                            ensure_bounds(items, host, self.config.bounds_retries).await
                        else {
                            return self.missing_bounds(host, *items != original);
                        };
                        index = fresh;
                        evidence = MarkerEvidence::collect(items);
                    }
                }
                Detection::Skipped(reason) => self.trace(format_args!("marker group: {reason}")),
            }
        }

        // Placement rounds
        let mut active: Option<ActivePattern> = None;
        let mut first_applied = None;
        let mut last_reason = Reason::GenericPlacementNoChange;
        let mut resolved = false;
        let mut iterations = 0;
        for iteration in 1..=self.config.max_iterations {
            iterations = iteration;
            if iteration > 1 {
                let Some(fresh) = ensure_bounds(items, host, self.config.bounds_retries).await
                else {
                    return self.missing_bounds(host, *items != original);
                };
                index = fresh;
            }

            let round = self.run_round(items, &mut index, &evidence, preview, &mut active);
            self.summary(format_args!(
                "round {iteration}: {} (mutated: {})",
                round.reason, round.mutated
            ));
            last_reason = round.reason;
            if !round.mutated {
                resolved = true;
                break;
            }
            first_applied.get_or_insert(round.reason);
            host.remeasure(items).await;
        }

        if let Some(active) = &active {
            pattern = Some(active.kind());
        }
        let final_index = BoundsIndex::snapshot(items, &*host).unwrap_or(index);
        let overlaps_left = has_overlaps(items, &final_index);
        // Generic placement stops early when no overlap has room to move
        if resolved && active.is_none() && overlaps_left {
            resolved = false;
        }
        let reason = if resolved {
            rewrite_reason.or(first_applied).unwrap_or(last_reason)
        } else {
            Reason::PlacementIterationCap
        };
        let confidence = score_confidence(&ConfidenceInputs {
            pattern,
            marker_evidence,
            has_marker_evidence: evidence.has_any(),
            resolved,
            iterations,
            overlaps_left,
        });

        let mut warnings = Vec::new();
        if confidence < self.config.low_confidence_threshold {
            warnings.push(LayoutWarning::LowConfidence);
        }
        if !resolved && evidence.has_any() {
            warnings.push(LayoutWarning::PlacementApproximate);
        }
        for warning in &warnings {
            host.warn(*warning);
        }

        let result = NormalizeResult {
            applied: true,
            did_mutate: *items != original,
            confidence,
            reason,
            placement_resolved: resolved,
            iterations,
            pattern,
            warnings,
        };
        self.summary(format_args!(
            "normalized: reason={} confidence={:.2} resolved={} rounds={}",
            result.reason, result.confidence, result.placement_resolved, result.iterations
        ));
        result
    }

    /// Run every detector against the current layout without mutating it
    #[must_use]
    pub fn detect_patterns(
        &self,
        items: &[Item],
        index: &BoundsIndex,
        preview: PreviewSize,
    ) -> Vec<PatternReport> {
        let preview = preview.floored();
        let evidence = MarkerEvidence::collect(items);
        vec![
            PatternReport::from_detection(
                PatternKind::MarkerGroup,
                &self.marker_group.detect(items, &evidence, index),
            ),
            PatternReport::from_detection(
                PatternKind::BarcodePhoto,
                &self.barcode_photo.detect(items, &evidence, index, preview),
            ),
            PatternReport::from_detection(
                PatternKind::QrForm,
                &self.qr_form.detect(items, &evidence, index),
            ),
            PatternReport::from_detection(
                PatternKind::BoxedBarcode,
                &self.boxed_barcode.detect(items, index),
            ),
        ]
    }

    fn run_round(
        &self,
        items: &mut Vec<Item>,
        index: &mut BoundsIndex,
        evidence: &MarkerEvidence,
        preview: PreviewSize,
        active: &mut Option<ActivePattern>,
    ) -> Round {
        if active.is_none() {
            if let Some(mut detected) = self.probe(items, index, evidence, preview) {
                let rewrite = match &mut detected {
                    ActivePattern::BarcodePhoto(roles) if self.config.enable_structural_rewrites => {
                        Some(rewrite_barcode_photo(items, roles, &self.config.barcode_photo))
                    }
                    _ => None,
                };
                *active = Some(detected);
                if let Some(rewrite) = rewrite.filter(RewriteOutcome::mutated) {
                    for id in &rewrite.removed {
                        index.remove(id);
                    }
                    return Round {
                        reason: rewrite.reason,
                        mutated: true,
                    };
                }
            }
        }

        let (outcome, applied, unchanged): (PassOutcome, Reason, Reason) = match active.as_ref() {
            Some(ActivePattern::BarcodePhoto(roles)) => (
                self.barcode_photo_pass.apply(items, index, roles, preview),
                Reason::AppliedBarcodePhotoFidelity,
                Reason::BarcodePhotoNoChange,
            ),
            Some(ActivePattern::QrForm(roles)) => (
                self.qr_form_pass.apply(items, index, roles, preview),
                Reason::AppliedQrFormFidelity,
                Reason::QrFormNoChange,
            ),
            Some(ActivePattern::BoxedBarcode(roles)) => (
                self.boxed_barcode_pass.apply(items, index, roles, preview),
                Reason::AppliedBoxedBarcodeFidelity,
                Reason::BoxedBarcodeNoChange,
            ),
            None => (
                self.placement.apply(items, index, preview),
                Reason::AppliedGenericPlacement,
                Reason::GenericPlacementNoChange,
            ),
        };
        self.trace(format_args!(
            "pass moved {} resized {}",
            outcome.moved, outcome.resized
        ));
        Round {
            reason: if outcome.mutated() { applied } else { unchanged },
            mutated: outcome.mutated(),
        }
    }

    /// First structural pattern that matches, most specific first
    fn probe(
        &self,
        items: &[Item],
        index: &BoundsIndex,
        evidence: &MarkerEvidence,
        preview: PreviewSize,
    ) -> Option<ActivePattern> {
        match self.boxed_barcode.detect(items, index) {
            Detection::Matched(roles) => return Some(ActivePattern::BoxedBarcode(roles)),
            Detection::Skipped(reason) => self.trace(format_args!("boxed barcode: {reason}")),
        }
        match self.qr_form.detect(items, evidence, index) {
            Detection::Matched(roles) => return Some(ActivePattern::QrForm(roles)),
            Detection::Skipped(reason) => self.trace(format_args!("qr form: {reason}")),
        }
        match self.barcode_photo.detect(items, evidence, index, preview) {
            Detection::Matched(roles) => return Some(ActivePattern::BarcodePhoto(roles)),
            Detection::Skipped(reason) => self.trace(format_args!("barcode photo: {reason}")),
        }
        None
    }

    fn skipped(reason: Reason) -> NormalizeResult {
        NormalizeResult {
            applied: false,
            did_mutate: false,
            confidence: 0.9,
            reason,
            placement_resolved: true,
            iterations: 0,
            pattern: None,
            warnings: Vec::new(),
        }
    }

    fn missing_bounds<H: LayoutHost>(&self, host: &mut H, did_mutate: bool) -> NormalizeResult {
        self.summary(format_args!("bounds unavailable, aborting"));
        host.warn(LayoutWarning::BoundsUnavailable);
        NormalizeResult {
            applied: false,
            did_mutate,
            confidence: 0.0,
            reason: Reason::MissingBounds,
            placement_resolved: false,
            iterations: 0,
            pattern: None,
            warnings: vec![LayoutWarning::BoundsUnavailable],
        }
    }

    fn summary(&self, args: std::fmt::Arguments<'_>) {
        if self.config.verbosity >= Verbosity::Summary {
            log::debug!("{args}");
        }
    }

    fn trace(&self, args: std::fmt::Arguments<'_>) {
        if self.config.verbosity >= Verbosity::Trace {
            log::trace!("{args}");
        }
    }
}

/// True if any two measured items overlap
fn has_overlaps(items: &[Item], index: &BoundsIndex) -> bool {
    let bounds: Vec<_> = items.iter().filter_map(|item| index.get(&item.id)).collect();
    bounds.iter().enumerate().any(|(i, a)| {
        bounds[i + 1..]
            .iter()
            .any(|b| !compute_bounds_overlap(a, b).is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::EstimatingMeasurer;
    use crate::types::ShapeType;

    fn inputs(pattern: Option<PatternKind>, resolved: bool) -> ConfidenceInputs {
        ConfidenceInputs {
            pattern,
            marker_evidence: None,
            has_marker_evidence: false,
            resolved,
            iterations: 1,
            overlaps_left: false,
        }
    }

    #[test]
    fn test_confidence_table() {
        assert_eq!(score_confidence(&inputs(Some(PatternKind::QrForm), true)), 0.80);
        assert_eq!(score_confidence(&inputs(Some(PatternKind::QrForm), false)), 0.74);
        assert_eq!(score_confidence(&inputs(Some(PatternKind::BarcodePhoto), false)), 0.72);
        assert_eq!(score_confidence(&inputs(Some(PatternKind::BoxedBarcode), true)), 0.76);
        assert_eq!(score_confidence(&inputs(None, true)), 0.64);

        let glyph = ConfidenceInputs {
            marker_evidence: Some(MarkerEvidenceKind::Glyph),
            ..inputs(Some(PatternKind::MarkerGroup), false)
        };
        assert!((score_confidence(&glyph) - 0.75).abs() < 1e-9);

        let slow = ConfidenceInputs {
            iterations: 4,
            ..inputs(None, true)
        };
        assert_eq!(score_confidence(&slow), 0.5);

        let stuck = ConfidenceInputs {
            overlaps_left: true,
            ..inputs(None, false)
        };
        assert_eq!(score_confidence(&stuck), 0.18);

        let marked = ConfidenceInputs {
            has_marker_evidence: true,
            ..inputs(None, false)
        };
        assert_eq!(score_confidence(&marked), 0.52);
    }

    #[tokio::test]
    async fn test_empty_document_is_skipped() {
        let mut items = Vec::new();
        let mut host = EstimatingMeasurer::new(PreviewSize::new(200.0, 100.0));
        let result = LayoutSolver::new()
            .normalize(&mut items, &mut host, NormalizeOptions::default())
            .await;
        assert_eq!(result.reason, Reason::SkipEmptyDocument);
        assert!(!result.did_mutate);
    }

    #[tokio::test]
    async fn test_clean_layout_skips_without_force() {
        let mut items = vec![
            Item::text("a", "Lagerplatz", 14.0).at(10, 10),
            Item::text("b", "R1-S5-F3", 14.0).at(10, 40),
        ];
        let mut host = EstimatingMeasurer::with_items(PreviewSize::new(300.0, 100.0), &items);
        let result = LayoutSolver::new()
            .normalize(&mut items, &mut host, NormalizeOptions::default())
            .await;
        assert_eq!(result.reason, Reason::SkipLayoutClean);
        assert!(result.placement_resolved);
        assert_eq!(host.remeasure_count(), 0);
    }

    #[tokio::test]
    async fn test_generic_overlap_resolves() {
        let mut items = vec![
            Item::text("a", "Lagerplatz", 14.0).at(10, 10),
            Item::text("b", "R1-S5-F3", 14.0).at(20, 14),
        ];
        let preview = PreviewSize::new(300.0, 100.0);
        let mut host = EstimatingMeasurer::with_items(preview, &items);
        let result = LayoutSolver::new()
            .normalize(&mut items, &mut host, NormalizeOptions::default())
            .await;
        assert_eq!(result.reason, Reason::AppliedGenericPlacement);
        assert!(result.did_mutate);
        assert!(result.placement_resolved);
        assert_eq!(result.pattern, None);

        let a = host.bounds("a").unwrap();
        let b = host.bounds("b").unwrap();
        assert!(compute_bounds_overlap(&a, &b).is_empty());
    }

    #[tokio::test]
    async fn test_glyph_group_rewrites_then_settles() {
        let mut items = vec![Item::text("t", "Einverstanden?\n☐ Ja", 16.0).at(20, 10)];
        let preview = PreviewSize::new(300.0, 120.0);
        let mut host = EstimatingMeasurer::with_items(preview, &items);
        let solver = LayoutSolver::new();
        let result = solver
            .normalize(&mut items, &mut host, NormalizeOptions::force_rebuild())
            .await;
        assert_eq!(result.reason, Reason::RewroteMarkerGroup);
        assert_eq!(result.pattern, Some(PatternKind::MarkerGroup));
        assert!(result.confidence >= 0.75);
        assert_eq!(items.len(), 3);
        assert!(items.iter().any(|item| item.as_shape().is_some_and(|s| s.shape_type == ShapeType::Rect)));

        let again = solver
            .normalize(&mut items, &mut host, NormalizeOptions::force_rebuild())
            .await;
        assert!(!again.did_mutate, "{again:?}");
        assert!(again.placement_resolved);
    }

    #[tokio::test]
    async fn test_strict_config_never_rewrites() {
        let mut items = vec![Item::text("t", "Einverstanden?\n☐ Ja", 16.0).at(20, 10)];
        let mut host = EstimatingMeasurer::with_items(PreviewSize::new(300.0, 120.0), &items);
        let config = crate::config::SolverConfigBuilder::strict().build().unwrap();
        let result = LayoutSolver::with_config(config)
            .normalize(&mut items, &mut host, NormalizeOptions::force_rebuild())
            .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "t");
        assert_ne!(result.reason, Reason::RewroteMarkerGroup);
    }

    #[test]
    fn test_detect_patterns_reports_every_detector() {
        let items = vec![
            Item::text("h", "Lagerplatz:", 14.0).at(8, 8),
            Item::text("v", "R1-S5-F3", 14.0).at(8, 30),
            Item::qr("qr", "18123689", 80.0).at(200, 10),
        ];
        let mut index = BoundsIndex::new();
        for item in &items {
            index.insert(&item.id, EstimatingMeasurer::measure(item));
        }
        let reports = LayoutSolver::new().detect_patterns(&items, &index, PreviewSize::new(300.0, 100.0));
        assert_eq!(reports.len(), 4);
        let qr = reports.iter().find(|r| r.pattern == PatternKind::QrForm).unwrap();
        assert!(qr.matched, "{qr:?}");
        let boxed = reports.iter().find(|r| r.pattern == PatternKind::BoxedBarcode).unwrap();
        assert_eq!(boxed.reason, Some(Reason::BoxedBarcodeSkipBarcodeCount));
    }
}
