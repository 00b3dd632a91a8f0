//! Tagged outcomes shared by detectors, passes and the solver
//!
//! Nothing in the steady-state solving path returns an error. Each step reports
//! one [`Reason`] whose string form follows a fixed taxonomy:
//! `skip-*` (insufficient or ambiguous evidence), `rewrote-*` (structural
//! rewrite committed), `applied-*` / `*-no-change` (fidelity pass ran with or
//! without mutation) and `missing-bounds`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    // Marker / checkbox group
    SkipNoTextItems,
    SkipNoMarkerEvidence,
    SkipAmbiguousManyTextItems,
    SkipMachineReadablePresent,
    SkipMultipleMarkerShapes,
    SkipMultipleOptionAnchors,
    SkipNoOptionAnchor,
    SkipNoHeadingLines,
    SkipTrailingLines,
    SkipSameStructure,
    RewroteMarkerGroup,

    // Barcode photo
    BarcodePhotoSkipNoBarcode,
    BarcodePhotoSkipFewAbsoluteText,
    BarcodePhotoSkipMarkerEvidence,
    BarcodePhotoSkipNoCodeText,
    BarcodePhotoSkipPairTooFar,
    RewroteBarcodePhoto,
    AppliedBarcodePhotoFidelity,
    BarcodePhotoNoChange,

    // QR form
    QrFormSkipQrCount,
    QrFormSkipBarcodePresent,
    QrFormSkipTextCount,
    QrFormSkipRotatedText,
    QrFormSkipMarkerEvidence,
    QrFormSkipNoHeadingRows,
    QrFormSkipTextNotBesideQr,
    AppliedQrFormFidelity,
    QrFormNoChange,

    // Boxed barcode form
    BoxedBarcodeSkipBarcodeCount,
    BoxedBarcodeSkipQrPresent,
    BoxedBarcodeSkipTextCount,
    BoxedBarcodeSkipRotatedText,
    BoxedBarcodeSkipNoDuplicateCodeText,
    BoxedBarcodeSkipNoMiddleRow,
    AppliedBoxedBarcodeFidelity,
    BoxedBarcodeNoChange,

    // Generic placement and solver
    AppliedGenericPlacement,
    GenericPlacementNoChange,
    PlacementIterationCap,
    SkipEmptyDocument,
    SkipLayoutClean,
    MissingBounds,
}

impl Reason {
    /// Stable identifier surfaced to callers
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SkipNoTextItems => "skip-no-text-items",
            Self::SkipNoMarkerEvidence => "skip-no-marker-evidence",
            Self::SkipAmbiguousManyTextItems => "skip-ambiguous-many-text-items",
            Self::SkipMachineReadablePresent => "skip-machine-readable-present",
            Self::SkipMultipleMarkerShapes => "skip-multiple-marker-shapes",
            Self::SkipMultipleOptionAnchors => "skip-multiple-option-anchors",
            Self::SkipNoOptionAnchor => "skip-no-option-anchor",
            Self::SkipNoHeadingLines => "skip-no-heading-lines",
            Self::SkipTrailingLines => "skip-trailing-lines",
            Self::SkipSameStructure => "skip-same-structure",
            Self::RewroteMarkerGroup => "rewrote-marker-group",
            Self::BarcodePhotoSkipNoBarcode => "barcode-photo-skip-no-barcode",
            Self::BarcodePhotoSkipFewAbsoluteText => "barcode-photo-skip-few-absolute-text",
            Self::BarcodePhotoSkipMarkerEvidence => "barcode-photo-skip-marker-evidence",
            Self::BarcodePhotoSkipNoCodeText => "barcode-photo-skip-no-code-text",
            Self::BarcodePhotoSkipPairTooFar => "barcode-photo-skip-pair-too-far",
            Self::RewroteBarcodePhoto => "rewrote-barcode-photo",
            Self::AppliedBarcodePhotoFidelity => "applied-barcode-photo-fidelity",
            Self::BarcodePhotoNoChange => "barcode-photo-no-change",
            Self::QrFormSkipQrCount => "qr-form-skip-qr-count",
            Self::QrFormSkipBarcodePresent => "qr-form-skip-barcode-present",
            Self::QrFormSkipTextCount => "qr-form-skip-text-count",
            Self::QrFormSkipRotatedText => "qr-form-skip-rotated-text",
            Self::QrFormSkipMarkerEvidence => "qr-form-skip-marker-evidence",
            Self::QrFormSkipNoHeadingRows => "qr-form-skip-no-heading-rows",
            Self::QrFormSkipTextNotBesideQr => "qr-form-skip-text-not-beside-qr",
            Self::AppliedQrFormFidelity => "applied-qr-form-fidelity",
            Self::QrFormNoChange => "qr-form-no-change",
            Self::BoxedBarcodeSkipBarcodeCount => "boxed-barcode-skip-barcode-count",
            Self::BoxedBarcodeSkipQrPresent => "boxed-barcode-skip-qr-present",
            Self::BoxedBarcodeSkipTextCount => "boxed-barcode-skip-text-count",
            Self::BoxedBarcodeSkipRotatedText => "boxed-barcode-skip-rotated-text",
            Self::BoxedBarcodeSkipNoDuplicateCodeText => {
                "boxed-barcode-skip-no-duplicate-code-text"
            }
            Self::BoxedBarcodeSkipNoMiddleRow => "boxed-barcode-skip-no-middle-row",
            Self::AppliedBoxedBarcodeFidelity => "applied-boxed-barcode-fidelity",
            Self::BoxedBarcodeNoChange => "boxed-barcode-no-change",
            Self::AppliedGenericPlacement => "applied-generic-placement",
            Self::GenericPlacementNoChange => "generic-placement-no-change",
            Self::PlacementIterationCap => "placement-iteration-cap",
            Self::SkipEmptyDocument => "skip-empty-document",
            Self::SkipLayoutClean => "skip-layout-clean",
            Self::MissingBounds => "missing-bounds",
        }
    }

    #[must_use]
    pub fn is_skip(self) -> bool {
        self.as_str().contains("skip-")
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural patterns the detectors can recognize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternKind {
    MarkerGroup,
    BarcodePhoto,
    QrForm,
    BoxedBarcode,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MarkerGroup => "marker-group",
            Self::BarcodePhoto => "barcode-photo",
            Self::QrForm => "qr-form",
            Self::BoxedBarcode => "boxed-barcode",
        })
    }
}

/// Caller-visible soft signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutWarning {
    /// Overall confidence fell below the warning threshold
    LowConfidence,
    /// Marker evidence was present but placement did not converge
    PlacementApproximate,
    /// The bounds oracle never became ready; nothing was changed
    BoundsUnavailable,
}

/// Outcome of one detector probe
#[derive(Debug, Clone, PartialEq)]
pub enum Detection<R> {
    Matched(R),
    Skipped(Reason),
}

impl<R> Detection<R> {
    #[inline]
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// Skip reason, `None` when matched
    #[inline]
    #[must_use]
    pub const fn reason(&self) -> Option<Reason> {
        match self {
            Self::Matched(_) => None,
            Self::Skipped(reason) => Some(*reason),
        }
    }

    #[inline]
    #[must_use]
    pub const fn roles(&self) -> Option<&R> {
        match self {
            Self::Matched(roles) => Some(roles),
            Self::Skipped(_) => None,
        }
    }

    #[inline]
    pub fn into_roles(self) -> Option<R> {
        match self {
            Self::Matched(roles) => Some(roles),
            Self::Skipped(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings_match_serde() {
        for reason in [
            Reason::SkipNoMarkerEvidence,
            Reason::BoxedBarcodeSkipNoDuplicateCodeText,
            Reason::QrFormSkipQrCount,
            Reason::AppliedQrFormFidelity,
            Reason::MissingBounds,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn test_skip_classification() {
        assert!(Reason::SkipNoOptionAnchor.is_skip());
        assert!(Reason::BoxedBarcodeSkipTextCount.is_skip());
        assert!(!Reason::RewroteMarkerGroup.is_skip());
        assert!(!Reason::QrFormNoChange.is_skip());
    }

    #[test]
    fn test_detection_accessors() {
        let matched: Detection<u8> = Detection::Matched(3);
        assert!(matched.is_matched());
        assert_eq!(matched.roles(), Some(&3));
        let skipped: Detection<u8> = Detection::Skipped(Reason::SkipNoHeadingLines);
        assert_eq!(skipped.reason(), Some(Reason::SkipNoHeadingLines));
        assert!(skipped.into_roles().is_none());
    }
}
