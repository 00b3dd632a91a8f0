//! # labelkit-layout - deterministic label layout reconciliation
//!
//! Takes label items proposed by an assistant (loosely positioned text, QR
//! codes, barcodes and shapes) and settles them into a printable layout:
//!
//! - **Role detection**: checkbox groups, barcode photos, QR forms and boxed
//!   barcode forms are recognized from geometry and text alone
//! - **Structural rewrites**: flat or duplicated text is rebuilt into
//!   heading / marker / option items
//! - **Fidelity passes**: recognized patterns are moved toward their canonical
//!   arrangement
//! - **Generic placement**: overlap resolution, marker spacing and canvas
//!   clamping for everything else
//!
//! Bounds come from an external renderer through [`LayoutHost`]; the solver
//! awaits a remeasure after every mutating round and gives up after fixed caps.
//!
//! ## Quick Start
//!
//! ```
//! use labelkit_layout::{
//!     EstimatingMeasurer, Item, LayoutSolver, NormalizeOptions, PreviewSize,
//! };
//!
//! let mut items = vec![
//!     Item::text("a", "Lagerplatz", 14.0).at(10, 10),
//!     Item::text("b", "R1-S5-F3", 14.0).at(20, 14),
//! ];
//! let mut host = EstimatingMeasurer::with_items(PreviewSize::new(300.0, 100.0), &items);
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let result = runtime.block_on(LayoutSolver::new().normalize(
//!     &mut items,
//!     &mut host,
//!     NormalizeOptions::default(),
//! ));
//! assert!(result.placement_resolved);
//! ```
//!
//! ## Configuration
//!
//! ```
//! use labelkit_layout::{SolverConfigBuilder, Verbosity};
//!
//! # fn main() -> labelkit_layout::Result<()> {
//! let config = SolverConfigBuilder::relaxed()
//!     .verbosity(Verbosity::Summary)
//!     .build()?;
//! assert_eq!(config.max_iterations, 8);
//! # Ok(())
//! # }
//! ```

pub mod bounds;
pub mod config;
pub mod detectors;
pub mod error;
pub mod fidelity;
pub mod geometry;
pub mod measure;
pub mod placement;
pub mod reason;
pub mod rewriter;
pub mod solver;
pub mod text_lines;
pub mod types;

pub use bounds::{BoundsIndex, LayoutHost};
pub use config::{SolverConfig, SolverConfigBuilder, Verbosity};
pub use error::{LayoutError, Result};
pub use measure::EstimatingMeasurer;
pub use reason::{Detection, LayoutWarning, PatternKind, Reason};
pub use solver::{LayoutSolver, NormalizeOptions, NormalizeResult, PatternReport};
pub use types::{
    BarcodeItem, Bounds, IconItem, ImageItem, Item, ItemKind, LabelDocument, PositionMode,
    PreviewSize, QrItem, ShapeItem, ShapeType, TextItem,
};
