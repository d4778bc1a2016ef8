//! Report rendering.
//!
//! [`ReportGenerator`] turns an [`AnalysisReport`](crate::types::AnalysisReport)
//! into either a console summary or pretty JSON. Writing the output anywhere
//! is left to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use combo_analysis::reporting::ReportGenerator;
//!
//! let report = engine.analyze(&df)?;
//! print!("{}", ReportGenerator::summary_text(&report));
//! std::fs::write("report.json", ReportGenerator::to_json(&report)?)?;
//! ```

mod generator;

pub use generator::ReportGenerator;
