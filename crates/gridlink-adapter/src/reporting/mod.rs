/*!
 * Report ingestion.
 *
 * Reports pushed by a device are drained by a [`ReportListener`], gated on
 * the session's [`SequenceState`] and translated by the handler of the
 * subsystem named in the dataset reference.
 */

pub mod dispatcher;
pub mod handlers;
pub mod listener;
pub mod sequence;

pub use dispatcher::{DataSetKind, DataSetReference, ReportDispatcher};
pub use handlers::{handler_for, HandlerConstructor, ProfileReportHandler, ReportHandler};
pub use listener::ReportListener;
pub use sequence::{SequenceState, SequenceStatus};
