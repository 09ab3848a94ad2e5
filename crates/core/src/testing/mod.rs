//! Mock implementations for testing the pipeline without a real portal.

mod mock_notifier;
mod mock_upstream;

pub use mock_notifier::MockNotifier;
pub use mock_upstream::MockUpstream;
